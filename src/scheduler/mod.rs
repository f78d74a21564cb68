//! Stage A: constructive roster search.
//!
//! Builds candidate rosters in two phases. A strict greedy pass places
//! mandatory-preference reservations first (holidays before weekdays),
//! then fills every remaining cell with the best eligible candidate by
//! priority score. If that pass fills the whole roster cleanly the stage
//! stops there with a single result. Otherwise a bounded beam search
//! (see [`beam`]) diversifies from several greedy variants and explores
//! alternative candidates for the cells the greedy pass could not fill,
//! returning the top states by quality score.
//!
//! The stage never fails: an incomplete, best-effort state is a normal
//! result, handed on to the repair stage.

mod beam;
mod score;

pub use score::{candidate_priority, quality_score, rank_candidates, ScarcityIndex};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::eligibility::{EligibilityChecker, ReservationIndex};
use crate::models::{
    MonthCalendar, QualityWeights, QuotaUsage, Role, Roster, RosterConstraints, SchedulingState,
    Staff,
};
use crate::validation::validate_roster;

/// How many states Stage A returns at most.
pub const TOP_STATES: usize = 5;

/// Progress callback: invoked with a 0.0–1.0 fraction as gaps are
/// processed by the beam phase.
pub type ProgressFn<'a> = &'a mut dyn FnMut(f64);

/// Stage A scheduler.
///
/// Borrows the run inputs; [`BeamScheduler::run`] produces up to
/// [`TOP_STATES`] ranked [`SchedulingState`]s.
pub struct BeamScheduler<'a> {
    staff: &'a [Staff],
    calendar: &'a MonthCalendar,
    constraints: &'a RosterConstraints,
    weights: QualityWeights,
    reservations: ReservationIndex,
    scarcity: ScarcityIndex,
}

impl<'a> BeamScheduler<'a> {
    /// Creates a scheduler for one run.
    pub fn new(
        staff: &'a [Staff],
        calendar: &'a MonthCalendar,
        constraints: &'a RosterConstraints,
    ) -> Self {
        Self {
            staff,
            calendar,
            constraints,
            weights: QualityWeights::default(),
            reservations: ReservationIndex::build(staff, calendar),
            scarcity: ScarcityIndex::build(staff, calendar),
        }
    }

    /// Overrides the quality weights.
    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = weights;
        self
    }

    fn checker(&self) -> EligibilityChecker<'_> {
        EligibilityChecker::new(self.calendar, self.constraints, &self.reservations)
    }

    /// Runs the stage: strict greedy, then beam search if gaps remain.
    pub fn run(&self, mut progress: Option<ProgressFn<'_>>) -> Vec<SchedulingState> {
        // Strict pass first: when it lands a complete, violation-free
        // roster there is nothing left to search.
        let (roster, _) = self.greedy_build(None);
        if roster.is_complete()
            && validate_roster(&roster, self.staff, self.calendar, self.constraints).is_empty()
        {
            info!(cells = roster.total_cells(), "greedy pass complete, skipping beam search");
            let score = self.quality(&roster);
            if let Some(cb) = progress.as_mut() {
                cb(1.0);
            }
            return vec![SchedulingState::new(roster, score)];
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.constraints.seed);
        let mut seeds = Vec::with_capacity(self.constraints.beam_width);
        for variant in 0..self.constraints.beam_width {
            let (roster, usage) = if variant == 0 {
                self.greedy_build(None)
            } else {
                self.greedy_build(Some(&mut rng))
            };
            let score = self.quality(&roster);
            seeds.push(beam::BeamItem {
                state: SchedulingState::new(roster, score),
                usage,
            });
        }
        debug!(variants = seeds.len(), "greedy variants seeded");

        let mut states = beam::beam_search(
            self,
            seeds,
            progress.as_mut().map(|cb| &mut **cb as &mut dyn FnMut(f64)),
        );
        states.truncate(TOP_STATES);
        info!(
            returned = states.len(),
            best_score = states.first().map(|s| s.score).unwrap_or(0.0),
            "constructive search finished"
        );
        states
    }

    fn quality(&self, roster: &Roster) -> f64 {
        quality_score(roster, self.staff, self.calendar, self.constraints, &self.weights)
    }

    /// One greedy construction. `jitter` carries the RNG for diversified
    /// variants; `None` is the strict, deterministic ordering.
    fn greedy_build(&self, mut jitter: Option<&mut ChaCha8Rng>) -> (Roster, QuotaUsage) {
        let mut roster = Roster::for_calendar(self.calendar);
        let mut usage = QuotaUsage::new();
        let checker = self.checker();

        // Phase 1: mandatory-preference reservations, holidays first.
        for date in self.calendar.dates_holiday_first() {
            for role in Role::ALL {
                let reserved = self.reservations.reserved_for(date, role);
                if reserved.is_empty() {
                    continue;
                }
                let order = self.reservation_order(reserved, jitter.as_deref_mut());
                for id in order {
                    let Some(staff) = self.staff_by_id(&id) else {
                        continue;
                    };
                    if checker.check(staff, date, role, &roster, &usage).is_ok() {
                        let Some(kind) = self.calendar.day_kind(date) else {
                            continue;
                        };
                        roster.assign(date, role, &staff.id);
                        usage.record(&staff.id, kind);
                        break;
                    }
                }
            }
        }

        // Phase 2: fill everything else, holidays first, best candidate
        // by priority score.
        for date in self.calendar.dates_holiday_first() {
            let Some(kind) = self.calendar.day_kind(date) else {
                continue;
            };
            for role in Role::ALL {
                if roster.holder(date, role).is_some() {
                    continue;
                }
                let eligible = self
                    .staff_of_role(role)
                    .filter(|s| checker.check(s, date, role, &roster, &usage).is_ok());
                let mut ranked = rank_candidates(eligible, date, kind, &usage, &self.scarcity);
                if let Some(rng) = jitter.as_deref_mut() {
                    perturb_ranking(&mut ranked, rng);
                }
                if let Some((staff, _)) = ranked.first() {
                    roster.assign(date, role, &staff.id);
                    usage.record(&staff.id, kind);
                }
            }
        }

        (roster, usage)
    }

    /// Orders competing reservation holders for one cell.
    ///
    /// Conflict tie-break: fewest total preference dates (fairness), then
    /// highest flexibility (assignable days per quota unit), then most
    /// remaining total quota. Variants occasionally shuffle instead.
    fn reservation_order(
        &self,
        reserved: &[String],
        jitter: Option<&mut ChaCha8Rng>,
    ) -> Vec<String> {
        let mut order: Vec<String> = reserved.to_vec();
        if order.len() < 2 {
            return order;
        }
        if let Some(rng) = jitter {
            if rng.random::<f64>() < 0.3 {
                order.shuffle(rng);
                return order;
            }
        }
        order.sort_by(|a, b| {
            let (sa, sb) = match (self.staff_by_id(a), self.staff_by_id(b)) {
                (Some(sa), Some(sb)) => (sa, sb),
                _ => return std::cmp::Ordering::Equal,
            };
            sa.preferred
                .len()
                .cmp(&sb.preferred.len())
                .then_with(|| {
                    self.flexibility(sb)
                        .partial_cmp(&self.flexibility(sa))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    (sb.weekday_quota + sb.holiday_quota).cmp(&(sa.weekday_quota + sa.holiday_quota))
                })
                .then_with(|| sa.id.cmp(&sb.id))
        });
        order
    }

    /// Assignable period days per unit of quota; higher = easier to place
    /// elsewhere, so a better loser in a reservation conflict.
    fn flexibility(&self, staff: &Staff) -> f64 {
        let assignable = self
            .calendar
            .dates()
            .into_iter()
            .filter(|&d| !staff.is_blackout(d))
            .count();
        let quota = staff.weekday_quota + staff.holiday_quota;
        assignable as f64 / f64::from(quota.max(1))
    }

    pub(crate) fn staff_by_id(&self, id: &str) -> Option<&Staff> {
        self.staff.iter().find(|s| s.id == id)
    }

    pub(crate) fn staff_of_role(&self, role: Role) -> impl Iterator<Item = &Staff> {
        self.staff.iter().filter(move |s| s.role == role)
    }

    pub(crate) fn staff(&self) -> &[Staff] {
        self.staff
    }

    pub(crate) fn calendar(&self) -> &MonthCalendar {
        self.calendar
    }

    pub(crate) fn constraints(&self) -> &RosterConstraints {
        self.constraints
    }

    pub(crate) fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    pub(crate) fn scarcity(&self) -> &ScarcityIndex {
        &self.scarcity
    }
}

/// Variant perturbation: 30% full shuffle, otherwise jittered re-sort.
fn perturb_ranking(ranked: &mut [(&Staff, f64)], rng: &mut ChaCha8Rng) {
    if ranked.len() < 2 {
        return;
    }
    if rng.random::<f64>() < 0.3 {
        ranked.shuffle(rng);
    } else {
        let jitters: Vec<f64> = ranked.iter().map(|_| rng.random::<f64>() * 2.0).collect();
        let mut order: Vec<usize> = (0..ranked.len()).collect();
        order.sort_by(|&i, &j| {
            (ranked[j].1 + jitters[j])
                .partial_cmp(&(ranked[i].1 + jitters[i]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let reordered: Vec<(&Staff, f64)> = order.iter().map(|&i| ranked[i]).collect();
        ranked.copy_from_slice(&reordered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn pair_staff() -> Vec<Staff> {
        vec![
            Staff::senior("S1").with_weekday_quota(4).with_holiday_quota(2),
            Staff::senior("S2").with_weekday_quota(4).with_holiday_quota(2),
            Staff::junior("J1").with_weekday_quota(4).with_holiday_quota(2),
            Staff::junior("J2").with_weekday_quota(4).with_holiday_quota(2),
        ]
    }

    #[test]
    fn test_greedy_completes_easy_month() {
        let staff = pair_staff();
        let cal = MonthCalendar::new([d(1), d(2), d(3), d(4)], [d(9), d(10)]);
        let constraints = RosterConstraints::default().with_max_consecutive_days(2);
        let states = BeamScheduler::new(&staff, &cal, &constraints).run(None);

        // Clean greedy completion short-circuits to a single state
        assert_eq!(states.len(), 1);
        assert!(states[0].is_complete());
        assert!(states[0].unfilled.is_empty());
    }

    #[test]
    fn test_single_staff_three_weekdays() {
        // One senior covers all three days when the run limit allows it
        let staff = vec![
            Staff::senior("A").with_weekday_quota(3),
            Staff::senior("B"), // zero quota
            Staff::junior("J").with_weekday_quota(3),
        ];
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let constraints = RosterConstraints::default().with_max_consecutive_days(3);
        let states = BeamScheduler::new(&staff, &cal, &constraints).run(None);

        let best = &states[0];
        for day in 1..=3 {
            assert_eq!(best.roster.holder(d(day), Role::Senior), Some("A"));
        }
        assert!(best.roster.longest_run("A") <= 3);
    }

    #[test]
    fn test_run_limit_forces_reported_gap() {
        // Same shape, but a 2-day ceiling: one of the three days must be
        // left open and reported, never overrun.
        let staff = vec![
            Staff::senior("A").with_weekday_quota(3),
            Staff::junior("J").with_weekday_quota(3),
        ];
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let constraints = RosterConstraints::default().with_max_consecutive_days(2);
        let states = BeamScheduler::new(&staff, &cal, &constraints).run(None);

        let best = &states[0];
        assert!(best.roster.longest_run("A") <= 2);
        let senior_gaps: Vec<_> = best
            .unfilled
            .iter()
            .filter(|(_, r)| *r == Role::Senior)
            .collect();
        assert_eq!(senior_gaps.len(), 1);
    }

    #[test]
    fn test_reservation_conflict_tie_break() {
        // Both prefer 8/1; A has fewer total preference dates and wins.
        let staff = vec![
            Staff::senior("A").with_weekday_quota(3).with_preferred([d(1)]),
            Staff::senior("B")
                .with_weekday_quota(3)
                .with_preferred([d(1), d(2)]),
            Staff::junior("J").with_weekday_quota(3),
        ];
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let constraints = RosterConstraints::default().with_max_consecutive_days(3);
        let states = BeamScheduler::new(&staff, &cal, &constraints).run(None);

        assert_eq!(states[0].roster.holder(d(1), Role::Senior), Some("A"));
        // B still gets their other preferred date
        assert_eq!(states[0].roster.holder(d(2), Role::Senior), Some("B"));
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        // Scarce setup so the beam actually runs
        let staff = vec![
            Staff::senior("A").with_weekday_quota(1),
            Staff::senior("B").with_weekday_quota(1),
            Staff::junior("J").with_weekday_quota(2),
        ];
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let constraints = RosterConstraints::default()
            .with_max_consecutive_days(2)
            .with_seed(7);

        let run1 = BeamScheduler::new(&staff, &cal, &constraints).run(None);
        let run2 = BeamScheduler::new(&staff, &cal, &constraints).run(None);
        assert_eq!(run1.len(), run2.len());
        for (a, b) in run1.iter().zip(&run2) {
            assert_eq!(a.roster, b.roster);
            assert!((a.score - b.score).abs() < 1e-12);
        }
    }

    #[test]
    fn test_progress_reaches_one() {
        let staff = vec![
            Staff::senior("A").with_weekday_quota(1),
            Staff::junior("J").with_weekday_quota(1),
        ];
        let cal = MonthCalendar::new([d(1), d(2)], []);
        let constraints = RosterConstraints::default();
        let mut last = 0.0;
        let mut cb = |f: f64| last = f;
        BeamScheduler::new(&staff, &cal, &constraints).run(Some(&mut cb));
        assert!((last - 1.0).abs() < 1e-12);
    }
}
