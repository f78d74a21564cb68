//! Candidate priority and roster quality scoring.
//!
//! Two scores drive Stage A:
//!
//! - the **candidate priority** ranks staff competing for one cell:
//!   scarce staff (high quota packed into few available days) go first,
//!   a mandatory-preference match dominates, and staff who have already
//!   burned more of their quota get a small nudge;
//! - the **quality score** ranks whole (possibly partial) rosters inside
//!   the beam: fill rate above all, then honored preferences, holiday
//!   coverage, quota balance, minus a penalty for consecutive-run
//!   overruns.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{
    DayKind, MonthCalendar, QualityWeights, QuotaUsage, Roster, RosterConstraints, Staff,
};

/// Per-staff, per-period scarcity weights, precomputed at load time.
///
/// Scarcity is `quota / max(available_days, 1)` where a day is available
/// when it is in the period and not in the staff member's blackout set.
/// Dense blackouts shrink the denominator, so constrained staff rank
/// higher and get placed before their few usable days run out.
#[derive(Debug, Clone, Default)]
pub struct ScarcityIndex {
    // [weekday, holiday] per staff id
    weights: HashMap<String, [f64; 2]>,
}

impl ScarcityIndex {
    /// Precomputes scarcity for every staff member and period type.
    pub fn build(staff: &[Staff], calendar: &MonthCalendar) -> Self {
        let mut weights = HashMap::with_capacity(staff.len());
        for s in staff {
            let mut pair = [0.0f64; 2];
            for (i, kind) in [DayKind::Weekday, DayKind::Holiday].into_iter().enumerate() {
                let available = calendar
                    .dates_of_kind(kind)
                    .iter()
                    .filter(|&&d| !s.is_blackout(d))
                    .count();
                pair[i] = f64::from(s.quota(kind)) / available.max(1) as f64;
            }
            weights.insert(s.id.clone(), pair);
        }
        Self { weights }
    }

    /// Scarcity weight for a staff member in a period type.
    pub fn weight(&self, staff_id: &str, kind: DayKind) -> f64 {
        let idx = match kind {
            DayKind::Weekday => 0,
            DayKind::Holiday => 1,
        };
        self.weights.get(staff_id).map_or(0.0, |pair| pair[idx])
    }
}

/// Priority of one candidate for one cell. Higher is better.
pub fn candidate_priority(
    staff: &Staff,
    date: NaiveDate,
    kind: DayKind,
    usage: &QuotaUsage,
    scarcity: &ScarcityIndex,
) -> f64 {
    let mut score = scarcity.weight(&staff.id, kind) * 10.0;
    if staff.prefers(date) {
        score += 100.0;
    }
    let quota = staff.quota(kind);
    let remaining_ratio = if quota == 0 {
        0.0
    } else {
        f64::from(quota.saturating_sub(usage.used(&staff.id, kind))) / f64::from(quota)
    };
    score + (1.0 - remaining_ratio) * 3.0
}

/// Quality of a full or partial roster. Higher is better.
pub fn quality_score(
    roster: &Roster,
    staff: &[Staff],
    calendar: &MonthCalendar,
    constraints: &RosterConstraints,
    weights: &QualityWeights,
) -> f64 {
    let usage = QuotaUsage::tally(roster, calendar);
    let mut score = 0.0;

    // Fill rate
    let total_cells = roster.total_cells();
    if total_cells > 0 {
        score += roster.filled_cells() as f64 / total_cells as f64 * weights.fill;
    }

    // Preference satisfaction
    let mut pref_total = 0usize;
    let mut pref_satisfied = 0usize;
    for s in staff {
        for &date in &s.preferred {
            if !calendar.contains(date) {
                continue;
            }
            pref_total += 1;
            if roster.holder(date, s.role) == Some(s.id.as_str()) {
                pref_satisfied += 1;
            }
        }
    }
    if pref_total > 0 {
        score += pref_satisfied as f64 / pref_total as f64 * weights.preference;
    }

    // Holiday coverage
    let holidays = calendar.holidays();
    if !holidays.is_empty() {
        let filled: usize = holidays
            .iter()
            .filter_map(|&d| roster.slot(d))
            .map(|s| usize::from(s.senior.is_some()) + usize::from(s.junior.is_some()))
            .sum();
        score += filled as f64 / (holidays.len() * 2) as f64 * weights.holiday;
    }

    // Quota balance: 1 − stddev of per-staff mean usage ratios
    if !staff.is_empty() {
        let ratios: Vec<f64> = staff
            .iter()
            .map(|s| {
                let count = usage.of(&s.id);
                let weekday_rate =
                    f64::from(count.weekday) / f64::from(s.weekday_quota.max(1));
                let holiday_rate =
                    f64::from(count.holiday) / f64::from(s.holiday_quota.max(1));
                (weekday_rate + holiday_rate) / 2.0
            })
            .collect();
        score += (1.0 - stddev(&ratios)).max(0.0) * weights.balance;
    }

    // Consecutive-run overruns
    for s in staff {
        let overrun = roster
            .longest_run(&s.id)
            .saturating_sub(constraints.max_consecutive_days);
        score -= f64::from(overrun) * weights.consecutive_penalty;
    }

    score
}

fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Ranks the eligible candidates for a cell, best first.
///
/// Ties broken by id so the order is stable across runs.
pub fn rank_candidates<'a>(
    candidates: impl IntoIterator<Item = &'a Staff>,
    date: NaiveDate,
    kind: DayKind,
    usage: &QuotaUsage,
    scarcity: &ScarcityIndex,
) -> Vec<(&'a Staff, f64)> {
    let mut ranked: Vec<(&Staff, f64)> = candidates
        .into_iter()
        .map(|s| (s, candidate_priority(s, date, kind, usage, scarcity)))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn sample_calendar() -> MonthCalendar {
        MonthCalendar::new([d(1), d(2), d(3), d(4)], [d(9), d(10)])
    }

    #[test]
    fn test_scarcity_reflects_blackout_density() {
        let staff = vec![
            Staff::senior("free").with_weekday_quota(2),
            Staff::senior("tight")
                .with_weekday_quota(2)
                .with_blackout([d(1), d(2), d(3)]),
        ];
        let cal = sample_calendar();
        let idx = ScarcityIndex::build(&staff, &cal);

        // 2 quota over 4 free days vs 2 quota over 1 free day
        assert!((idx.weight("free", DayKind::Weekday) - 0.5).abs() < 1e-10);
        assert!((idx.weight("tight", DayKind::Weekday) - 2.0).abs() < 1e-10);
        assert!(idx.weight("tight", DayKind::Weekday) > idx.weight("free", DayKind::Weekday));
    }

    #[test]
    fn test_preference_dominates_priority() {
        let cal = sample_calendar();
        let plain = Staff::senior("plain").with_weekday_quota(2);
        let prefers = Staff::senior("prefers")
            .with_weekday_quota(2)
            .with_preferred([d(1)]);
        let staff = vec![plain.clone(), prefers.clone()];
        let idx = ScarcityIndex::build(&staff, &cal);
        let usage = QuotaUsage::new();

        let p_plain = candidate_priority(&plain, d(1), DayKind::Weekday, &usage, &idx);
        let p_pref = candidate_priority(&prefers, d(1), DayKind::Weekday, &usage, &idx);
        assert!(p_pref > p_plain + 90.0);
    }

    #[test]
    fn test_rank_candidates_stable_tie_break() {
        let cal = sample_calendar();
        let a = Staff::senior("A").with_weekday_quota(2);
        let b = Staff::senior("B").with_weekday_quota(2);
        let staff = vec![b.clone(), a.clone()];
        let idx = ScarcityIndex::build(&staff, &cal);

        let ranked = rank_candidates(staff.iter(), d(1), DayKind::Weekday, &QuotaUsage::new(), &idx);
        assert_eq!(ranked[0].0.id, "A");
    }

    #[test]
    fn test_quality_prefers_fuller_roster() {
        let cal = sample_calendar();
        let staff = vec![
            Staff::senior("A").with_weekday_quota(4).with_holiday_quota(2),
            Staff::junior("B").with_weekday_quota(4).with_holiday_quota(2),
        ];
        let constraints = RosterConstraints::default().with_max_consecutive_days(5);
        let weights = QualityWeights::default();

        let mut sparse = Roster::for_calendar(&cal);
        sparse.assign(d(1), Role::Senior, "A");
        let mut fuller = sparse.clone();
        fuller.assign(d(2), Role::Senior, "A");
        fuller.assign(d(2), Role::Junior, "B");

        let s1 = quality_score(&sparse, &staff, &cal, &constraints, &weights);
        let s2 = quality_score(&fuller, &staff, &cal, &constraints, &weights);
        assert!(s2 > s1);
    }

    #[test]
    fn test_quality_penalizes_overrun() {
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let staff = vec![Staff::senior("A").with_weekday_quota(3)];
        let weights = QualityWeights::default();

        let mut roster = Roster::for_calendar(&cal);
        for day in 1..=3 {
            roster.assign(d(day), Role::Senior, "A");
        }

        let tight = RosterConstraints::default().with_max_consecutive_days(2);
        let loose = RosterConstraints::default().with_max_consecutive_days(3);
        let penalized = quality_score(&roster, &staff, &cal, &tight, &weights);
        let clean = quality_score(&roster, &staff, &cal, &loose, &weights);
        assert!((clean - penalized - weights.consecutive_penalty).abs() < 1e-9);
    }

    #[test]
    fn test_quality_counts_preferences() {
        let cal = sample_calendar();
        let staff = vec![
            Staff::senior("A")
                .with_weekday_quota(4)
                .with_preferred([d(1)]),
            Staff::junior("B").with_weekday_quota(4),
        ];
        let constraints = RosterConstraints::default().with_max_consecutive_days(5);
        let weights = QualityWeights::default();

        let mut honored = Roster::for_calendar(&cal);
        honored.assign(d(1), Role::Senior, "A");
        let mut ignored = Roster::for_calendar(&cal);
        ignored.assign(d(2), Role::Senior, "A");

        let s_honored = quality_score(&honored, &staff, &cal, &constraints, &weights);
        let s_ignored = quality_score(&ignored, &staff, &cal, &constraints, &weights);
        // Same fill rate; only the preference term differs
        assert!((s_honored - s_ignored - weights.preference).abs() < 1e-9);
    }
}
