//! Swap chains: relocation plans that fill one gap.
//!
//! A chain is an ordered list of steps. The first step moves a
//! quota-exhausted donor from one of their existing assignments into the
//! gap; each following step back-fills the cell the previous step
//! vacated, either by a staff member with quota to spare (which ends the
//! chain) or by another relocation.
//!
//! Chains are plans, not mutations: they are simulated on a cloned
//! roster for scoring, deduplicated by a canonical signature, and only
//! applied (atomically, after step-by-step re-validation) by the
//! repair driver.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{MonthCalendar, Role, Roster, RosterConstraints, Staff};
use crate::validation::validate_roster;

/// One relocation: move `staff` into `(to, role)`, vacating
/// `(from, role)` first when `from` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapStep {
    /// Staff member being moved.
    pub staff: String,
    /// Role of both cells involved.
    pub role: Role,
    /// Vacated assignment; `None` for a direct take-over.
    pub from: Option<NaiveDate>,
    /// Destination cell.
    pub to: NaiveDate,
}

impl SwapStep {
    /// Human-readable description for reports.
    pub fn describe(&self) -> String {
        match self.from {
            Some(from) => format!(
                "{} moves from {} to {} ({})",
                self.staff, from, self.to, self.role
            ),
            None => format!("{} takes over {} ({})", self.staff, self.to, self.role),
        }
    }

    fn token(&self) -> String {
        match self.from {
            Some(from) => format!("{}:{}→{}", self.staff, from, self.to),
            None => format!("{}:∅→{}", self.staff, self.to),
        }
    }
}

/// An ordered relocation plan with its quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapChain {
    /// Steps in application order.
    pub steps: Vec<SwapStep>,
    /// Chain quality (higher is better, ≥ 0).
    pub score: f64,
}

impl SwapChain {
    /// Builds an unscored chain.
    pub fn new(steps: Vec<SwapStep>) -> Self {
        Self { steps, score: 0.0 }
    }

    /// Canonical signature: sorted step tokens. Two chains with the same
    /// signature move the same people between the same cells, so only
    /// one of them needs exploring.
    pub fn signature(&self) -> String {
        let mut tokens: Vec<String> = self.steps.iter().map(SwapStep::token).collect();
        tokens.sort_unstable();
        tokens.join("|")
    }

    /// Number of steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Applies the steps to a clone of the roster, in order.
///
/// Returns `None` when a step does not match the roster (wrong holder in
/// the vacated cell, or an occupied destination).
pub(crate) fn simulate(roster: &Roster, steps: &[SwapStep]) -> Option<Roster> {
    let mut sim = roster.clone();
    for step in steps {
        if let Some(from) = step.from {
            if sim.holder(from, step.role) != Some(step.staff.as_str()) {
                return None;
            }
            sim.clear(from, step.role);
        }
        if !sim.assign(step.to, step.role, &step.staff) {
            return None;
        }
    }
    Some(sim)
}

/// Scores a chain: completion reward, minus per-step costs, plus
/// preference bonuses, minus simulated hard-rule breaches. Clamped ≥ 0;
/// an unsimulatable chain scores 0.
pub(crate) fn evaluate(
    steps: &[SwapStep],
    roster: &Roster,
    staff: &[Staff],
    calendar: &MonthCalendar,
    constraints: &RosterConstraints,
) -> f64 {
    let Some(sim) = simulate(roster, steps) else {
        return 0.0;
    };

    let mut score = 100.0;
    score -= steps.len() as f64 * 5.0;

    for step in steps {
        score -= step_impact(step, calendar);
        if staff
            .iter()
            .find(|s| s.id == step.staff)
            .is_some_and(|s| s.prefers(step.to))
        {
            score += 10.0;
        }
    }

    let violations = validate_roster(&sim, staff, calendar, constraints).len();
    score -= violations as f64 * 20.0;

    score.max(0.0)
}

/// Per-step disruption cost. Relocations cost more than take-overs, and
/// a move across period types costs extra.
fn step_impact(step: &SwapStep, calendar: &MonthCalendar) -> f64 {
    let Some(from) = step.from else {
        return 5.0;
    };
    let mut impact = 8.0;
    if calendar.day_kind(from) != calendar.day_kind(step.to) {
        impact += 10.0;
    }
    impact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Staff;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn step(staff: &str, from: Option<u32>, to: u32) -> SwapStep {
        SwapStep {
            staff: staff.to_string(),
            role: Role::Senior,
            from: from.map(d),
            to: d(to),
        }
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = SwapChain::new(vec![step("A", Some(1), 3), step("B", None, 1)]);
        let b = SwapChain::new(vec![step("B", None, 1), step("A", Some(1), 3)]);
        assert_eq!(a.signature(), b.signature());

        let c = SwapChain::new(vec![step("A", Some(2), 3), step("B", None, 1)]);
        assert_ne!(a.signature(), c.signature());
    }

    #[test]
    fn test_simulate_moves_and_backfills() {
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let mut roster = Roster::for_calendar(&cal);
        roster.assign(d(1), Role::Senior, "A");

        let steps = vec![step("A", Some(1), 3), step("B", None, 1)];
        let sim = simulate(&roster, &steps).unwrap();
        assert_eq!(sim.holder(d(3), Role::Senior), Some("A"));
        assert_eq!(sim.holder(d(1), Role::Senior), Some("B"));
        // The original roster is untouched
        assert_eq!(roster.holder(d(1), Role::Senior), Some("A"));
    }

    #[test]
    fn test_simulate_rejects_stale_steps() {
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let mut roster = Roster::for_calendar(&cal);
        roster.assign(d(1), Role::Senior, "B"); // not A

        assert!(simulate(&roster, &[step("A", Some(1), 3)]).is_none());

        // Destination occupied
        roster.assign(d(3), Role::Senior, "C");
        assert!(simulate(&roster, &[step("B", Some(1), 3)]).is_none());
    }

    #[test]
    fn test_shorter_chains_score_higher() {
        let cal = MonthCalendar::new([d(1), d(2), d(3), d(4)], []);
        let staff = vec![
            Staff::senior("A").with_weekday_quota(2),
            Staff::senior("B").with_weekday_quota(2),
            Staff::senior("C").with_weekday_quota(2),
            Staff::junior("J").with_weekday_quota(4),
        ];
        let constraints = RosterConstraints::default().with_max_consecutive_days(2);

        let mut roster = Roster::for_calendar(&cal);
        roster.assign(d(1), Role::Senior, "A");

        let short = vec![step("A", Some(1), 3), step("B", None, 1)];
        let long = vec![
            step("A", Some(1), 3),
            step("B", Some(4), 1),
            step("C", None, 4),
        ];
        // Put B on day 4 for the long chain's starting point
        let mut roster_long = roster.clone();
        roster_long.assign(d(4), Role::Senior, "B");

        let s_short = evaluate(&short, &roster, &staff, &cal, &constraints);
        let s_long = evaluate(&long, &roster_long, &staff, &cal, &constraints);
        assert!(s_short > s_long);
    }

    #[test]
    fn test_violating_chain_is_penalized() {
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let staff = vec![
            Staff::senior("A").with_weekday_quota(2),
            // B has no quota at all: back-filling with B overruns
            Staff::senior("B").with_weekday_quota(0),
            Staff::junior("J").with_weekday_quota(3),
        ];
        let constraints = RosterConstraints::default().with_max_consecutive_days(2);
        let mut roster = Roster::for_calendar(&cal);
        roster.assign(d(1), Role::Senior, "A");

        let clean = vec![step("A", Some(1), 3)];
        let overrun = vec![step("A", Some(1), 3), step("B", None, 1)];
        let s_clean = evaluate(&clean, &roster, &staff, &cal, &constraints);
        let s_overrun = evaluate(&overrun, &roster, &staff, &cal, &constraints);
        assert!(s_clean > s_overrun);
    }

    #[test]
    fn test_preference_bonus() {
        let cal = MonthCalendar::new([d(1), d(2), d(3)], []);
        let plain = vec![
            Staff::senior("A").with_weekday_quota(2),
            Staff::junior("J").with_weekday_quota(3),
        ];
        let preferring = vec![
            Staff::senior("A").with_weekday_quota(2).with_preferred([d(3)]),
            Staff::junior("J").with_weekday_quota(3),
        ];
        let constraints = RosterConstraints::default().with_max_consecutive_days(2);
        let mut roster = Roster::for_calendar(&cal);
        roster.assign(d(1), Role::Senior, "A");

        let steps = vec![step("A", Some(1), 3)];
        let s_plain = evaluate(&steps, &roster, &plain, &cal, &constraints);
        let s_pref = evaluate(&steps, &roster, &preferring, &cal, &constraints);
        assert!((s_pref - s_plain - 10.0).abs() < 1e-9);
    }
}
