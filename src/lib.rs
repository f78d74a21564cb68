//! Monthly duty-roster engine.
//!
//! Assigns two daily roles (a senior and a junior duty-holder) to every
//! day of a month from a staff pool with per-period quotas, blackout
//! dates, mandatory-preference dates, and a consecutive-duty ceiling.
//! When full completion is impossible under the current quotas, the
//! engine produces the best partial roster it can and reports exactly
//! which cells stayed open and why.
//!
//! # Pipeline
//!
//! 1. **Stage A** ([`scheduler`]): greedy construction plus bounded beam
//!    search → up to five candidate rosters ranked by quality.
//! 2. The caller picks one candidate (usually the best).
//! 3. **Stage B** ([`repair`]): classification-driven direct fills, then
//!    bounded-depth swap-chain search with checkpoint/rollback
//!    backtracking, mutating the chosen roster in place.
//! 4. [`validation::verify_final`] signs the result off; any hard-rule
//!    breach at that point is an engine defect, not a business outcome.
//!
//! # Modules
//!
//! - **[`models`]**: `Staff`, `MonthCalendar`, `Roster`, `QuotaUsage`,
//!   constraints and tunables (pure data).
//! - **[`eligibility`]**: the single allow/deny rule set every search
//!   decision goes through.
//! - **[`scheduler`]**: Stage A.
//! - **[`analyzer`]**: per-gap candidate classification and priorities.
//! - **[`repair`]**: Stage B and its results report.
//! - **[`validation`]**: input checks, feasibility warnings, roster
//!   verification.
//! - **[`events`]**: structured progress events for UI collaborators.
//!
//! The engine owns no I/O: inputs arrive as already-normalized values
//! (`chrono::NaiveDate` keys, staff records), outputs are plain values
//! the caller renders, stores, or ships elsewhere.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use duty_roster::models::{RosterConstraints, Staff};
//! use duty_roster::{run_stage_a, run_stage_b};
//!
//! let d = |day: u32| NaiveDate::from_ymd_opt(2025, 8, day).unwrap();
//! let staff = vec![
//!     Staff::senior("An").with_weekday_quota(3).with_holiday_quota(1),
//!     Staff::senior("Bo").with_weekday_quota(3).with_holiday_quota(1),
//!     Staff::junior("Cy").with_weekday_quota(4).with_holiday_quota(2),
//! ];
//! let weekdays = vec![d(1), d(4), d(5), d(6)];
//! let holidays = vec![d(2), d(3)];
//! let constraints = RosterConstraints::default().with_max_consecutive_days(2);
//!
//! let states = run_stage_a(&staff, &constraints, &weekdays, &holidays, 5, None);
//! let mut roster = states[0].roster.clone();
//! let report = run_stage_b(&mut roster, &staff, &constraints, &weekdays, &holidays, 10);
//! assert_eq!(report.total_cells, 12);
//! ```

pub mod analyzer;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod models;
pub mod repair;
pub mod scheduler;
pub mod validation;

use chrono::NaiveDate;

use models::{MonthCalendar, Roster, RosterConstraints, SchedulingState, Staff};
use repair::{GapRepairer, RepairReport};
use scheduler::BeamScheduler;

pub use error::{EngineError, Result};

/// Runs Stage A over raw date lists.
///
/// Builds the period calendar from the two disjoint lists, overrides the
/// configured beam width, and returns the top candidate states (≤ 5).
/// `progress` receives a 0.0–1.0 fraction while the beam processes gaps.
pub fn run_stage_a(
    staff: &[Staff],
    constraints: &RosterConstraints,
    weekday_dates: &[NaiveDate],
    holiday_dates: &[NaiveDate],
    beam_width: usize,
    progress: Option<&mut dyn FnMut(f64)>,
) -> Vec<SchedulingState> {
    let calendar = MonthCalendar::new(
        weekday_dates.iter().copied(),
        holiday_dates.iter().copied(),
    );
    let constraints = constraints.clone().with_beam_width(beam_width);
    BeamScheduler::new(staff, &calendar, &constraints).run(progress)
}

/// Runs Stage B on a roster in place.
///
/// The roster is mutated toward completeness; the returned report lists
/// every fill, chain, backtrack, unresolved gap, and unmet preference.
pub fn run_stage_b(
    roster: &mut Roster,
    staff: &[Staff],
    constraints: &RosterConstraints,
    weekday_dates: &[NaiveDate],
    holiday_dates: &[NaiveDate],
    max_backtracks: usize,
) -> RepairReport {
    let calendar = MonthCalendar::new(
        weekday_dates.iter().copied(),
        holiday_dates.iter().copied(),
    );
    let mut repairer = GapRepairer::new(std::mem::take(roster), staff, &calendar, constraints);
    let report = repairer.run(max_backtracks);
    *roster = repairer.into_roster();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::Role;
    use validation::verify_final;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_two_stage_pipeline_end_to_end() {
        let staff = vec![
            Staff::senior("A").with_weekday_quota(3).with_holiday_quota(1),
            Staff::senior("B")
                .with_weekday_quota(3)
                .with_holiday_quota(1)
                .with_preferred([d(2)]),
            Staff::junior("C").with_weekday_quota(3).with_holiday_quota(1),
            Staff::junior("D").with_weekday_quota(3).with_holiday_quota(1),
        ];
        let weekdays = vec![d(1), d(4), d(5), d(6)];
        let holidays = vec![d(2), d(3)];
        let constraints = RosterConstraints::default().with_max_consecutive_days(2);

        let states = run_stage_a(&staff, &constraints, &weekdays, &holidays, 5, None);
        assert!(!states.is_empty());
        assert!(states.windows(2).all(|w| w[0].score >= w[1].score));

        let mut roster = states[0].roster.clone();
        let report = run_stage_b(&mut roster, &staff, &constraints, &weekdays, &holidays, 10);

        assert!(report.is_complete());
        // B's holiday preference survived both stages
        assert_eq!(roster.holder(d(2), Role::Senior), Some("B"));

        let calendar = MonthCalendar::new(weekdays, holidays);
        assert!(verify_final(&roster, &staff, &calendar, &constraints).is_ok());
    }

    #[test]
    fn test_stage_b_reports_impossible_cells() {
        // Junior quota supply (1) cannot cover two days
        let staff = vec![
            Staff::senior("A").with_weekday_quota(2),
            Staff::junior("B").with_weekday_quota(1),
        ];
        let weekdays = vec![d(1), d(2)];
        let constraints = RosterConstraints::default().with_max_consecutive_days(2);

        let warnings = validation::feasibility_warnings(
            &staff,
            &MonthCalendar::new(weekdays.clone(), []),
        );
        assert!(!warnings.is_empty());

        let states = run_stage_a(&staff, &constraints, &weekdays, &[], 5, None);
        let mut roster = states[0].roster.clone();
        let report = run_stage_b(&mut roster, &staff, &constraints, &weekdays, &[], 5);

        assert!(!report.is_complete());
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].role, Role::Junior);
    }

    #[test]
    fn test_progress_callback_fraction_range() {
        let staff = vec![
            Staff::senior("A").with_weekday_quota(1),
            Staff::junior("B").with_weekday_quota(2),
        ];
        let weekdays = vec![d(1), d(2)];
        let constraints = RosterConstraints::default();

        let mut fractions = Vec::new();
        let mut cb = |f: f64| fractions.push(f);
        run_stage_a(&staff, &constraints, &weekdays, &[], 3, Some(&mut cb));

        assert!(!fractions.is_empty());
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        assert_eq!(*fractions.last().unwrap(), 1.0);
    }
}
