//! Assignment eligibility rules.
//!
//! One function decides whether a staff member may take a (date, role)
//! cell, and on refusal names the single rule that blocked it. Both
//! search stages call this on every candidate they consider, so the
//! checks are ordered cheapest-first and every lookup is O(1) or
//! O(log n) against the roster map.
//!
//! Rule order (first failure wins):
//! 1. slot occupancy
//! 2. quota for the day's period type
//! 3. blackout date
//! 4. mandatory-preference reservation
//! 5. consecutive-duty run length
//! 6. other role already held the same day
//!
//! The evaluator is pure: same inputs, same answer, no hidden state.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{MonthCalendar, QuotaUsage, Role, Roster, RosterConstraints, Staff};

/// Why a candidate was refused a (date, role) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenialReason {
    /// The cell already has a holder.
    SlotOccupied,
    /// The staff member's quota for this period type is used up.
    QuotaExhausted,
    /// The date is in the staff member's blackout set.
    BlackoutDate,
    /// The cell is reserved for other staff's mandatory preference.
    PreferenceReserved,
    /// Assigning would exceed the consecutive-duty ceiling.
    ConsecutiveRun,
    /// The staff member already holds the other role that day.
    AlreadyOnDuty,
    /// The date is not part of the scheduling period.
    OutsidePeriod,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DenialReason::SlotOccupied => "slot already occupied",
            DenialReason::QuotaExhausted => "quota exhausted for this period type",
            DenialReason::BlackoutDate => "blackout date",
            DenialReason::PreferenceReserved => "reserved for another staff member's preference",
            DenialReason::ConsecutiveRun => "would exceed the consecutive-duty limit",
            DenialReason::AlreadyOnDuty => "already on duty that day",
            DenialReason::OutsidePeriod => "date outside the scheduling period",
        };
        f.write_str(text)
    }
}

/// Mandatory-preference reservations, precomputed from the staff list.
///
/// A (date, role) cell with a nonempty reservation list may only be
/// assigned to someone on that list.
#[derive(Debug, Clone, Default)]
pub struct ReservationIndex {
    by_cell: HashMap<(NaiveDate, Role), Vec<String>>,
}

impl ReservationIndex {
    /// Collects every staff member's preferred dates that fall inside the
    /// period into per-cell reservation lists (staff-list order).
    pub fn build(staff: &[Staff], calendar: &MonthCalendar) -> Self {
        let mut by_cell: HashMap<(NaiveDate, Role), Vec<String>> = HashMap::new();
        for s in staff {
            for &date in &s.preferred {
                if calendar.contains(date) {
                    by_cell.entry((date, s.role)).or_default().push(s.id.clone());
                }
            }
        }
        Self { by_cell }
    }

    /// Staff reserved for a cell (empty slice = unreserved).
    pub fn reserved_for(&self, date: NaiveDate, role: Role) -> &[String] {
        self.by_cell
            .get(&(date, role))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the cell carries a reservation.
    pub fn is_reserved(&self, date: NaiveDate, role: Role) -> bool {
        !self.reserved_for(date, role).is_empty()
    }

    /// Cells that list more than one staff member (configuration
    /// conflicts, resolved by the greedy tie-break).
    pub fn conflicted_cells(&self) -> impl Iterator<Item = (NaiveDate, Role)> + '_ {
        self.by_cell
            .iter()
            .filter(|(_, v)| v.len() > 1)
            .map(|(&k, _)| k)
    }
}

/// The eligibility evaluator.
///
/// Borrows the run-immutable inputs once; the per-call arguments are the
/// things that change during search (roster and usage).
#[derive(Debug, Clone, Copy)]
pub struct EligibilityChecker<'a> {
    calendar: &'a MonthCalendar,
    constraints: &'a RosterConstraints,
    reservations: &'a ReservationIndex,
}

impl<'a> EligibilityChecker<'a> {
    /// Creates a checker over the run's fixed inputs.
    pub fn new(
        calendar: &'a MonthCalendar,
        constraints: &'a RosterConstraints,
        reservations: &'a ReservationIndex,
    ) -> Self {
        Self {
            calendar,
            constraints,
            reservations,
        }
    }

    /// Full rule check. `Ok(())` means the assignment is allowed.
    pub fn check(
        &self,
        staff: &Staff,
        date: NaiveDate,
        role: Role,
        roster: &Roster,
        usage: &QuotaUsage,
    ) -> Result<(), DenialReason> {
        self.check_rules(staff, date, role, roster, usage, false)
    }

    /// Rule check with the quota rule skipped.
    ///
    /// Backs gap classification: a candidate that passes this but fails
    /// [`EligibilityChecker::check`] is blocked by quota alone and can be
    /// unblocked by a swap.
    pub fn check_ignoring_quota(
        &self,
        staff: &Staff,
        date: NaiveDate,
        role: Role,
        roster: &Roster,
        usage: &QuotaUsage,
    ) -> Result<(), DenialReason> {
        self.check_rules(staff, date, role, roster, usage, true)
    }

    fn check_rules(
        &self,
        staff: &Staff,
        date: NaiveDate,
        role: Role,
        roster: &Roster,
        usage: &QuotaUsage,
        ignore_quota: bool,
    ) -> Result<(), DenialReason> {
        let kind = self
            .calendar
            .day_kind(date)
            .ok_or(DenialReason::OutsidePeriod)?;

        if roster.holder(date, role).is_some() {
            return Err(DenialReason::SlotOccupied);
        }

        if !ignore_quota && usage.used(&staff.id, kind) >= staff.quota(kind) {
            return Err(DenialReason::QuotaExhausted);
        }

        if staff.is_blackout(date) {
            return Err(DenialReason::BlackoutDate);
        }

        let reserved = self.reservations.reserved_for(date, role);
        if !reserved.is_empty() && !reserved.iter().any(|id| *id == staff.id) {
            return Err(DenialReason::PreferenceReserved);
        }

        if self.run_if_assigned(staff, date, roster) > self.constraints.max_consecutive_days {
            return Err(DenialReason::ConsecutiveRun);
        }

        if roster.on_duty(date, &staff.id) {
            return Err(DenialReason::AlreadyOnDuty);
        }

        Ok(())
    }

    /// Length of the consecutive-duty run that assigning `staff` to
    /// `date` would create. Any role held counts as a duty day; the
    /// target day counts once; days where the staff member is off duty
    /// (or outside the period) break the run in either direction.
    pub fn run_if_assigned(&self, staff: &Staff, date: NaiveDate, roster: &Roster) -> u32 {
        let mut run = 1u32;

        let mut cursor = date.pred_opt();
        while let Some(day) = cursor {
            if !roster.on_duty(day, &staff.id) {
                break;
            }
            run += 1;
            cursor = day.pred_opt();
        }

        let mut cursor = date.succ_opt();
        while let Some(day) = cursor {
            if !roster.on_duty(day, &staff.id) {
                break;
            }
            run += 1;
            cursor = day.succ_opt();
        }

        run
    }
}
