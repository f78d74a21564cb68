//! Roster (solution) model.
//!
//! A roster maps every day of the scheduling period to a slot holding up
//! to two assignments, one per role. Rosters are plain values: a run
//! produces one, the caller owns it, and search branches that need to
//! diverge clone the whole thing rather than share mutable state.
//!
//! `QuotaUsage` is the derived per-staff assignment count. It can always
//! be rebuilt from a roster with [`QuotaUsage::tally`]; the validator
//! checks that incrementally-maintained copies still reconcile.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DayKind, MonthCalendar, Role};

/// One day of the roster: a date and an optional holder per role.
///
/// Invariant: when both holders are present they are different staff.
/// [`Roster::assign`] refuses to break this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutySlot {
    /// Calendar day this slot covers.
    pub date: NaiveDate,
    /// Assigned senior duty-holder, if any.
    pub senior: Option<String>,
    /// Assigned junior duty-holder, if any.
    pub junior: Option<String>,
}

impl DutySlot {
    /// Creates an empty slot for a date.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            senior: None,
            junior: None,
        }
    }

    /// Holder of a role.
    #[inline]
    pub fn holder(&self, role: Role) -> Option<&str> {
        match role {
            Role::Senior => self.senior.as_deref(),
            Role::Junior => self.junior.as_deref(),
        }
    }

    /// Whether both roles are filled.
    #[inline]
    pub fn is_fully_filled(&self) -> bool {
        self.senior.is_some() && self.junior.is_some()
    }

    /// Whether the staff member holds either role on this day.
    #[inline]
    pub fn holds(&self, staff_id: &str) -> bool {
        self.senior.as_deref() == Some(staff_id) || self.junior.as_deref() == Some(staff_id)
    }

    fn cell_mut(&mut self, role: Role) -> &mut Option<String> {
        match role {
            Role::Senior => &mut self.senior,
            Role::Junior => &mut self.junior,
        }
    }
}

/// A complete roster: one slot per period day, ordered by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    slots: BTreeMap<NaiveDate, DutySlot>,
}

impl Roster {
    /// Creates an empty roster covering every day of the calendar.
    pub fn for_calendar(calendar: &MonthCalendar) -> Self {
        let slots = calendar
            .dates()
            .into_iter()
            .map(|d| (d, DutySlot::new(d)))
            .collect();
        Self { slots }
    }

    /// Slot for a date, if the date is in the period.
    #[inline]
    pub fn slot(&self, date: NaiveDate) -> Option<&DutySlot> {
        self.slots.get(&date)
    }

    /// Holder of (date, role), if assigned.
    #[inline]
    pub fn holder(&self, date: NaiveDate, role: Role) -> Option<&str> {
        self.slots.get(&date).and_then(|s| s.holder(role))
    }

    /// Whether the staff member is on duty (either role) on a date.
    #[inline]
    pub fn on_duty(&self, date: NaiveDate, staff_id: &str) -> bool {
        self.slots.get(&date).is_some_and(|s| s.holds(staff_id))
    }

    /// Puts a staff member into an empty (date, role) cell.
    ///
    /// Returns `false` without mutating when the date is outside the
    /// period, the cell is already taken, or the staff member already
    /// holds the other role that day.
    pub fn assign(&mut self, date: NaiveDate, role: Role, staff_id: &str) -> bool {
        let Some(slot) = self.slots.get_mut(&date) else {
            return false;
        };
        if slot.holder(role).is_some() || slot.holds(staff_id) {
            return false;
        }
        *slot.cell_mut(role) = Some(staff_id.to_string());
        true
    }

    /// Clears a (date, role) cell, returning the previous holder.
    pub fn clear(&mut self, date: NaiveDate, role: Role) -> Option<String> {
        self.slots.get_mut(&date).and_then(|s| s.cell_mut(role).take())
    }

    /// Slots in date order.
    pub fn iter(&self) -> impl Iterator<Item = &DutySlot> {
        self.slots.values()
    }

    /// Dates in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.slots.keys().copied()
    }

    /// Number of days covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the roster covers no days.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total role cells (two per day).
    #[inline]
    pub fn total_cells(&self) -> usize {
        self.slots.len() * 2
    }

    /// Number of filled role cells.
    pub fn filled_cells(&self) -> usize {
        self.slots
            .values()
            .map(|s| usize::from(s.senior.is_some()) + usize::from(s.junior.is_some()))
            .sum()
    }

    /// Whether every cell is filled.
    pub fn is_complete(&self) -> bool {
        self.slots.values().all(DutySlot::is_fully_filled)
    }

    /// Empty (date, role) cells in date order, senior before junior.
    pub fn open_cells(&self) -> Vec<(NaiveDate, Role)> {
        let mut open = Vec::new();
        for slot in self.slots.values() {
            for role in Role::ALL {
                if slot.holder(role).is_none() {
                    open.push((slot.date, role));
                }
            }
        }
        open
    }

    /// All (date, role) assignments held by a staff member, in date order.
    pub fn assignments_of(&self, staff_id: &str) -> Vec<(NaiveDate, Role)> {
        let mut out = Vec::new();
        for slot in self.slots.values() {
            for role in Role::ALL {
                if slot.holder(role) == Some(staff_id) {
                    out.push((slot.date, role));
                }
            }
        }
        out
    }

    /// Longest run of consecutive calendar days on which the staff member
    /// holds any role. A day counts once even if the roster is malformed;
    /// days outside the period break the run.
    pub fn longest_run(&self, staff_id: &str) -> u32 {
        let mut longest = 0u32;
        let mut current = 0u32;
        let mut prev: Option<NaiveDate> = None;

        for slot in self.slots.values() {
            if slot.holds(staff_id) {
                current = match prev {
                    Some(p) if slot.date.pred_opt() == Some(p) => current + 1,
                    _ => 1,
                };
                longest = longest.max(current);
            } else {
                current = 0;
            }
            prev = Some(slot.date);
        }
        longest
    }
}

/// Per-staff weekday/holiday assignment counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyCount {
    /// Weekday assignments so far.
    pub weekday: u32,
    /// Holiday assignments so far.
    pub holiday: u32,
}

impl DutyCount {
    /// Count for a period type.
    #[inline]
    pub fn of(&self, kind: DayKind) -> u32 {
        match kind {
            DayKind::Weekday => self.weekday,
            DayKind::Holiday => self.holiday,
        }
    }

    /// Total assignments across both period types.
    #[inline]
    pub fn total(&self) -> u32 {
        self.weekday + self.holiday
    }
}

/// Derived quota-consumption ledger for one roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    counts: HashMap<String, DutyCount>,
}

impl QuotaUsage {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the ledger by counting every appearance in the roster.
    pub fn tally(roster: &Roster, calendar: &MonthCalendar) -> Self {
        let mut usage = Self::new();
        for slot in roster.iter() {
            let Some(kind) = calendar.day_kind(slot.date) else {
                continue;
            };
            for role in Role::ALL {
                if let Some(id) = slot.holder(role) {
                    usage.record(id, kind);
                }
            }
        }
        usage
    }

    /// Counts one new assignment.
    pub fn record(&mut self, staff_id: &str, kind: DayKind) {
        let entry = self.counts.entry(staff_id.to_string()).or_default();
        match kind {
            DayKind::Weekday => entry.weekday += 1,
            DayKind::Holiday => entry.holiday += 1,
        }
    }

    /// Uncounts a removed assignment (saturating at zero).
    pub fn release(&mut self, staff_id: &str, kind: DayKind) {
        if let Some(entry) = self.counts.get_mut(staff_id) {
            match kind {
                DayKind::Weekday => entry.weekday = entry.weekday.saturating_sub(1),
                DayKind::Holiday => entry.holiday = entry.holiday.saturating_sub(1),
            }
        }
    }

    /// Counts for one staff member (zero if never assigned).
    #[inline]
    pub fn of(&self, staff_id: &str) -> DutyCount {
        self.counts.get(staff_id).copied().unwrap_or_default()
    }

    /// Count for one staff member and period type.
    #[inline]
    pub fn used(&self, staff_id: &str, kind: DayKind) -> u32 {
        self.of(staff_id).of(kind)
    }
}
