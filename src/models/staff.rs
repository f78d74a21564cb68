//! Staff model.
//!
//! A staff member is the unit of assignment: a named person in one of the
//! two duty categories, with separate weekday and holiday quotas, a set of
//! blackout dates (hard unavailability) and a set of mandatory-preference
//! dates (hard "must be on duty here" requests).
//!
//! Staff records are loaded once per scheduling run and never change while
//! the engine is running.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DayKind;

/// Duty category. Every day needs one of each.
///
/// Ordering is meaningful: `Senior` sorts before `Junior`, which is the
/// order gaps are prioritized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Senior duty-holder.
    Senior,
    /// Junior duty-holder.
    Junior,
}

impl Role {
    /// Both roles, in gap-priority order.
    pub const ALL: [Role; 2] = [Role::Senior, Role::Junior];

    /// The other role on the same day.
    #[inline]
    pub fn other(self) -> Role {
        match self {
            Role::Senior => Role::Junior,
            Role::Junior => Role::Senior,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Senior => write!(f, "senior"),
            Role::Junior => write!(f, "junior"),
        }
    }
}

/// A staff member available for duty assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    /// Unique name. Doubles as the assignment reference in a roster.
    pub id: String,
    /// Duty category this staff member can fill.
    pub role: Role,
    /// Maximum weekday assignments over the scheduling period.
    pub weekday_quota: u32,
    /// Maximum holiday assignments over the scheduling period.
    pub holiday_quota: u32,
    /// Dates this staff member must not be assigned.
    pub blackout: BTreeSet<NaiveDate>,
    /// Dates this staff member must be assigned (hard constraint).
    /// Must be disjoint from `blackout`; `validate_input` rejects overlap.
    pub preferred: BTreeSet<NaiveDate>,
}

impl Staff {
    /// Creates a staff member with zero quotas and empty date sets.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            weekday_quota: 0,
            holiday_quota: 0,
            blackout: BTreeSet::new(),
            preferred: BTreeSet::new(),
        }
    }

    /// Creates a senior staff member.
    pub fn senior(id: impl Into<String>) -> Self {
        Self::new(id, Role::Senior)
    }

    /// Creates a junior staff member.
    pub fn junior(id: impl Into<String>) -> Self {
        Self::new(id, Role::Junior)
    }

    /// Sets the weekday quota.
    pub fn with_weekday_quota(mut self, quota: u32) -> Self {
        self.weekday_quota = quota;
        self
    }

    /// Sets the holiday quota.
    pub fn with_holiday_quota(mut self, quota: u32) -> Self {
        self.holiday_quota = quota;
        self
    }

    /// Adds blackout dates.
    pub fn with_blackout(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.blackout.extend(dates);
        self
    }

    /// Adds mandatory-preference dates.
    pub fn with_preferred(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.preferred.extend(dates);
        self
    }

    /// Quota for a period type.
    #[inline]
    pub fn quota(&self, kind: DayKind) -> u32 {
        match kind {
            DayKind::Weekday => self.weekday_quota,
            DayKind::Holiday => self.holiday_quota,
        }
    }

    /// Whether `date` is a blackout date.
    #[inline]
    pub fn is_blackout(&self, date: NaiveDate) -> bool {
        self.blackout.contains(&date)
    }

    /// Whether `date` is a mandatory-preference date.
    #[inline]
    pub fn prefers(&self, date: NaiveDate) -> bool {
        self.preferred.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_staff_builder() {
        let s = Staff::senior("A")
            .with_weekday_quota(5)
            .with_holiday_quota(2)
            .with_blackout([d(3), d(4)])
            .with_preferred([d(10)]);

        assert_eq!(s.id, "A");
        assert_eq!(s.role, Role::Senior);
        assert_eq!(s.quota(DayKind::Weekday), 5);
        assert_eq!(s.quota(DayKind::Holiday), 2);
        assert!(s.is_blackout(d(3)));
        assert!(!s.is_blackout(d(5)));
        assert!(s.prefers(d(10)));
        assert!(!s.prefers(d(11)));
    }

    #[test]
    fn test_role_order_and_other() {
        assert!(Role::Senior < Role::Junior);
        assert_eq!(Role::Senior.other(), Role::Junior);
        assert_eq!(Role::Junior.other(), Role::Senior);
        assert_eq!(Role::Senior.to_string(), "senior");
    }

    #[test]
    fn test_staff_serde_round_trip() {
        let s = Staff::junior("B").with_weekday_quota(3).with_preferred([d(1)]);
        let json = serde_json::to_string(&s).unwrap();
        let back: Staff = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "B");
        assert_eq!(back.role, Role::Junior);
        assert!(back.prefers(d(1)));
    }
}
