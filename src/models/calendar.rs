//! Scheduling-period calendar.
//!
//! The period (one month) is partitioned into two disjoint ordered date
//! lists: weekdays and holidays. The partition is an *input*, since
//! holidays and make-up workdays can reclassify any calendar day, so the
//! period type of a date is always answered by membership lookup, never
//! by `NaiveDate::weekday()` alone.
//!
//! Raw date-string parsing is a collaborator concern; the engine only ever
//! sees canonical `NaiveDate` keys.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Period classification of a roster day.
///
/// Drives which quota an assignment consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayKind {
    /// Regular working day (including make-up workdays on weekends).
    Weekday,
    /// Holiday (including ordinary weekends not reclassified as workdays).
    Holiday,
}

impl std::fmt::Display for DayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayKind::Weekday => write!(f, "weekday"),
            DayKind::Holiday => write!(f, "holiday"),
        }
    }
}

/// The scheduling period: every day of one month, already partitioned
/// into weekdays and holidays by the input-normalization collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthCalendar {
    weekdays: Vec<NaiveDate>,
    holidays: Vec<NaiveDate>,
}

impl MonthCalendar {
    /// Builds a calendar from the two disjoint date lists.
    ///
    /// Each list is sorted and deduplicated. A date present in both lists
    /// is treated as a holiday (holidays override, matching how make-up
    /// configuration is resolved upstream).
    pub fn new(
        weekdays: impl IntoIterator<Item = NaiveDate>,
        holidays: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort_unstable();
        holidays.dedup();

        let mut weekdays: Vec<NaiveDate> = weekdays
            .into_iter()
            .filter(|d| holidays.binary_search(d).is_err())
            .collect();
        weekdays.sort_unstable();
        weekdays.dedup();

        Self { weekdays, holidays }
    }

    /// Weekday dates in calendar order.
    #[inline]
    pub fn weekdays(&self) -> &[NaiveDate] {
        &self.weekdays
    }

    /// Holiday dates in calendar order.
    #[inline]
    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }

    /// Period type of a date, or `None` if the date is outside the period.
    pub fn day_kind(&self, date: NaiveDate) -> Option<DayKind> {
        if self.holidays.binary_search(&date).is_ok() {
            Some(DayKind::Holiday)
        } else if self.weekdays.binary_search(&date).is_ok() {
            Some(DayKind::Weekday)
        } else {
            None
        }
    }

    /// Whether the date belongs to the scheduling period.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.day_kind(date).is_some()
    }

    /// All period dates in calendar order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut all: Vec<NaiveDate> = self
            .weekdays
            .iter()
            .chain(self.holidays.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all
    }

    /// All period dates in fill-priority order: holidays first, then
    /// weekdays, calendar order within each group.
    pub fn dates_holiday_first(&self) -> Vec<NaiveDate> {
        self.holidays
            .iter()
            .chain(self.weekdays.iter())
            .copied()
            .collect()
    }

    /// Dates of one period type, in calendar order.
    #[inline]
    pub fn dates_of_kind(&self, kind: DayKind) -> &[NaiveDate] {
        match kind {
            DayKind::Weekday => &self.weekdays,
            DayKind::Holiday => &self.holidays,
        }
    }

    /// Number of days in the period.
    #[inline]
    pub fn len(&self) -> usize {
        self.weekdays.len() + self.holidays.len()
    }

    /// Whether the period is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weekdays.is_empty() && self.holidays.is_empty()
    }

    /// How many period days fall strictly after `date`.
    pub fn days_after(&self, date: NaiveDate) -> usize {
        let after = |v: &[NaiveDate]| v.len() - v.partition_point(|&d| d <= date);
        after(&self.weekdays) + after(&self.holidays)
    }

    /// Whether the date is a Saturday or Sunday on the civil calendar.
    ///
    /// Used only for gap-severity weighting; quota classification always
    /// goes through [`MonthCalendar::day_kind`].
    #[inline]
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
