//! Duty-roster domain models.
//!
//! Pure data types for the scheduling problem and its solutions. No
//! search logic lives here, only the shapes both stages operate on and
//! the invariant helpers they share.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`Staff`] | Person in one of the two duty categories, with quotas and date sets |
//! | [`MonthCalendar`] | Weekday/holiday partition of the scheduling period |
//! | [`Roster`] | Date → [`DutySlot`] solution map |
//! | [`QuotaUsage`] | Derived per-staff assignment counts |
//! | [`RosterConstraints`] | Hard-rule parameters and search budgets |
//! | [`SchedulingState`] | Ranked Stage A candidate |

mod calendar;
mod constraint;
mod roster;
mod staff;
mod state;

pub use calendar::{DayKind, MonthCalendar};
pub use constraint::{QualityWeights, RosterConstraints};
pub use roster::{DutyCount, DutySlot, QuotaUsage, Roster};
pub use staff::{Role, Staff};
pub use state::SchedulingState;
