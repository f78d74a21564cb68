//! Stage A output state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Role, Roster};

/// One candidate roster produced by the constructive search, with the
/// bookkeeping used to rank it.
///
/// Immutable once created; the caller picks one state and hands its
/// roster to the repair stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingState {
    /// The candidate roster.
    pub roster: Roster,
    /// Quality score (higher is better).
    pub score: f64,
    /// Filled role cells.
    pub filled_cells: usize,
    /// Cells still empty, in date order (senior before junior per date).
    pub unfilled: Vec<(NaiveDate, Role)>,
}

impl SchedulingState {
    /// Builds a state from a roster and its score.
    pub fn new(roster: Roster, score: f64) -> Self {
        let filled_cells = roster.filled_cells();
        let unfilled = roster.open_cells();
        Self {
            roster,
            score,
            filled_cells,
            unfilled,
        }
    }

    /// Filled fraction of all role cells (0.0–1.0).
    pub fn fill_rate(&self) -> f64 {
        let total = self.roster.total_cells();
        if total == 0 {
            0.0
        } else {
            self.filled_cells as f64 / total as f64
        }
    }

    /// Whether every cell is filled.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonthCalendar;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_state_bookkeeping() {
        let cal = MonthCalendar::new([d(1), d(2)], []);
        let mut roster = Roster::for_calendar(&cal);
        roster.assign(d(1), Role::Senior, "A");

        let state = SchedulingState::new(roster, 123.0);
        assert_eq!(state.filled_cells, 1);
        assert_eq!(state.unfilled.len(), 3);
        assert!((state.fill_rate() - 0.25).abs() < 1e-10);
        assert!(!state.is_complete());
    }
}
