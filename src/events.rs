//! Structured progress events.
//!
//! The engine never renders anything. Interactive collaborators that want
//! live progress subscribe with a callback and receive these events; the
//! engine also mirrors the important ones to `tracing` for operators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Role;

/// Progress events emitted by the repair stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RepairEvent {
    /// Gap analysis finished; this many gaps are open.
    AnalysisCompleted {
        /// Open gaps after analysis.
        open_gaps: usize,
    },
    /// A repair pass is starting.
    PassStarted {
        /// 1-based pass number.
        pass: usize,
        /// Gaps open at pass start.
        open_gaps: usize,
    },
    /// A gap was filled directly from class F.
    DirectFilled {
        /// Filled date.
        date: NaiveDate,
        /// Filled role.
        role: Role,
        /// Assigned staff.
        staff: String,
    },
    /// A swap chain was applied to fill a gap.
    ChainApplied {
        /// Gap date.
        date: NaiveDate,
        /// Gap role.
        role: Role,
        /// Number of steps in the chain.
        steps: usize,
    },
    /// Chain search progress for one gap.
    SearchProgress {
        /// Chains explored so far.
        explored: usize,
        /// Complete chains found so far.
        found: usize,
    },
    /// A deadlock was detected and the engine rolled back.
    Backtracked {
        /// Backtracks used so far.
        count: usize,
        /// Traversal perturbation chosen for the retry.
        strategy: String,
    },
    /// The repair loop finished.
    Finished {
        /// Gaps that remain open.
        unresolved: usize,
    },
}

/// Observer callback for [`RepairEvent`]s.
pub type RepairObserver<'a> = Box<dyn FnMut(RepairEvent) + 'a>;
