//! Engine error type.
//!
//! Expected business conditions (empty cells, preference conflicts,
//! exhausted search budgets) are reported through normal return values
//! and never error. The only hard failure is an invariant break in a
//! roster the engine claims is final, which indicates an engine defect.

use thiserror::Error;

use crate::validation::RosterViolation;

/// Hard engine failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A finished roster failed re-validation. The eligibility rules
    /// should make this unreachable.
    #[error("final roster violates hard constraints: {0:?}")]
    InvariantViolation(Vec<RosterViolation>),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
