//! Run configuration: hard-rule parameters and search tunables.
//!
//! `RosterConstraints` carries the one hard domain rule that is
//! configurable (the consecutive-duty ceiling) together with the budgets
//! that bound both search stages. `QualityWeights` holds the Stage A
//! scoring coefficients; the defaults are load-bearing in the sense that
//! candidate ordering under them is part of the engine's contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard-rule parameters and search budgets for one scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConstraints {
    /// Longest permitted run of consecutive duty days (any role), ≥ 1.
    pub max_consecutive_days: u32,
    /// Candidate rosters retained per beam step.
    pub beam_width: usize,
    /// Eligible candidates branched per (beam member, gap).
    pub branch_factor: usize,
    /// Cap on gaps processed by one beam run.
    pub max_beam_gaps: usize,
    /// Recursion ceiling for swap-chain search.
    pub max_chain_depth: usize,
    /// Replacement candidates considered per chain level.
    pub max_chain_candidates: usize,
    /// Wall-clock budget for the chain search of a single gap.
    pub chain_time_budget: Duration,
    /// Deadlock recoveries allowed before the repair loop gives up.
    pub max_backtracks: usize,
    /// Seed for all search randomness; a fixed seed fixes the output.
    pub seed: u64,
}

impl Default for RosterConstraints {
    fn default() -> Self {
        Self {
            max_consecutive_days: 2,
            beam_width: 5,
            branch_factor: 3,
            max_beam_gaps: 30,
            max_chain_depth: 5,
            max_chain_candidates: 15,
            chain_time_budget: Duration::from_secs(120),
            max_backtracks: 20,
            seed: 0,
        }
    }
}

impl RosterConstraints {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the consecutive-duty ceiling (clamped to ≥ 1).
    pub fn with_max_consecutive_days(mut self, days: u32) -> Self {
        self.max_consecutive_days = days.max(1);
        self
    }

    /// Sets the beam width.
    pub fn with_beam_width(mut self, width: usize) -> Self {
        self.beam_width = width.max(1);
        self
    }

    /// Sets the swap-chain depth ceiling.
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth.max(1);
        self
    }

    /// Sets the chain-search wall-clock budget.
    pub fn with_chain_time_budget(mut self, budget: Duration) -> Self {
        self.chain_time_budget = budget;
        self
    }

    /// Sets the backtrack budget.
    pub fn with_max_backtracks(mut self, budget: usize) -> Self {
        self.max_backtracks = budget;
        self
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Stage A quality-function coefficients.
///
/// The score of a (possibly partial) roster is
/// `fill_rate·fill + preference_rate·preference + holiday_rate·holiday
/// + balance·quota_balance − overrun_days·consecutive_penalty`.
/// Callers may rescale, but the relative ordering the defaults induce is
/// what the engine's ranking guarantees are stated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    /// Weight of the filled-cell ratio.
    pub fill: f64,
    /// Weight of the honored-preference ratio.
    pub preference: f64,
    /// Weight of the holiday-cell coverage ratio.
    pub holiday: f64,
    /// Weight of the quota-balance score.
    pub balance: f64,
    /// Penalty per day of consecutive-run overrun, per staff.
    pub consecutive_penalty: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            fill: 1000.0,
            preference: 500.0,
            holiday: 200.0,
            balance: 30.0,
            consecutive_penalty: 100.0,
        }
    }
}
