//! Bounded-depth swap-chain search.
//!
//! For a gap whose only candidates are quota-exhausted (class S), the
//! search tries to relocate one of them into the gap and recursively
//! back-fill the assignment they vacate. Recursion stops at a direct
//! take-over (someone with quota to spare), at the configured depth
//! ceiling, or when the wall-clock budget runs out; whatever was found
//! by then is returned, best first.
//!
//! Donor moves stay within the gap's period type and never touch
//! reservation-locked assignments. Explored prefixes are deduplicated by
//! chain signature. Candidate chains are independent of each other, so
//! final scoring (which simulates every chain end-to-end) runs on the
//! rayon pool.

use std::collections::HashSet;
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::chain::{evaluate, SwapChain, SwapStep};
use crate::analyzer::GapInfo;
use crate::models::{
    DayKind, MonthCalendar, QuotaUsage, Role, Roster, RosterConstraints, Staff,
};

/// How many scored chains a search returns at most.
const MAX_RESULTS: usize = 20;

/// Counters from one chain search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Search nodes visited.
    pub explored: usize,
    /// Complete chains discovered (before dedup/ranking).
    pub found: usize,
    /// Deepest recursion level reached.
    pub max_depth: usize,
}

impl SearchStats {
    /// Accumulates another search's counters.
    pub fn absorb(&mut self, other: SearchStats) {
        self.explored += other.explored;
        self.found += other.found;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// One gap's chain search over a frozen roster snapshot.
pub(super) struct ChainSearch<'a> {
    staff: &'a [Staff],
    calendar: &'a MonthCalendar,
    constraints: &'a RosterConstraints,
    roster: &'a Roster,
    usage: &'a QuotaUsage,
    locked: &'a HashSet<(NaiveDate, Role)>,
    visited: HashSet<String>,
    stats: SearchStats,
}

impl<'a> ChainSearch<'a> {
    pub(super) fn new(
        staff: &'a [Staff],
        calendar: &'a MonthCalendar,
        constraints: &'a RosterConstraints,
        roster: &'a Roster,
        usage: &'a QuotaUsage,
        locked: &'a HashSet<(NaiveDate, Role)>,
    ) -> Self {
        Self {
            staff,
            calendar,
            constraints,
            roster,
            usage,
            locked,
            visited: HashSet::new(),
            stats: SearchStats::default(),
        }
    }

    /// Runs the search for one gap. Returns scored chains, best first,
    /// plus the search counters.
    pub(super) fn run(mut self, gap: &GapInfo) -> (Vec<SwapChain>, SearchStats) {
        let deadline = Instant::now() + self.constraints.chain_time_budget;
        let mut raw: Vec<Vec<SwapStep>> = Vec::new();

        for donor_id in &gap.swappable {
            if Instant::now() > deadline {
                debug!(gap = %gap.date, "chain search hit its time budget");
                break;
            }
            let Some(donor) = self.staff.iter().find(|s| s.id == *donor_id) else {
                continue;
            };
            for (from, role) in self.movable_assignments(donor, gap.kind, gap.date) {
                let first = SwapStep {
                    staff: donor.id.clone(),
                    role,
                    from: Some(from),
                    to: gap.date,
                };
                self.backfill(from, role, vec![first], 1, deadline, &mut raw);
            }
        }

        self.stats.found = raw.len();

        // Dedup complete chains, then score them in parallel: every chain
        // simulates against its own roster clone.
        let mut seen = HashSet::new();
        raw.retain(|steps| seen.insert(SwapChain::new(steps.clone()).signature()));

        let mut chains: Vec<SwapChain> = raw
            .into_par_iter()
            .map(|steps| {
                let score =
                    evaluate(&steps, self.roster, self.staff, self.calendar, self.constraints);
                SwapChain { steps, score }
            })
            .collect();

        chains.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.len().cmp(&b.len()))
        });
        chains.truncate(MAX_RESULTS);

        trace!(
            explored = self.stats.explored,
            found = self.stats.found,
            "chain search finished"
        );
        (chains, self.stats)
    }

    /// Finds someone to take over `(date, role)`, extending `chain`.
    fn backfill(
        &mut self,
        date: NaiveDate,
        role: Role,
        chain: Vec<SwapStep>,
        depth: usize,
        deadline: Instant,
        out: &mut Vec<Vec<SwapStep>>,
    ) {
        self.stats.explored += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        if Instant::now() > deadline {
            return;
        }
        let sig = SwapChain::new(chain.clone()).signature();
        if !self.visited.insert(sig) {
            return;
        }

        let Some(kind) = self.calendar.day_kind(date) else {
            return;
        };
        let involved: HashSet<&str> = chain.iter().map(|s| s.staff.as_str()).collect();

        let mut direct: Vec<&Staff> = Vec::new();
        let mut needs_swap: Vec<&Staff> = Vec::new();
        for candidate in self.staff.iter().filter(|s| s.role == role) {
            if involved.contains(candidate.id.as_str())
                || candidate.is_blackout(date)
                || self.roster.on_duty(date, &candidate.id)
                || self.run_too_long(candidate, date)
            {
                continue;
            }
            if self.usage.used(&candidate.id, kind) < candidate.quota(kind) {
                direct.push(candidate);
            } else {
                needs_swap.push(candidate);
            }
        }

        // Lightly-loaded staff first, direct take-overs before relocations.
        let by_load = |a: &&Staff, b: &&Staff| {
            self.usage
                .of(&a.id)
                .total()
                .cmp(&self.usage.of(&b.id).total())
                .then_with(|| a.id.cmp(&b.id))
        };
        direct.sort_by(by_load);
        needs_swap.sort_by(by_load);

        let budget = self.constraints.max_chain_candidates;
        for candidate in direct.iter().take(budget) {
            let mut complete = chain.clone();
            complete.push(SwapStep {
                staff: candidate.id.clone(),
                role,
                from: None,
                to: date,
            });
            out.push(complete);
        }

        if depth >= self.constraints.max_chain_depth {
            return;
        }
        for candidate in needs_swap.iter().take(budget.saturating_sub(direct.len())) {
            for (from, from_role) in self.movable_assignments(candidate, kind, date) {
                let mut extended = chain.clone();
                extended.push(SwapStep {
                    staff: candidate.id.clone(),
                    role,
                    from: Some(from),
                    to: date,
                });
                self.backfill(from, from_role, extended, depth + 1, deadline, out);
            }
        }
    }

    /// Assignments of `staff` that may be relocated: same role category,
    /// same period type as the destination, not reservation-locked, and
    /// not the destination itself.
    fn movable_assignments(
        &self,
        staff: &Staff,
        kind: DayKind,
        exclude: NaiveDate,
    ) -> Vec<(NaiveDate, Role)> {
        self.roster
            .assignments_of(&staff.id)
            .into_iter()
            .filter(|&(date, role)| {
                date != exclude
                    && role == staff.role
                    && self.calendar.day_kind(date) == Some(kind)
                    && !self.locked.contains(&(date, role))
            })
            .collect()
    }

    fn run_too_long(&self, staff: &Staff, date: NaiveDate) -> bool {
        // Approximated against the pre-chain roster; the end-to-end
        // simulation and apply-time re-validation are authoritative.
        let mut run = 1u32;
        let mut cursor = date.pred_opt();
        while let Some(day) = cursor {
            if !self.roster.on_duty(day, &staff.id) {
                break;
            }
            run += 1;
            cursor = day.pred_opt();
        }
        let mut cursor = date.succ_opt();
        while let Some(day) = cursor {
            if !self.roster.on_duty(day, &staff.id) {
                break;
            }
            run += 1;
            cursor = day.succ_opt();
        }
        run > self.constraints.max_consecutive_days
    }
}
