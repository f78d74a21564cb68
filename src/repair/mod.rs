//! Stage B: gap repair.
//!
//! Takes one roster (normally the best Stage A candidate) and closes its
//! remaining gaps in passes:
//!
//! 1. **direct fill**: the highest-priority gap with a class-F candidate
//!    gets the best one immediately;
//! 2. **swap search**: gaps with only class-S candidates get a
//!    bounded-depth chain search, and the best chain that survives
//!    re-validation is applied atomically.
//!
//! Every pass starts from a checkpoint. A pass that changes nothing while
//! gaps remain is a deadlock: the engine rolls back to the checkpoint of
//! the previous successful pass, perturbs the gap traversal (reverse,
//! severity-first, seeded shuffle) and retries, up to the backtrack
//! budget. Whatever remains open afterwards is returned in the report
//! with a reason, never as an error.

mod chain;
mod search;

pub use chain::{SwapChain, SwapStep};
pub use search::SearchStats;

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::{GapAnalyzer, GapDetail, GapInfo};
use crate::events::{RepairEvent, RepairObserver};
use crate::models::{MonthCalendar, QuotaUsage, Role, Roster, RosterConstraints, Staff};
use crate::validation::{reconcile_usage, validate_roster, RosterViolation};

/// One gap filled straight from class F.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectFill {
    /// Filled date.
    pub date: NaiveDate,
    /// Filled role.
    pub role: Role,
    /// Assigned staff.
    pub staff: String,
}

/// One applied swap chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChain {
    /// The gap the chain filled.
    pub date: NaiveDate,
    /// The gap's role.
    pub role: Role,
    /// Step descriptions, in application order.
    pub steps: Vec<String>,
    /// Score of the applied chain.
    pub score: f64,
}

/// One deadlock recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktrackEvent {
    /// Pass in which the deadlock was detected.
    pub pass: usize,
    /// Perturbation strategy chosen for the retry.
    pub strategy: String,
}

/// Why a gap could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    /// Every staff member of the role is unavailable for this cell.
    NoEligibleStaff,
    /// Candidates exist but the search budget ran out without a
    /// workable chain.
    SearchExhausted,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::NoEligibleStaff => f.write_str("no eligible staff in any class"),
            UnresolvedReason::SearchExhausted => {
                f.write_str("swap-chain search exhausted its budget without success")
            }
        }
    }
}

/// A gap left open at the end of the repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedGap {
    /// Gap date.
    pub date: NaiveDate,
    /// Gap role.
    pub role: Role,
    /// Why it stayed open.
    pub reason: UnresolvedReason,
}

/// Why a mandatory preference went unmet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnmetPreferenceReason {
    /// Another staff member with the same reservation won the tie-break.
    LostTieBreak,
    /// The cell ended the run unfilled.
    SlotLeftOpen,
}

impl std::fmt::Display for UnmetPreferenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnmetPreferenceReason::LostTieBreak => f.write_str("preference conflict, lost tie-break"),
            UnmetPreferenceReason::SlotLeftOpen => f.write_str("slot left unfilled"),
        }
    }
}

/// A mandatory-preference date the final roster does not honor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetPreference {
    /// The staff member whose preference went unmet.
    pub staff: String,
    /// Preferred date.
    pub date: NaiveDate,
    /// Role the preference applied to.
    pub role: Role,
    /// Why it went unmet.
    pub reason: UnmetPreferenceReason,
}

/// Everything a repair run did and everything it could not do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Gaps filled directly.
    pub direct_fills: Vec<DirectFill>,
    /// Swap chains applied, with full step descriptions.
    pub applied_chains: Vec<AppliedChain>,
    /// Deadlock recoveries performed.
    pub backtracks: Vec<BacktrackEvent>,
    /// Gaps still open, with reasons.
    pub unresolved: Vec<UnresolvedGap>,
    /// Preferences the final roster does not honor, with reasons.
    pub unmet_preferences: Vec<UnmetPreference>,
    /// Passes executed.
    pub passes: usize,
    /// Filled cells at the end of the run.
    pub filled_cells: usize,
    /// Total cells in the roster.
    pub total_cells: usize,
    /// Aggregated chain-search counters.
    pub search: SearchStats,
}

impl RepairReport {
    /// Whether the roster ended the run complete.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.filled_cells == self.total_cells
    }
}

/// Gap-traversal perturbations, rotated on every backtrack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraversalStrategy {
    Priority,
    Reversed,
    SeverityFirst,
    Shuffled,
}

impl TraversalStrategy {
    fn next(self) -> Self {
        match self {
            TraversalStrategy::Priority => TraversalStrategy::Reversed,
            TraversalStrategy::Reversed => TraversalStrategy::SeverityFirst,
            TraversalStrategy::SeverityFirst => TraversalStrategy::Shuffled,
            TraversalStrategy::Shuffled => TraversalStrategy::Reversed,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TraversalStrategy::Priority => "priority",
            TraversalStrategy::Reversed => "reversed",
            TraversalStrategy::SeverityFirst => "severity-first",
            TraversalStrategy::Shuffled => "shuffled",
        }
    }
}

/// Snapshot for backtracking: roster, ledger, gaps, and how much of the
/// report had been written when it was taken.
struct Checkpoint {
    roster: Roster,
    usage: QuotaUsage,
    gaps: Vec<GapInfo>,
    direct_fills: usize,
    applied_chains: usize,
}

/// Stage B repair engine. Owns the roster for the duration of the run;
/// [`GapRepairer::into_roster`] hands it back.
pub struct GapRepairer<'a> {
    roster: Roster,
    staff: &'a [Staff],
    calendar: &'a MonthCalendar,
    constraints: &'a RosterConstraints,
    analyzer: GapAnalyzer<'a>,
    usage: QuotaUsage,
    gaps: Vec<GapInfo>,
    locked: HashSet<(NaiveDate, Role)>,
    observer: Option<RepairObserver<'a>>,
    rng: ChaCha8Rng,
}

impl<'a> GapRepairer<'a> {
    /// Creates a repairer around a roster.
    pub fn new(
        roster: Roster,
        staff: &'a [Staff],
        calendar: &'a MonthCalendar,
        constraints: &'a RosterConstraints,
    ) -> Self {
        let analyzer = GapAnalyzer::new(staff, calendar, constraints);
        let usage = QuotaUsage::tally(&roster, calendar);
        let gaps = analyzer.analyze(&roster, &usage);
        let locked = locked_assignments(&roster, staff);
        let rng = ChaCha8Rng::seed_from_u64(constraints.seed);
        Self {
            roster,
            staff,
            calendar,
            constraints,
            analyzer,
            usage,
            gaps,
            locked,
            observer: None,
            rng,
        }
    }

    /// Subscribes a structured-event observer.
    pub fn with_observer(mut self, observer: impl FnMut(RepairEvent) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Current open gaps, hardest first.
    pub fn gaps(&self) -> &[GapInfo] {
        &self.gaps
    }

    /// Diagnostics view of the current gaps for UI collaborators.
    pub fn gap_details(&self) -> BTreeMap<NaiveDate, BTreeMap<Role, GapDetail>> {
        self.analyzer.gap_details(&self.gaps, &self.usage)
    }

    /// The roster in its current state.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Consumes the repairer, returning the roster.
    pub fn into_roster(self) -> Roster {
        self.roster
    }

    /// Re-checks every hard rule plus usage reconciliation.
    pub fn validate_all_constraints(&self) -> Vec<RosterViolation> {
        let mut violations =
            validate_roster(&self.roster, self.staff, self.calendar, self.constraints);
        violations.extend(reconcile_usage(
            &self.roster,
            self.calendar,
            &self.usage,
            self.staff,
        ));
        violations
    }

    /// Runs the repair loop until the roster is complete, no gap can be
    /// helped, or the backtrack budget is spent.
    pub fn run(&mut self, max_backtracks: usize) -> RepairReport {
        let mut report = RepairReport {
            total_cells: self.roster.total_cells(),
            ..RepairReport::default()
        };
        self.emit(RepairEvent::AnalysisCompleted {
            open_gaps: self.gaps.len(),
        });
        info!(open_gaps = self.gaps.len(), "repair run started");

        let mut strategy = TraversalStrategy::Priority;
        let mut last_good: Option<Checkpoint> = None;
        let mut backtracks = 0usize;

        while !self.gaps.is_empty() {
            report.passes += 1;
            self.emit(RepairEvent::PassStarted {
                pass: report.passes,
                open_gaps: self.gaps.len(),
            });

            let checkpoint = self.checkpoint(&report);
            let before = self.gaps.len();

            let progressed =
                self.direct_fill_pass(strategy, &mut report) || self.swap_pass(strategy, &mut report);

            if progressed {
                debug_assert!(self.gaps.len() < before, "a pass that progresses closes a gap");
                last_good = Some(checkpoint);
                continue;
            }

            // Deadlock: this pass changed nothing. Rolling back to its own
            // start would be a no-op, so rewind to the start of the
            // previous successful pass and retry under a different order.
            let Some(rewind) = last_good.take() else {
                debug!("deadlock with no checkpoint to rewind to");
                break;
            };
            if backtracks >= max_backtracks {
                warn!(backtracks, "backtrack budget exhausted");
                break;
            }
            backtracks += 1;
            strategy = strategy.next();
            self.restore(rewind, &mut report);
            report.backtracks.push(BacktrackEvent {
                pass: report.passes,
                strategy: strategy.name().to_string(),
            });
            self.emit(RepairEvent::Backtracked {
                count: backtracks,
                strategy: strategy.name().to_string(),
            });
            debug!(backtracks, strategy = strategy.name(), "rolled back and perturbed");
        }

        for gap in &self.gaps {
            report.unresolved.push(UnresolvedGap {
                date: gap.date,
                role: gap.role,
                reason: if gap.is_dead_end() {
                    UnresolvedReason::NoEligibleStaff
                } else {
                    UnresolvedReason::SearchExhausted
                },
            });
        }
        report.unmet_preferences = self.unmet_preferences();
        report.filled_cells = self.roster.filled_cells();

        self.emit(RepairEvent::Finished {
            unresolved: report.unresolved.len(),
        });
        info!(
            direct_fills = report.direct_fills.len(),
            chains = report.applied_chains.len(),
            backtracks = report.backtracks.len(),
            unresolved = report.unresolved.len(),
            "repair run finished"
        );
        report
    }

    /// Fills the first traversal-order gap that has a direct candidate.
    fn direct_fill_pass(&mut self, strategy: TraversalStrategy, report: &mut RepairReport) -> bool {
        let order = self.traversal(strategy);
        for idx in order {
            let (date, role, candidate) = {
                let gap = &self.gaps[idx];
                if gap.fillable.is_empty() {
                    continue;
                }
                let candidate = self.best_direct_candidate(gap);
                (gap.date, gap.role, candidate)
            };
            let Some(staff_id) = candidate else {
                continue;
            };
            let Some(kind) = self.calendar.day_kind(date) else {
                continue;
            };
            if !self.roster.assign(date, role, &staff_id) {
                continue;
            }
            self.usage.record(&staff_id, kind);
            self.refresh_gaps();
            report.direct_fills.push(DirectFill {
                date,
                role,
                staff: staff_id.clone(),
            });
            self.emit(RepairEvent::DirectFilled {
                date,
                role,
                staff: staff_id,
            });
            return true;
        }
        false
    }

    /// Best class-F candidate: preference match first, then lightest
    /// current load, then id for stability.
    fn best_direct_candidate(&self, gap: &GapInfo) -> Option<String> {
        gap.fillable
            .iter()
            .min_by_key(|id| {
                let prefers = self
                    .staff
                    .iter()
                    .find(|s| s.id == **id)
                    .is_some_and(|s| s.prefers(gap.date));
                (!prefers, self.usage.of(id).total(), (*id).clone())
            })
            .cloned()
    }

    /// Runs the chain search for the first swap-only gap and applies the
    /// best chain that survives re-validation.
    fn swap_pass(&mut self, strategy: TraversalStrategy, report: &mut RepairReport) -> bool {
        let order = self.traversal(strategy);
        for idx in order {
            let gap = self.gaps[idx].clone();
            if !gap.fillable.is_empty() || gap.swappable.is_empty() {
                continue;
            }

            let (chains, stats) = search::ChainSearch::new(
                self.staff,
                self.calendar,
                self.constraints,
                &self.roster,
                &self.usage,
                &self.locked,
            )
            .run(&gap);
            report.search.absorb(stats);
            self.emit(RepairEvent::SearchProgress {
                explored: report.search.explored,
                found: report.search.found,
            });

            for chain in &chains {
                if self.apply_chain(&gap, chain, report) {
                    self.emit(RepairEvent::ChainApplied {
                        date: gap.date,
                        role: gap.role,
                        steps: chain.len(),
                    });
                    return true;
                }
            }
        }
        false
    }

    /// Re-validates and applies a chain atomically: all steps land on a
    /// scratch roster, and the real roster is only replaced when the
    /// scratch passes a full hard-rule check.
    fn apply_chain(&mut self, gap: &GapInfo, chain: &SwapChain, report: &mut RepairReport) -> bool {
        let Some(scratch) = chain::simulate(&self.roster, &chain.steps) else {
            return false;
        };
        if !validate_roster(&scratch, self.staff, self.calendar, self.constraints).is_empty() {
            return false;
        }

        self.roster = scratch;
        self.usage = QuotaUsage::tally(&self.roster, self.calendar);
        self.refresh_gaps();
        report.applied_chains.push(AppliedChain {
            date: gap.date,
            role: gap.role,
            steps: chain.steps.iter().map(SwapStep::describe).collect(),
            score: chain.score,
        });
        true
    }

    /// Gap indices in the order the current strategy wants them visited.
    fn traversal(&mut self, strategy: TraversalStrategy) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.gaps.len()).collect();
        match strategy {
            TraversalStrategy::Priority => {}
            TraversalStrategy::Reversed => order.reverse(),
            TraversalStrategy::SeverityFirst => {
                order.sort_by(|&a, &b| {
                    self.gaps[b]
                        .severity
                        .partial_cmp(&self.gaps[a].severity)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            TraversalStrategy::Shuffled => order.shuffle(&mut self.rng),
        }
        order
    }

    fn refresh_gaps(&mut self) {
        self.gaps = self.analyzer.analyze(&self.roster, &self.usage);
    }

    fn checkpoint(&self, report: &RepairReport) -> Checkpoint {
        Checkpoint {
            roster: self.roster.clone(),
            usage: self.usage.clone(),
            gaps: self.gaps.clone(),
            direct_fills: report.direct_fills.len(),
            applied_chains: report.applied_chains.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint, report: &mut RepairReport) {
        self.roster = checkpoint.roster;
        self.usage = checkpoint.usage;
        self.gaps = checkpoint.gaps;
        report.direct_fills.truncate(checkpoint.direct_fills);
        report.applied_chains.truncate(checkpoint.applied_chains);
    }

    /// Preferences the current roster does not honor.
    fn unmet_preferences(&self) -> Vec<UnmetPreference> {
        let mut unmet = Vec::new();
        for s in self.staff {
            for &date in &s.preferred {
                if !self.calendar.contains(date) {
                    continue;
                }
                match self.roster.holder(date, s.role) {
                    Some(holder) if holder == s.id => {}
                    Some(_) => unmet.push(UnmetPreference {
                        staff: s.id.clone(),
                        date,
                        role: s.role,
                        reason: UnmetPreferenceReason::LostTieBreak,
                    }),
                    None => unmet.push(UnmetPreference {
                        staff: s.id.clone(),
                        date,
                        role: s.role,
                        reason: UnmetPreferenceReason::SlotLeftOpen,
                    }),
                }
            }
        }
        unmet
    }

    fn emit(&mut self, event: RepairEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(event);
        }
    }
}

/// Assignments that sit on their holder's own preference date are locked:
/// chains must not move them.
fn locked_assignments(roster: &Roster, staff: &[Staff]) -> HashSet<(NaiveDate, Role)> {
    let mut locked = HashSet::new();
    for slot in roster.iter() {
        for role in Role::ALL {
            if let Some(holder) = slot.holder(role) {
                if staff
                    .iter()
                    .find(|s| s.id == holder)
                    .is_some_and(|s| s.prefers(slot.date))
                {
                    locked.insert((slot.date, role));
                }
            }
        }
    }
    locked
}
