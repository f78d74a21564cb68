//! Bounded beam search over unfilled cells.
//!
//! The beam holds up to `2 × beam_width` candidate states. Gaps are
//! processed one at a time in priority order (holidays before weekdays,
//! senior before junior); each beam member branches into its top
//! `branch_factor` eligible candidates, every child is scored by the
//! quality function, and only the best children survive to the next gap.
//!
//! Children never share state: each one clones its parent's roster and
//! usage, so scoring the expansion list is embarrassingly parallel and
//! runs on the rayon pool.

use rayon::prelude::*;
use tracing::debug;

use super::{rank_candidates, BeamScheduler, ProgressFn};
use crate::models::{DayKind, QuotaUsage, SchedulingState};

/// One beam entry: a candidate state plus its usage ledger, kept
/// incrementally so candidate filtering stays cheap.
pub(super) struct BeamItem {
    pub(super) state: SchedulingState,
    pub(super) usage: QuotaUsage,
}

/// Expands the seed states gap by gap and returns the surviving states,
/// best first.
pub(super) fn beam_search(
    sched: &BeamScheduler<'_>,
    seeds: Vec<BeamItem>,
    mut progress: Option<ProgressFn<'_>>,
) -> Vec<SchedulingState> {
    let constraints = sched.constraints();
    let mut gaps = seeds
        .first()
        .map(|item| item.state.unfilled.clone())
        .unwrap_or_default();

    // Holidays before weekdays, then calendar order, senior before junior.
    gaps.sort_by_key(|&(date, role)| {
        (
            sched.calendar().day_kind(date) != Some(DayKind::Holiday),
            date,
            role,
        )
    });
    gaps.truncate(constraints.max_beam_gaps);
    let total_steps = gaps.len();
    debug!(gaps = total_steps, "beam search started");

    let mut beam = seeds;
    let keep = constraints.beam_width * 2;

    for (step, &(date, role)) in gaps.iter().enumerate() {
        let kind = match sched.calendar().day_kind(date) {
            Some(kind) => kind,
            None => continue,
        };

        // Plan the expansion sequentially (cheap), evaluate in parallel.
        let mut carried = Vec::new();
        let mut branches: Vec<(usize, String)> = Vec::new();
        for (idx, item) in beam.iter().enumerate() {
            let checker = sched.checker();
            let eligible = sched.staff_of_role(role).filter(|s| {
                checker
                    .check(s, date, role, &item.state.roster, &item.usage)
                    .is_ok()
            });
            let ranked = rank_candidates(eligible, date, kind, &item.usage, sched.scarcity());
            if ranked.is_empty() {
                carried.push(idx);
            } else {
                for (staff, _) in ranked.into_iter().take(constraints.branch_factor) {
                    branches.push((idx, staff.id.clone()));
                }
            }
        }

        let children: Vec<BeamItem> = branches
            .par_iter()
            .map(|(parent_idx, staff_id)| {
                let parent = &beam[*parent_idx];
                let mut roster = parent.state.roster.clone();
                let mut usage = parent.usage.clone();
                roster.assign(date, role, staff_id);
                usage.record(staff_id, kind);
                let score = super::quality_score(
                    &roster,
                    sched.staff(),
                    sched.calendar(),
                    constraints,
                    sched.weights(),
                );
                BeamItem {
                    state: SchedulingState::new(roster, score),
                    usage,
                }
            })
            .collect();

        // Children first, then the items with no candidate for this gap,
        // which survive unchanged (`carried` is in ascending index order).
        let mut next: Vec<BeamItem> = children;
        for (idx, item) in beam.into_iter().enumerate() {
            if carried.binary_search(&idx).is_ok() {
                next.push(item);
            }
        }

        next.sort_by(|a, b| {
            b.state
                .score
                .partial_cmp(&a.state.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        next.truncate(keep.max(1));
        beam = next;

        if let Some(cb) = progress.as_mut() {
            cb((step + 1) as f64 / total_steps.max(1) as f64);
        }
    }

    if let Some(cb) = progress.as_mut() {
        cb(1.0);
    }

    beam.sort_by(|a, b| {
        b.state
            .score
            .partial_cmp(&a.state.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    beam.into_iter().map(|item| item.state).collect()
}
