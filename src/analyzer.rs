//! Gap analysis.
//!
//! For every empty (date, role) cell the analyzer partitions the staff of
//! that role into three classes with one eligibility pass each:
//!
//! - **fillable**: assignable right now;
//! - **swappable**: blocked by quota and nothing else, so a swap chain
//!   that frees quota can place them;
//! - **unavailable**: blocked by some other rule (blackout, reservation,
//!   consecutive run, same-day duty), recorded with the blocking reason.
//!
//! Each gap then gets priority metrics (severity, opportunity cost,
//! future impact, uniqueness) and the list is returned hardest-first.
//! Analysis is a pure function of the roster: re-running it on an
//! unchanged roster reproduces the same classifications and scores.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::eligibility::{DenialReason, EligibilityChecker, ReservationIndex};
use crate::models::{
    DayKind, MonthCalendar, QuotaUsage, Role, Roster, RosterConstraints, Staff,
};

/// One empty cell with its candidate classification and priority metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapInfo {
    /// Gap date.
    pub date: NaiveDate,
    /// Gap role.
    pub role: Role,
    /// Period type of the date.
    pub kind: DayKind,
    /// Civil-calendar weekend flag (severity weighting only).
    pub is_weekend: bool,
    /// Class F: staff assignable right now, in staff-list order.
    pub fillable: Vec<String>,
    /// Class S: staff blocked by quota alone.
    pub swappable: Vec<String>,
    /// Class U: staff blocked by anything else, with the blocking rule.
    pub unavailable: Vec<(String, DenialReason)>,
    /// How bad it is to leave this gap open (0–100).
    pub severity: f64,
    /// Cost of consuming this gap's candidates (0–100).
    pub opportunity_cost: f64,
    /// Estimated knock-on effect on later days (0–100).
    pub future_impact: f64,
    /// Candidate scarcity (0–100; fewer candidates = higher).
    pub uniqueness: f64,
    /// Combined processing priority; gaps are handled in descending order.
    pub priority: f64,
}

impl GapInfo {
    /// Whether no class has any candidate.
    pub fn is_dead_end(&self) -> bool {
        self.fillable.is_empty() && self.swappable.is_empty()
    }

    /// Total candidates across class F and S.
    fn candidate_count(&self) -> usize {
        self.fillable.len() + self.swappable.len()
    }
}

/// Diagnostics view of one gap for an interactive collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapDetail {
    /// Staff assignable immediately.
    pub fillable_now: Vec<String>,
    /// Staff not directly assignable, each with the blocking explanation
    /// (quota-blocked staff first, then the outright unavailable).
    pub needs_adjustment: Vec<AdjustmentCandidate>,
    /// The gap's processing priority.
    pub priority: f64,
    /// The gap's severity.
    pub severity: f64,
}

/// A blocked candidate and why it cannot be placed directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentCandidate {
    /// Staff id.
    pub staff: String,
    /// Human-readable blocking explanation.
    pub reason: String,
}

/// Classifies gaps and computes their priority metrics.
pub struct GapAnalyzer<'a> {
    staff: &'a [Staff],
    calendar: &'a MonthCalendar,
    constraints: &'a RosterConstraints,
    reservations: ReservationIndex,
}

impl<'a> GapAnalyzer<'a> {
    /// Creates an analyzer over the run's fixed inputs.
    pub fn new(
        staff: &'a [Staff],
        calendar: &'a MonthCalendar,
        constraints: &'a RosterConstraints,
    ) -> Self {
        Self {
            staff,
            calendar,
            constraints,
            reservations: ReservationIndex::build(staff, calendar),
        }
    }

    /// Classifies every empty cell and returns the gaps sorted by
    /// descending priority (ties broken by date, then role).
    pub fn analyze(&self, roster: &Roster, usage: &QuotaUsage) -> Vec<GapInfo> {
        let checker =
            EligibilityChecker::new(self.calendar, self.constraints, &self.reservations);

        let mut gaps: Vec<GapInfo> = roster
            .open_cells()
            .into_iter()
            .filter_map(|(date, role)| self.classify(&checker, date, role, roster, usage))
            .collect();

        // Opportunity cost needs the full gap list: a gap is expensive
        // when filling it would strand another gap's only direct option.
        let costs: Vec<f64> = gaps
            .iter()
            .map(|gap| self.opportunity_cost(gap, &gaps))
            .collect();
        for (gap, cost) in gaps.iter_mut().zip(costs) {
            gap.opportunity_cost = cost;
            gap.priority = 0.3 * gap.severity
                + 0.3 * gap.opportunity_cost
                + 0.2 * gap.future_impact
                + 0.2 * gap.uniqueness;
        }

        gaps.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.date.cmp(&b.date))
                .then_with(|| a.role.cmp(&b.role))
        });
        debug!(gaps = gaps.len(), "gap analysis complete");
        gaps
    }

    fn classify(
        &self,
        checker: &EligibilityChecker<'_>,
        date: NaiveDate,
        role: Role,
        roster: &Roster,
        usage: &QuotaUsage,
    ) -> Option<GapInfo> {
        let kind = self.calendar.day_kind(date)?;

        let mut gap = GapInfo {
            date,
            role,
            kind,
            is_weekend: MonthCalendar::is_weekend(date),
            fillable: Vec::new(),
            swappable: Vec::new(),
            unavailable: Vec::new(),
            severity: 0.0,
            opportunity_cost: 0.0,
            future_impact: 0.0,
            uniqueness: 0.0,
            priority: 0.0,
        };

        for staff in self.staff.iter().filter(|s| s.role == role) {
            match checker.check(staff, date, role, roster, usage) {
                Ok(()) => gap.fillable.push(staff.id.clone()),
                Err(_) => match checker.check_ignoring_quota(staff, date, role, roster, usage) {
                    // Quota was the only blocker
                    Ok(()) => gap.swappable.push(staff.id.clone()),
                    Err(reason) => gap.unavailable.push((staff.id.clone(), reason)),
                },
            }
        }

        gap.severity = self.severity(&gap);
        gap.future_impact = (2.0 * self.calendar.days_after(date) as f64).min(100.0);
        gap.uniqueness = match gap.candidate_count() {
            0 => 100.0,
            1 => 80.0,
            2 => 60.0,
            3..=4 => 40.0,
            _ => 20.0,
        };
        Some(gap)
    }

    fn severity(&self, gap: &GapInfo) -> f64 {
        let mut score: f64 = 50.0;
        if gap.kind == DayKind::Holiday {
            score += 20.0;
        }
        if gap.is_weekend {
            score += 10.0;
        }
        if gap.role == Role::Senior {
            score += 10.0;
        }
        if gap.fillable.is_empty() {
            score += 20.0;
        }
        if gap.swappable.is_empty() {
            score += 30.0;
        }
        score.min(100.0)
    }

    fn opportunity_cost(&self, gap: &GapInfo, all: &[GapInfo]) -> f64 {
        if gap.fillable.is_empty() {
            return if gap.swappable.is_empty() { 100.0 } else { 50.0 };
        }
        // Other gaps whose only direct candidate this gap could consume
        let endangered = all
            .iter()
            .filter(|other| !(other.date == gap.date && other.role == gap.role))
            .filter(|other| {
                other.fillable.len() == 1 && gap.fillable.contains(&other.fillable[0])
            })
            .count();
        (10.0 + 25.0 * endangered as f64).min(100.0)
    }

    /// Builds the per-date, per-role diagnostics map consumed by UI
    /// collaborators.
    pub fn gap_details(
        &self,
        gaps: &[GapInfo],
        usage: &QuotaUsage,
    ) -> BTreeMap<NaiveDate, BTreeMap<Role, GapDetail>> {
        let mut details: BTreeMap<NaiveDate, BTreeMap<Role, GapDetail>> = BTreeMap::new();
        for gap in gaps {
            let mut needs_adjustment: Vec<AdjustmentCandidate> = gap
                .swappable
                .iter()
                .map(|id| {
                    let (used, quota) = self
                        .staff
                        .iter()
                        .find(|s| s.id == *id)
                        .map(|s| (usage.used(id, gap.kind), s.quota(gap.kind)))
                        .unwrap_or((0, 0));
                    AdjustmentCandidate {
                        staff: id.clone(),
                        reason: format!("{} quota exhausted ({used}/{quota})", gap.kind),
                    }
                })
                .collect();
            needs_adjustment.extend(gap.unavailable.iter().map(|(id, reason)| {
                AdjustmentCandidate {
                    staff: id.clone(),
                    reason: reason.to_string(),
                }
            }));

            details.entry(gap.date).or_default().insert(
                gap.role,
                GapDetail {
                    fillable_now: gap.fillable.clone(),
                    needs_adjustment,
                    priority: gap.priority,
                    severity: gap.severity,
                },
            );
        }
        details
    }
}
