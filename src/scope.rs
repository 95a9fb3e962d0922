//! Scope-creep analysis for active sprints.
//!
//! A sprint's baseline is every task already on it when the sprint started
//! (`added_at` at or before 00:00 UTC on the start date). Growth in story
//! points over that baseline raises an alert once it passes 15%, and a high
//! alert past 25%.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::fields::SprintStatus;
use crate::store::Snapshot;
use crate::task::*;

const MEDIUM_THRESHOLD_PCT: f64 = 15.0;
const HIGH_THRESHOLD_PCT: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Medium,
    High,
}

impl RiskLevel {
    fn from_increase(pct: f64) -> Option<RiskLevel> {
        if pct > HIGH_THRESHOLD_PCT {
            Some(RiskLevel::High)
        } else if pct > MEDIUM_THRESHOLD_PCT {
            Some(RiskLevel::Medium)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeAlert {
    pub sprint_id: SprintId,
    pub sprint_name: String,
    pub original_points: u64,
    pub current_points: u64,
    pub increase_pct: f64,
    pub risk: RiskLevel,
    /// Titles of tasks added after the sprint started, in membership order.
    pub added_task_titles: Vec<String>,
}

/// Point totals for one sprint, before thresholds are applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeMeasure {
    pub original_points: u64,
    pub current_points: u64,
    pub added_task_titles: Vec<String>,
}

impl ScopeMeasure {
    /// Percentage growth over the baseline, or `None` when there is no baseline.
    pub fn increase_pct(&self) -> Option<f64> {
        if self.original_points == 0 {
            return None;
        }
        let original = self.original_points as f64;
        Some((self.current_points as f64 - original) * 100.0 / original)
    }
}

fn sprint_start(sprint: &Sprint) -> DateTime<Utc> {
    sprint.start_date.and_time(NaiveTime::MIN).and_utc()
}

/// Sum baseline and current points for `sprint` from membership rows.
/// Unestimated tasks count as zero points. Totals are `u64` so a sprint of
/// `u32::MAX`-point tasks cannot overflow.
pub fn measure(sprint: &Sprint, memberships: &[SprintMembership], tasks: &HashMap<TaskId, &Task>) -> ScopeMeasure {
    let start = sprint_start(sprint);
    let mut original_points: u64 = 0;
    let mut current_points: u64 = 0;
    let mut added_task_titles = Vec::new();
    for row in memberships.iter().filter(|m| m.sprint_id == sprint.id) {
        let task = tasks.get(&row.task_id);
        let points = task.map_or(0, |t| u64::from(t.points()));
        current_points += points;
        if row.added_at <= start {
            original_points += points;
        } else if let Some(t) = task {
            added_task_titles.push(t.title.clone());
        }
    }
    ScopeMeasure { original_points, current_points, added_task_titles }
}

/// Scope alert for one sprint, if its growth crosses a threshold.
pub fn analyze(sprint: &Sprint, memberships: &[SprintMembership], tasks: &HashMap<TaskId, &Task>) -> Option<ScopeAlert> {
    let m = measure(sprint, memberships, tasks);
    let increase_pct = m.increase_pct()?;
    let risk = RiskLevel::from_increase(increase_pct)?;
    Some(ScopeAlert {
        sprint_id: sprint.id,
        sprint_name: sprint.name.clone(),
        original_points: m.original_points,
        current_points: m.current_points,
        increase_pct,
        risk,
        added_task_titles: m.added_task_titles,
    })
}

/// Alerts for every active sprint in the snapshot, in sprint id order.
pub fn scope_alerts(snapshot: &Snapshot) -> Vec<ScopeAlert> {
    let index = snapshot.index();
    let mut sprints: Vec<&Sprint> =
        snapshot.sprints.iter().filter(|s| s.status == SprintStatus::Active).collect();
    sprints.sort_by_key(|s| s.id);
    let alerts: Vec<ScopeAlert> =
        sprints.into_iter().filter_map(|s| analyze(s, &snapshot.memberships, &index)).collect();
    for a in &alerts {
        tracing::info!(sprint_id = a.sprint_id, risk = ?a.risk, increase_pct = a.increase_pct, "scope creep detected");
    }
    alerts
}
