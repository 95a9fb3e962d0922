//! Planning and risk oracles.
//!
//! Oracles are opaque producers of suggestions. The engine fixes the shape of
//! their requests and responses and checks that a response is well formed
//! before acting on it; how the oracle reached its answer is not its concern.
//! The built-in implementations are small deterministic heuristics so the
//! tool stays usable without an external service. Responses from any other
//! oracle can be fed in as JSON.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::fields::Status;
use crate::parser::{self, ParseVariant};
use crate::reconciler::{Plan, PlanItems};
use crate::task::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanningInput {
    Tasks(Vec<Task>),
    RawText(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningRequest {
    #[serde(flatten)]
    pub input: PlanningInput,
    pub team_capacity_hours: f64,
    pub sprint_duration_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadShare {
    /// `None` collects unassigned tasks.
    pub member_id: Option<MemberId>,
    pub task_ids: Vec<TaskId>,
    pub story_points: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningResponse {
    pub sprint_name: String,
    #[serde(default)]
    pub recommended_task_ids: Vec<TaskId>,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub total_story_points: u64,
    #[serde(default)]
    pub workload_distribution: Vec<WorkloadShare>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

pub trait PlanningOracle {
    fn propose(&self, request: &PlanningRequest) -> Result<PlanningResponse, OracleError>;
}

/// Check a planning response against the request it answers.
pub fn validate_suggestion(request: &PlanningRequest, response: &PlanningResponse) -> Result<(), OracleError> {
    if response.sprint_name.trim().is_empty() {
        return Err(OracleError::Malformed("sprint name is empty".into()));
    }
    let mut seen = HashSet::new();
    for id in &response.recommended_task_ids {
        if !seen.insert(*id) {
            return Err(OracleError::Malformed(format!("task {id} recommended twice")));
        }
    }
    match &request.input {
        PlanningInput::Tasks(tasks) => {
            let known: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();
            if let Some(id) = response.recommended_task_ids.iter().find(|id| !known.contains(id)) {
                return Err(OracleError::Malformed(format!("task {id} was not offered to the planner")));
            }
        }
        PlanningInput::RawText(_) => {
            if !response.recommended_task_ids.is_empty() {
                return Err(OracleError::Malformed("text plans cannot recommend existing tasks".into()));
            }
        }
    }
    Ok(())
}

impl Plan {
    /// Existing-task plan for the tasks a validated suggestion recommends.
    pub fn from_suggestion(response: &PlanningResponse, team_id: TeamId, start: NaiveDate, end: NaiveDate) -> Plan {
        Plan {
            sprint: NewSprint {
                team_id,
                name: response.sprint_name.trim().to_string(),
                goal: response.reasoning.clone(),
                status: Default::default(),
                start_date: start,
                end_date: end,
            },
            items: PlanItems::Existing { task_ids: response.recommended_task_ids.clone() },
        }
    }
}

/// Greedy planner: fills the sprint by priority, oldest first, until the
/// team's capacity in points is used up.
#[derive(Debug, Clone)]
pub struct CapacityPlanner {
    pub hours_per_point: f64,
}

impl Default for CapacityPlanner {
    fn default() -> Self {
        CapacityPlanner { hours_per_point: 4.0 }
    }
}

impl CapacityPlanner {
    fn capacity_points(&self, hours: f64) -> Result<u64, OracleError> {
        if !(self.hours_per_point > 0.0) || !(hours >= 0.0) {
            return Err(OracleError::Unavailable(format!(
                "cannot plan {hours} hours at {} hours per point",
                self.hours_per_point
            )));
        }
        // `as` saturates, so infinite hours mean unlimited capacity.
        Ok((hours / self.hours_per_point).floor() as u64)
    }
}

impl PlanningOracle for CapacityPlanner {
    fn propose(&self, request: &PlanningRequest) -> Result<PlanningResponse, OracleError> {
        let capacity = self.capacity_points(request.team_capacity_hours)?;
        let days = request.sprint_duration_days;
        match &request.input {
            PlanningInput::Tasks(tasks) => {
                let mut open: Vec<&Task> = tasks.iter().filter(|t| t.status != Status::Done).collect();
                open.sort_by(|a, b| {
                    a.priority
                        .rank()
                        .cmp(&b.priority.rank())
                        .then(a.created_at.cmp(&b.created_at))
                        .then(a.id.cmp(&b.id))
                });

                let mut total = 0u64;
                let mut picked = Vec::new();
                let mut left_out = 0usize;
                for t in open {
                    let points = u64::from(t.points());
                    if total + points <= capacity {
                        total += points;
                        picked.push(t);
                    } else {
                        left_out += 1;
                    }
                }

                let mut shares: BTreeMap<Option<MemberId>, WorkloadShare> = BTreeMap::new();
                for t in &picked {
                    let share = shares.entry(t.assignee).or_insert_with(|| WorkloadShare {
                        member_id: t.assignee,
                        task_ids: Vec::new(),
                        story_points: 0,
                    });
                    share.task_ids.push(t.id);
                    share.story_points += u64::from(t.points());
                }

                let mut risk_factors = Vec::new();
                let unestimated = picked.iter().filter(|t| t.story_points.is_none()).count();
                if unestimated > 0 {
                    risk_factors.push(format!("{unestimated} recommended tasks have no estimate"));
                }
                if left_out > 0 {
                    risk_factors.push(format!("{left_out} open tasks did not fit the capacity of {capacity} points"));
                }

                Ok(PlanningResponse {
                    sprint_name: format!("{days}-day sprint ({total} points)"),
                    recommended_task_ids: picked.iter().map(|t| t.id).collect(),
                    reasoning: Some(format!(
                        "Picked {} tasks by priority and age within {capacity} points of capacity.",
                        picked.len()
                    )),
                    total_story_points: total,
                    workload_distribution: shares.into_values().collect(),
                    risk_factors,
                })
            }
            PlanningInput::RawText(text) => {
                let drafts = parser::parse(text, ParseVariant::Planner);
                let total: u64 = drafts.iter().map(|d| u64::from(d.story_points)).sum();
                let mut risk_factors = Vec::new();
                if total > capacity {
                    risk_factors.push(format!("drafts need {total} points but capacity is {capacity}"));
                }
                Ok(PlanningResponse {
                    sprint_name: format!("{days}-day sprint ({total} points)"),
                    recommended_task_ids: Vec::new(),
                    reasoning: Some(format!("{} drafts totalling {total} points.", drafts.len())),
                    total_story_points: total,
                    workload_distribution: Vec::new(),
                    risk_factors,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRequest {
    pub tasks: Vec<Task>,
    pub team_members: Vec<Member>,
    pub current_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverloadedMember {
    pub member_id: MemberId,
    pub name: String,
    pub story_points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedTask {
    pub task_id: TaskId,
    pub title: String,
    pub due_date: Option<NaiveDate>,
}

impl FlaggedTask {
    fn of(t: &Task) -> Self {
        FlaggedTask { task_id: t.id, title: t.title.clone(), due_date: t.due_date }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub overloaded_members: Vec<OverloadedMember>,
    pub delayed_tasks: Vec<FlaggedTask>,
    pub blocked_tasks: Vec<FlaggedTask>,
    pub recommendations: Vec<String>,
}

pub trait RiskOracle {
    fn assess(&self, request: &RiskRequest) -> Result<RiskReport, OracleError>;
}

/// Heatmap over open work: who carries too many points, what is overdue,
/// and what is in flight with nobody on it.
#[derive(Debug, Clone)]
pub struct HeuristicRiskOracle {
    pub max_points_per_member: u32,
}

impl Default for HeuristicRiskOracle {
    fn default() -> Self {
        HeuristicRiskOracle { max_points_per_member: 13 }
    }
}

impl RiskOracle for HeuristicRiskOracle {
    fn assess(&self, request: &RiskRequest) -> Result<RiskReport, OracleError> {
        let open: Vec<&Task> = request.tasks.iter().filter(|t| t.status != Status::Done).collect();
        let mut report = RiskReport::default();

        for member in &request.team_members {
            let points: u64 =
                open.iter().filter(|t| t.assignee == Some(member.id)).map(|t| u64::from(t.points())).sum();
            if points > u64::from(self.max_points_per_member) {
                report.recommendations.push(format!(
                    "Rebalance work from {}: {points} points against a limit of {}",
                    member.name, self.max_points_per_member
                ));
                report.overloaded_members.push(OverloadedMember {
                    member_id: member.id,
                    name: member.name.clone(),
                    story_points: points,
                });
            }
        }

        for t in &open {
            if t.due_date.is_some_and(|d| d < request.current_date) {
                report.recommendations.push(format!("Re-plan '{}': past its due date", t.title));
                report.delayed_tasks.push(FlaggedTask::of(t));
            }
            if matches!(t.status, Status::InProgress | Status::Review) && t.assignee.is_none() {
                report.blocked_tasks.push(FlaggedTask::of(t));
            }
        }
        if !report.blocked_tasks.is_empty() {
            report
                .recommendations
                .push(format!("Assign owners to {} in-flight tasks", report.blocked_tasks.len()));
        }
        Ok(report)
    }
}
