//! Persisted records and the field sets used to create them.
//!
//! This module defines the `Task` and `Sprint` records, the membership row
//! linking them, the team-scoped reference records (teams, members, epics and
//! labels) and the ephemeral `DraftTask` produced by the text parser.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::*;

pub type TaskId = u64;
pub type SprintId = u64;
pub type TeamId = u64;
pub type MemberId = u64;
pub type EpicId = u64;
pub type LabelId = u64;

/// A work item on a team's board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub team_id: TeamId,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: Status,
    pub priority: Priority,
    pub story_points: Option<u32>,
    pub assignee: Option<MemberId>,
    pub due_date: Option<NaiveDate>,
    pub epic: Option<EpicId>,
    #[serde(default)]
    pub labels: BTreeSet<LabelId>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Story points with an unestimated task counted as zero.
    pub fn points(&self) -> u32 {
        self.story_points.unwrap_or(0)
    }
}

/// Field values for a task that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub team_id: TeamId,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    pub story_points: Option<u32>,
    pub assignee: Option<MemberId>,
    pub due_date: Option<NaiveDate>,
    pub epic: Option<EpicId>,
    #[serde(default)]
    pub labels: BTreeSet<LabelId>,
}

/// Partial edit of a task's fields. `None` leaves a field untouched; the
/// `clear_*` flags unset optional fields.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Option<Priority>,
    pub story_points: Option<u32>,
    pub assignee: Option<MemberId>,
    pub due_date: Option<NaiveDate>,
    pub epic: Option<EpicId>,
    pub add_labels: Vec<LabelId>,
    pub remove_labels: Vec<LabelId>,
    pub clear_assignee: bool,
    pub clear_due: bool,
    pub clear_epic: bool,
    pub clear_points: bool,
}

impl TaskPatch {
    /// Apply this patch to a copy of `task`.
    pub fn apply(&self, task: &Task) -> Task {
        let mut t = task.clone();
        if let Some(title) = &self.title {
            t.title = title.trim().to_string();
        }
        if let Some(desc) = &self.description {
            t.description = Some(desc.clone()).filter(|d| !d.trim().is_empty());
        }
        if let Some(ty) = self.task_type {
            t.task_type = ty;
        }
        if let Some(p) = self.priority {
            t.priority = p;
        }
        if self.clear_points {
            t.story_points = None;
        } else if let Some(sp) = self.story_points {
            t.story_points = Some(sp);
        }
        if self.clear_assignee {
            t.assignee = None;
        } else if let Some(a) = self.assignee {
            t.assignee = Some(a);
        }
        if self.clear_due {
            t.due_date = None;
        } else if let Some(d) = self.due_date {
            t.due_date = Some(d);
        }
        if self.clear_epic {
            t.epic = None;
        } else if let Some(e) = self.epic {
            t.epic = Some(e);
        }
        t.labels.extend(self.add_labels.iter().copied());
        for l in &self.remove_labels {
            t.labels.remove(l);
        }
        t
    }
}

/// A time-boxed iteration a team commits tasks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: SprintId,
    pub team_id: TeamId,
    pub name: String,
    pub goal: Option<String>,
    pub status: SprintStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Field values for a sprint that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSprint {
    pub team_id: TeamId,
    pub name: String,
    pub goal: Option<String>,
    #[serde(default)]
    pub status: SprintStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// "This task is currently on this sprint's board."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintMembership {
    pub sprint_id: SprintId,
    pub task_id: TaskId,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Team {
    pub fn has_member(&self, member: MemberId) -> bool {
        self.members.iter().any(|m| m.id == member)
    }

    pub fn member(&self, member: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    pub team_id: TeamId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub team_id: TeamId,
    pub name: String,
}

/// Parser output: a candidate task that exists only until the reconciler
/// persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTask {
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub priority: Priority,
    pub story_points: u32,
    /// 0-based line index in the raw input text.
    pub source_line: usize,
}

impl DraftTask {
    /// Field values for persisting this draft into `team_id`.
    pub fn to_new_task(&self, team_id: TeamId) -> NewTask {
        NewTask {
            team_id,
            title: self.title.clone(),
            task_type: self.task_type,
            priority: self.priority,
            story_points: Some(self.story_points),
            ..NewTask::default()
        }
    }
}

/// Normalise a label name by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_label(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Task {
        Task {
            id: 1,
            team_id: 1,
            title: "Write docs".into(),
            description: None,
            task_type: TaskType::Task,
            status: Status::Todo,
            priority: Priority::Medium,
            story_points: Some(3),
            assignee: Some(4),
            due_date: None,
            epic: None,
            labels: BTreeSet::from([1, 2]),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn patch_clears_take_precedence() {
        let patch = TaskPatch {
            assignee: Some(9),
            clear_assignee: true,
            story_points: Some(8),
            remove_labels: vec![2],
            add_labels: vec![5],
            title: Some("  Write better docs ".into()),
            ..TaskPatch::default()
        };
        let t = patch.apply(&sample());
        assert_eq!(t.assignee, None);
        assert_eq!(t.story_points, Some(8));
        assert_eq!(t.labels, BTreeSet::from([1, 5]));
        assert_eq!(t.title, "Write better docs");
    }

    #[test]
    fn label_names_are_normalised() {
        assert_eq!(normalise_label("  Tech Debt "), "tech-debt");
    }
}
