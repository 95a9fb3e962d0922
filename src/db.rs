//! JSON-file database and date utilities.
//!
//! This module provides the `Database` struct, the bundled [`Store`]
//! implementation. All records live in one pretty-printed JSON document that
//! is rewritten atomically (temp file + rename) after every mutation. A
//! database without a path lives only in memory.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::*;
use crate::task::*;

/// Everything persisted in the database file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub epics: Vec<Epic>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub sprints: Vec<Sprint>,
    #[serde(default)]
    pub memberships: Vec<SprintMembership>,
    #[serde(default)]
    next_member_id: u64,
}

impl Tables {
    fn next_task_id(&self) -> TaskId {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    fn next_sprint_id(&self) -> SprintId {
        self.sprints.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, StoreError> {
        self.tasks.iter_mut().find(|t| t.id == id).ok_or_else(|| StoreError::not_found("task", id))
    }

    fn sprint_mut(&mut self, id: SprintId) -> Result<&mut Sprint, StoreError> {
        self.sprints.iter_mut().find(|s| s.id == id).ok_or_else(|| StoreError::not_found("sprint", id))
    }

    fn require_task(&self, id: TaskId) -> Result<(), StoreError> {
        if self.tasks.iter().any(|t| t.id == id) {
            Ok(())
        } else {
            Err(StoreError::not_found("task", id))
        }
    }

    fn require_sprint(&self, id: SprintId) -> Result<(), StoreError> {
        if self.sprints.iter().any(|s| s.id == id) {
            Ok(())
        } else {
            Err(StoreError::not_found("sprint", id))
        }
    }

    fn require_team(&self, id: TeamId) -> Result<(), StoreError> {
        if self.teams.iter().any(|t| t.id == id) {
            Ok(())
        } else {
            Err(StoreError::not_found("team", id))
        }
    }
}

/// JSON-file backed store.
#[derive(Debug, Default)]
pub struct Database {
    path: Option<PathBuf>,
    tables: Tables,
}

impl Database {
    /// Database that is never written to disk.
    pub fn in_memory() -> Self {
        Database::default()
    }

    /// Load the database at `path`, starting empty if the file doesn't exist.
    /// A file that exists but cannot be parsed is an error, never silently replaced.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let tables = if path.exists() {
            let mut buf = String::new();
            File::open(path)
                .and_then(|mut f| f.read_to_string(&mut buf))
                .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
            serde_json::from_str(&buf).map_err(|source| StoreError::Corrupt { path: path.to_path_buf(), source })?
        } else {
            tracing::info!(path = %path.display(), "database not found, starting empty");
            Tables::default()
        };
        Ok(Database { path: Some(path.to_path_buf()), tables })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Save database to its JSON file using atomic write (temp file + rename).
    fn save(&self, tables: &Tables) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(tables)?;
        let mut f = File::create(&tmp).map_err(io_err)?;
        f.write_all(data.as_bytes()).map_err(io_err)?;
        f.flush().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Apply `change` to a copy of the tables and persist it. The in-memory
    /// state only moves forward once the file write succeeded.
    fn write<T>(&mut self, change: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut next = self.tables.clone();
        let out = change(&mut next)?;
        self.save(&next)?;
        self.tables = next;
        Ok(out)
    }
}

impl Store for Database {
    fn create_team(&mut self, name: &str) -> Result<Team, StoreError> {
        let name = name.trim().to_string();
        self.write(|t| {
            if t.teams.iter().any(|team| team.name.eq_ignore_ascii_case(&name)) {
                return Err(StoreError::Conflict(format!("team '{name}' already exists")));
            }
            let team = Team { id: t.teams.iter().map(|x| x.id).max().unwrap_or(0) + 1, name, members: Vec::new() };
            t.teams.push(team.clone());
            Ok(team)
        })
    }

    fn add_member(&mut self, team_id: TeamId, name: &str) -> Result<Member, StoreError> {
        let name = name.trim().to_string();
        self.write(|t| {
            t.next_member_id += 1;
            let member = Member { id: t.next_member_id, name };
            let team = t
                .teams
                .iter_mut()
                .find(|x| x.id == team_id)
                .ok_or_else(|| StoreError::not_found("team", team_id))?;
            team.members.push(member.clone());
            Ok(member)
        })
    }

    fn teams(&self) -> Result<Vec<Team>, StoreError> {
        Ok(self.tables.teams.clone())
    }

    fn team(&self, team_id: TeamId) -> Result<Team, StoreError> {
        self.tables
            .teams
            .iter()
            .find(|t| t.id == team_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("team", team_id))
    }

    fn create_epic(&mut self, team_id: TeamId, title: &str) -> Result<Epic, StoreError> {
        let title = title.trim().to_string();
        self.write(|t| {
            t.require_team(team_id)?;
            let epic = Epic { id: t.epics.iter().map(|e| e.id).max().unwrap_or(0) + 1, team_id, title };
            t.epics.push(epic.clone());
            Ok(epic)
        })
    }

    fn epics(&self, team_id: TeamId) -> Result<Vec<Epic>, StoreError> {
        Ok(self.tables.epics.iter().filter(|e| e.team_id == team_id).cloned().collect())
    }

    fn create_label(&mut self, team_id: TeamId, name: &str) -> Result<Label, StoreError> {
        let name = normalise_label(name);
        self.write(|t| {
            t.require_team(team_id)?;
            if t.labels.iter().any(|l| l.team_id == team_id && l.name == name) {
                return Err(StoreError::Conflict(format!("label '{name}' already exists")));
            }
            let label = Label { id: t.labels.iter().map(|l| l.id).max().unwrap_or(0) + 1, team_id, name };
            t.labels.push(label.clone());
            Ok(label)
        })
    }

    fn labels(&self, team_id: TeamId) -> Result<Vec<Label>, StoreError> {
        Ok(self.tables.labels.iter().filter(|l| l.team_id == team_id).cloned().collect())
    }

    fn create_task(&mut self, fields: NewTask, created_at: DateTime<Utc>) -> Result<Task, StoreError> {
        self.write(|t| {
            t.require_team(fields.team_id)?;
            let task = Task {
                id: t.next_task_id(),
                team_id: fields.team_id,
                title: fields.title,
                description: fields.description,
                task_type: fields.task_type,
                status: fields.status,
                priority: fields.priority,
                story_points: fields.story_points,
                assignee: fields.assignee,
                due_date: fields.due_date,
                epic: fields.epic,
                labels: fields.labels,
                created_at,
            };
            t.tasks.push(task.clone());
            Ok(task)
        })
    }

    fn update_task(&mut self, task: &Task) -> Result<Task, StoreError> {
        self.write(|t| {
            let slot = t.task_mut(task.id)?;
            *slot = task.clone();
            Ok(task.clone())
        })
    }

    fn delete_task(&mut self, id: TaskId) -> Result<(), StoreError> {
        self.write(|t| {
            t.require_task(id)?;
            t.tasks.retain(|x| x.id != id);
            t.memberships.retain(|m| m.task_id != id);
            Ok(())
        })
    }

    fn query_tasks(&self, filter: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        Ok(self.tables.tasks.iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    fn create_sprint(&mut self, fields: NewSprint) -> Result<Sprint, StoreError> {
        self.write(|t| {
            t.require_team(fields.team_id)?;
            let sprint = Sprint {
                id: t.next_sprint_id(),
                team_id: fields.team_id,
                name: fields.name,
                goal: fields.goal,
                status: fields.status,
                start_date: fields.start_date,
                end_date: fields.end_date,
            };
            t.sprints.push(sprint.clone());
            Ok(sprint)
        })
    }

    fn update_sprint(&mut self, sprint: &Sprint) -> Result<Sprint, StoreError> {
        self.write(|t| {
            let slot = t.sprint_mut(sprint.id)?;
            *slot = sprint.clone();
            Ok(sprint.clone())
        })
    }

    fn delete_sprint(&mut self, id: SprintId) -> Result<(), StoreError> {
        self.write(|t| {
            t.require_sprint(id)?;
            t.sprints.retain(|s| s.id != id);
            t.memberships.retain(|m| m.sprint_id != id);
            Ok(())
        })
    }

    fn query_sprints(&self, filter: &SprintQuery) -> Result<Vec<Sprint>, StoreError> {
        Ok(self.tables.sprints.iter().filter(|s| filter.matches(s)).cloned().collect())
    }

    fn attach_membership(
        &mut self,
        sprint_id: SprintId,
        task_id: TaskId,
        added_at: DateTime<Utc>,
    ) -> Result<SprintMembership, StoreError> {
        self.write(|t| {
            t.require_sprint(sprint_id)?;
            t.require_task(task_id)?;
            if let Some(existing) = t.memberships.iter().find(|m| m.task_id == task_id) {
                return Err(StoreError::Conflict(format!(
                    "task {task_id} is already on sprint {}",
                    existing.sprint_id
                )));
            }
            let row = SprintMembership { sprint_id, task_id, added_at };
            t.memberships.push(row);
            Ok(row)
        })
    }

    fn detach_membership(&mut self, sprint_id: SprintId, task_id: TaskId) -> Result<(), StoreError> {
        self.write(|t| {
            let before = t.memberships.len();
            t.memberships.retain(|m| !(m.sprint_id == sprint_id && m.task_id == task_id));
            if t.memberships.len() == before {
                return Err(StoreError::not_found("membership for task", task_id));
            }
            Ok(())
        })
    }

    fn relink_membership(
        &mut self,
        task_id: TaskId,
        sprint_id: SprintId,
        added_at: DateTime<Utc>,
    ) -> Result<SprintMembership, StoreError> {
        self.write(|t| {
            t.require_sprint(sprint_id)?;
            t.require_task(task_id)?;
            t.memberships.retain(|m| m.task_id != task_id);
            let row = SprintMembership { sprint_id, task_id, added_at };
            t.memberships.push(row);
            Ok(row)
        })
    }

    fn query_memberships(&self, filter: &MembershipQuery) -> Result<Vec<SprintMembership>, StoreError> {
        Ok(self.tables.memberships.iter().filter(|m| filter.matches(m)).copied().collect())
    }
}

/// Parse human-readable date input.
///
/// Supports "today", "tomorrow", "yesterday", "in 3d", "in 2w" and "YYYY-MM-DD".
/// Offsets that leave the calendar are rejected.
pub fn parse_date_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        "yesterday" => return today.pred_opt(),
        _ => {}
    }
    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            let days = nd.trim().parse::<i64>().ok().and_then(Duration::try_days)?;
            return today.checked_add_signed(days);
        }
        if let Some(nw) = rest.strip_suffix('w') {
            let weeks = nw.trim().parse::<i64>().ok().and_then(Duration::try_weeks)?;
            return today.checked_add_signed(weeks);
        }
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = (d - today).num_days();
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {delta}d")
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
