//! The persistence collaborator seen by the engine.
//!
//! Everything the engine reads or writes goes through [`Store`]. The JSON file
//! database in [`crate::db`] is the bundled implementation; tests wrap it to
//! inject failures.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::task::*;

/// Which tasks `query_tasks` returns. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub team_id: Option<TeamId>,
    pub ids: Option<BTreeSet<TaskId>>,
}

impl TaskQuery {
    pub fn team(team_id: TeamId) -> Self {
        TaskQuery { team_id: Some(team_id), ..TaskQuery::default() }
    }

    pub fn ids(ids: impl IntoIterator<Item = TaskId>) -> Self {
        TaskQuery { ids: Some(ids.into_iter().collect()), ..TaskQuery::default() }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.team_id.map_or(true, |t| task.team_id == t)
            && self.ids.as_ref().map_or(true, |ids| ids.contains(&task.id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SprintQuery {
    pub team_id: Option<TeamId>,
    pub id: Option<SprintId>,
}

impl SprintQuery {
    pub fn team(team_id: TeamId) -> Self {
        SprintQuery { team_id: Some(team_id), id: None }
    }

    pub fn matches(&self, sprint: &Sprint) -> bool {
        self.team_id.map_or(true, |t| sprint.team_id == t) && self.id.map_or(true, |id| sprint.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MembershipQuery {
    pub sprint_ids: Option<BTreeSet<SprintId>>,
    pub task_id: Option<TaskId>,
}

impl MembershipQuery {
    pub fn sprint(sprint_id: SprintId) -> Self {
        MembershipQuery { sprint_ids: Some(BTreeSet::from([sprint_id])), task_id: None }
    }

    pub fn sprints(ids: impl IntoIterator<Item = SprintId>) -> Self {
        MembershipQuery { sprint_ids: Some(ids.into_iter().collect()), task_id: None }
    }

    pub fn task(task_id: TaskId) -> Self {
        MembershipQuery { sprint_ids: None, task_id: Some(task_id) }
    }

    pub fn matches(&self, m: &SprintMembership) -> bool {
        self.sprint_ids.as_ref().map_or(true, |ids| ids.contains(&m.sprint_id))
            && self.task_id.map_or(true, |t| m.task_id == t)
    }
}

/// Persistence operations the engine depends on.
///
/// Every call returns its outcome to the caller; implementations must not
/// defer or queue writes.
pub trait Store {
    fn create_team(&mut self, name: &str) -> Result<Team, StoreError>;
    fn add_member(&mut self, team_id: TeamId, name: &str) -> Result<Member, StoreError>;
    fn teams(&self) -> Result<Vec<Team>, StoreError>;
    fn team(&self, team_id: TeamId) -> Result<Team, StoreError>;

    fn create_epic(&mut self, team_id: TeamId, title: &str) -> Result<Epic, StoreError>;
    fn epics(&self, team_id: TeamId) -> Result<Vec<Epic>, StoreError>;
    fn create_label(&mut self, team_id: TeamId, name: &str) -> Result<Label, StoreError>;
    fn labels(&self, team_id: TeamId) -> Result<Vec<Label>, StoreError>;

    fn create_task(&mut self, fields: NewTask, created_at: DateTime<Utc>) -> Result<Task, StoreError>;
    /// Overwrite every field of the stored task with the same id.
    fn update_task(&mut self, task: &Task) -> Result<Task, StoreError>;
    /// Delete a task and every membership row pointing at it.
    fn delete_task(&mut self, id: TaskId) -> Result<(), StoreError>;
    fn query_tasks(&self, filter: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    fn create_sprint(&mut self, fields: NewSprint) -> Result<Sprint, StoreError>;
    fn update_sprint(&mut self, sprint: &Sprint) -> Result<Sprint, StoreError>;
    /// Delete a sprint and every membership row pointing at it.
    fn delete_sprint(&mut self, id: SprintId) -> Result<(), StoreError>;
    fn query_sprints(&self, filter: &SprintQuery) -> Result<Vec<Sprint>, StoreError>;

    /// Insert a membership row. Fails with `Conflict` if the task already has one.
    fn attach_membership(
        &mut self,
        sprint_id: SprintId,
        task_id: TaskId,
        added_at: DateTime<Utc>,
    ) -> Result<SprintMembership, StoreError>;
    fn detach_membership(&mut self, sprint_id: SprintId, task_id: TaskId) -> Result<(), StoreError>;
    /// Replace the task's membership row (if any) with one for `sprint_id` in
    /// a single write.
    fn relink_membership(
        &mut self,
        task_id: TaskId,
        sprint_id: SprintId,
        added_at: DateTime<Utc>,
    ) -> Result<SprintMembership, StoreError>;
    fn query_memberships(&self, filter: &MembershipQuery) -> Result<Vec<SprintMembership>, StoreError>;

    fn task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.query_tasks(&TaskQuery::ids([id]))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    fn sprint(&self, id: SprintId) -> Result<Sprint, StoreError> {
        self.query_sprints(&SprintQuery { team_id: None, id: Some(id) })?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("sprint", id))
    }
}

/// Immutable read of one team's tasks, sprints and membership rows.
///
/// Board projection and scope analysis are pure functions of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub team_id: TeamId,
    pub tasks: Vec<Task>,
    pub sprints: Vec<Sprint>,
    pub memberships: Vec<SprintMembership>,
}

impl Snapshot {
    /// Read everything the projections need for `team_id`.
    pub fn load<S: Store + ?Sized>(store: &S, team_id: TeamId) -> Result<Self, StoreError> {
        let tasks = store.query_tasks(&TaskQuery::team(team_id))?;
        let sprints = store.query_sprints(&SprintQuery::team(team_id))?;
        let memberships = store.query_memberships(&MembershipQuery::sprints(sprints.iter().map(|s| s.id)))?;
        tracing::debug!(
            team_id,
            tasks = tasks.len(),
            sprints = sprints.len(),
            memberships = memberships.len(),
            "loaded snapshot"
        );
        Ok(Snapshot { team_id, tasks, sprints, memberships })
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn sprint(&self, id: SprintId) -> Option<&Sprint> {
        self.sprints.iter().find(|s| s.id == id)
    }

    /// Map of task id to task, for joins.
    pub fn index(&self) -> HashMap<TaskId, &Task> {
        self.tasks.iter().map(|t| (t.id, t)).collect()
    }
}
