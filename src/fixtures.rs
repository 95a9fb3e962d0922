//! Shared test fixtures: seeded records and a store that fails on demand.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::db::Database;
use crate::error::StoreError;
use crate::fields::SprintStatus;
use crate::store::*;
use crate::task::*;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn at(y: i32, m: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, 12, 0, 0).unwrap()
}

pub fn team<S: Store>(store: &mut S) -> TeamId {
    store.create_team("Core").unwrap().id
}

pub fn sprint<S: Store>(store: &mut S, team_id: TeamId, name: &str, start: NaiveDate) -> SprintId {
    store
        .create_sprint(NewSprint {
            team_id,
            name: name.into(),
            goal: None,
            status: SprintStatus::Active,
            start_date: start,
            end_date: start + chrono::Duration::days(13),
        })
        .unwrap()
        .id
}

pub fn task<S: Store>(store: &mut S, team_id: TeamId, title: &str, points: Option<u32>) -> TaskId {
    store
        .create_task(
            NewTask { team_id, title: title.into(), story_points: points, ..NewTask::default() },
            at(2024, 12, 1),
        )
        .unwrap()
        .id
}

/// Database wrapper whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: Database,
    /// Every `update_task` call fails.
    pub fail_updates: bool,
    /// `create_task` calls (1-based, counted across the store's life) that fail.
    pub fail_creates: HashSet<usize>,
    /// Task ids whose `attach_membership` fails.
    pub fail_attach: HashSet<TaskId>,
    /// Every `team` lookup fails.
    pub fail_team_reads: bool,
    creates: usize,
}

impl FlakyStore {
    fn unavailable(op: &str) -> StoreError {
        StoreError::Unavailable(format!("{op} refused"))
    }
}

impl Store for FlakyStore {
    fn create_team(&mut self, name: &str) -> Result<Team, StoreError> {
        self.inner.create_team(name)
    }

    fn add_member(&mut self, team_id: TeamId, name: &str) -> Result<Member, StoreError> {
        self.inner.add_member(team_id, name)
    }

    fn teams(&self) -> Result<Vec<Team>, StoreError> {
        self.inner.teams()
    }

    fn team(&self, team_id: TeamId) -> Result<Team, StoreError> {
        if self.fail_team_reads {
            return Err(Self::unavailable("team"));
        }
        self.inner.team(team_id)
    }

    fn create_epic(&mut self, team_id: TeamId, title: &str) -> Result<Epic, StoreError> {
        self.inner.create_epic(team_id, title)
    }

    fn epics(&self, team_id: TeamId) -> Result<Vec<Epic>, StoreError> {
        self.inner.epics(team_id)
    }

    fn create_label(&mut self, team_id: TeamId, name: &str) -> Result<Label, StoreError> {
        self.inner.create_label(team_id, name)
    }

    fn labels(&self, team_id: TeamId) -> Result<Vec<Label>, StoreError> {
        self.inner.labels(team_id)
    }

    fn create_task(&mut self, fields: NewTask, created_at: DateTime<Utc>) -> Result<Task, StoreError> {
        self.creates += 1;
        if self.fail_creates.contains(&self.creates) {
            return Err(Self::unavailable("create_task"));
        }
        self.inner.create_task(fields, created_at)
    }

    fn update_task(&mut self, task: &Task) -> Result<Task, StoreError> {
        if self.fail_updates {
            return Err(Self::unavailable("update_task"));
        }
        self.inner.update_task(task)
    }

    fn delete_task(&mut self, id: TaskId) -> Result<(), StoreError> {
        self.inner.delete_task(id)
    }

    fn query_tasks(&self, filter: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        self.inner.query_tasks(filter)
    }

    fn create_sprint(&mut self, fields: NewSprint) -> Result<Sprint, StoreError> {
        self.inner.create_sprint(fields)
    }

    fn update_sprint(&mut self, sprint: &Sprint) -> Result<Sprint, StoreError> {
        self.inner.update_sprint(sprint)
    }

    fn delete_sprint(&mut self, id: SprintId) -> Result<(), StoreError> {
        self.inner.delete_sprint(id)
    }

    fn query_sprints(&self, filter: &SprintQuery) -> Result<Vec<Sprint>, StoreError> {
        self.inner.query_sprints(filter)
    }

    fn attach_membership(
        &mut self,
        sprint_id: SprintId,
        task_id: TaskId,
        added_at: DateTime<Utc>,
    ) -> Result<SprintMembership, StoreError> {
        if self.fail_attach.contains(&task_id) {
            return Err(Self::unavailable("attach_membership"));
        }
        self.inner.attach_membership(sprint_id, task_id, added_at)
    }

    fn detach_membership(&mut self, sprint_id: SprintId, task_id: TaskId) -> Result<(), StoreError> {
        self.inner.detach_membership(sprint_id, task_id)
    }

    fn relink_membership(
        &mut self,
        task_id: TaskId,
        sprint_id: SprintId,
        added_at: DateTime<Utc>,
    ) -> Result<SprintMembership, StoreError> {
        self.inner.relink_membership(task_id, sprint_id, added_at)
    }

    fn query_memberships(&self, filter: &MembershipQuery) -> Result<Vec<SprintMembership>, StoreError> {
        self.inner.query_memberships(filter)
    }
}
