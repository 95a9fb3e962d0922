//! Sprint membership ledger.
//!
//! A task is on at most one sprint of its team at a time. `attach` adds the
//! first link, `detach` removes it and `relink` moves a task between sprints
//! as one store write, so a failure can never leave the task unlinked halfway
//! through a move.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result, StoreError};
use crate::store::{MembershipQuery, Store};
use crate::task::*;

/// Outcome of a move between sprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relink {
    pub from: Option<SprintId>,
    pub row: SprintMembership,
}

fn same_team<S: Store + ?Sized>(store: &S, sprint_id: SprintId, task_id: TaskId) -> Result<(Sprint, Task)> {
    let sprint = store.sprint(sprint_id)?;
    let task = store.task(task_id)?;
    if sprint.team_id != task.team_id {
        return Err(EngineError::validation(format!(
            "task {task_id} belongs to team {} but sprint {sprint_id} belongs to team {}",
            task.team_id, sprint.team_id
        )));
    }
    Ok((sprint, task))
}

/// The sprint a task is currently on, if any.
pub fn sprint_of<S: Store + ?Sized>(store: &S, task_id: TaskId) -> Result<Option<SprintMembership>> {
    Ok(store.query_memberships(&MembershipQuery::task(task_id))?.into_iter().next())
}

/// Membership rows of one sprint.
pub fn members<S: Store + ?Sized>(store: &S, sprint_id: SprintId) -> Result<Vec<SprintMembership>> {
    Ok(store.query_memberships(&MembershipQuery::sprint(sprint_id))?)
}

/// Put a task on a sprint's board.
///
/// Attaching a task to the sprint it is already on returns the existing row
/// unchanged. Attaching a task that sits on another sprint is a conflict;
/// use [`relink`] to move it.
pub fn attach<S: Store + ?Sized>(
    store: &mut S,
    sprint_id: SprintId,
    task_id: TaskId,
    now: DateTime<Utc>,
) -> Result<SprintMembership> {
    same_team(store, sprint_id, task_id)?;
    if let Some(existing) = sprint_of(store, task_id)? {
        if existing.sprint_id == sprint_id {
            return Ok(existing);
        }
        return Err(StoreError::Conflict(format!(
            "task {task_id} is already on sprint {}; move it instead",
            existing.sprint_id
        ))
        .into());
    }
    let row = store.attach_membership(sprint_id, task_id, now)?;
    tracing::info!(sprint_id, task_id, "attached task to sprint");
    Ok(row)
}

/// Take a task off a sprint's board, returning it to the backlog.
pub fn detach<S: Store + ?Sized>(store: &mut S, sprint_id: SprintId, task_id: TaskId) -> Result<()> {
    store.detach_membership(sprint_id, task_id)?;
    tracing::info!(sprint_id, task_id, "detached task from sprint");
    Ok(())
}

/// Move a task onto `to`, from whichever sprint it is on (or from the backlog).
///
/// Relinking to the sprint the task is already on keeps the original
/// `added_at`. Any real move stamps `added_at = now`: the task counts as
/// added to the new sprint's scope from the moment it arrives.
pub fn relink<S: Store + ?Sized>(store: &mut S, task_id: TaskId, to: SprintId, now: DateTime<Utc>) -> Result<Relink> {
    same_team(store, to, task_id)?;
    let current = sprint_of(store, task_id)?;
    if let Some(row) = current.filter(|m| m.sprint_id == to) {
        return Ok(Relink { from: Some(to), row });
    }
    let row = store.relink_membership(task_id, to, now)?;
    let from = current.map(|m| m.sprint_id);
    tracing::info!(task_id, from = ?from, to, "moved task between sprints");
    Ok(Relink { from, row })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::fixtures::*;

    #[test]
    fn attach_is_idempotent_for_same_sprint() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let s = sprint(&mut db, team, "S1", d(2025, 1, 1));
        let t = task(&mut db, team, "A", Some(3));
        let first = attach(&mut db, s, t, at(2025, 1, 2)).unwrap();
        let again = attach(&mut db, s, t, at(2025, 1, 9)).unwrap();
        assert_eq!(first.added_at, again.added_at);
        assert_eq!(members(&db, s).unwrap().len(), 1);
    }

    #[test]
    fn attach_to_second_sprint_conflicts() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let s1 = sprint(&mut db, team, "S1", d(2025, 1, 1));
        let s2 = sprint(&mut db, team, "S2", d(2025, 1, 15));
        let t = task(&mut db, team, "A", None);
        attach(&mut db, s1, t, at(2025, 1, 2)).unwrap();
        let err = attach(&mut db, s2, t, at(2025, 1, 3)).unwrap_err();
        assert!(matches!(err, EngineError::Remote(StoreError::Conflict(_))));
    }

    #[test]
    fn attach_across_teams_is_rejected() {
        let mut db = Database::in_memory();
        let a = team(&mut db);
        let b = db.create_team("Other").unwrap().id;
        let s = sprint(&mut db, a, "S1", d(2025, 1, 1));
        let t = task(&mut db, b, "A", None);
        assert!(matches!(attach(&mut db, s, t, at(2025, 1, 2)), Err(EngineError::Validation(_))));
    }

    #[test]
    fn detach_returns_task_to_backlog() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let s = sprint(&mut db, team, "S1", d(2025, 1, 1));
        let t = task(&mut db, team, "A", None);
        attach(&mut db, s, t, at(2025, 1, 2)).unwrap();
        detach(&mut db, s, t).unwrap();
        assert_eq!(sprint_of(&db, t).unwrap(), None);
    }

    #[test]
    fn relink_moves_and_resets_added_at() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let s1 = sprint(&mut db, team, "S1", d(2025, 1, 1));
        let s2 = sprint(&mut db, team, "S2", d(2025, 1, 15));
        let t = task(&mut db, team, "A", None);
        attach(&mut db, s1, t, at(2024, 12, 20)).unwrap();
        let moved = relink(&mut db, t, s2, at(2025, 1, 16)).unwrap();
        assert_eq!(moved.from, Some(s1));
        assert_eq!(moved.row.added_at, at(2025, 1, 16));
        assert!(members(&db, s1).unwrap().is_empty());
    }

    #[test]
    fn relink_to_current_sprint_keeps_added_at() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let s1 = sprint(&mut db, team, "S1", d(2025, 1, 1));
        let t = task(&mut db, team, "A", None);
        attach(&mut db, s1, t, at(2024, 12, 20)).unwrap();
        let same = relink(&mut db, t, s1, at(2025, 1, 16)).unwrap();
        assert_eq!(same.row.added_at, at(2024, 12, 20));
    }

    #[test]
    fn relink_from_backlog_attaches() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let s1 = sprint(&mut db, team, "S1", d(2025, 1, 1));
        let t = task(&mut db, team, "A", None);
        let moved = relink(&mut db, t, s1, at(2025, 1, 2)).unwrap();
        assert_eq!(moved.from, None);
        assert_eq!(sprint_of(&db, t).unwrap().map(|m| m.sprint_id), Some(s1));
    }
}
