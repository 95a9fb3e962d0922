//! Status transition controller.
//!
//! Moves a card between board columns. The displayed board changes first;
//! the store write follows, and if it fails the card goes back to the exact
//! column and position it came from before the error is returned.

use serde::Serialize;

use crate::board::Board;
use crate::error::Result;
use crate::fields::Status;
use crate::store::Store;
use crate::task::{Task, TaskId};

/// A confirmed status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub task_id: TaskId,
    pub from: Status,
    pub to: Status,
    /// The task as persisted.
    pub task: Task,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Move `task_id` to `target`.
///
/// Any status may move to any other. Moving a task to the status it already
/// has succeeds without a write. A task that is not on `board` is updated in
/// the store only.
pub fn move_task<S: Store + ?Sized>(
    store: &mut S,
    board: &mut Board,
    task_id: TaskId,
    target: Status,
) -> Result<Transition> {
    let shown = board.get(task_id).cloned();
    let prior = match shown {
        Some(t) => t,
        None => store.task(task_id)?,
    };
    if prior.status == target {
        return Ok(Transition { task_id, from: target, to: target, task: prior });
    }

    let held = board.take(task_id);
    if let Some((_, card)) = &held {
        let mut moved = card.clone();
        moved.status = target;
        board.place(moved, None);
    }

    match persist_status(store, task_id, target) {
        Ok(task) => {
            if held.is_some() && !board.refresh(task.clone()) {
                board.take(task_id);
                board.place(task.clone(), None);
            }
            tracing::info!(task_id, from = ?prior.status, to = ?target, "moved task");
            Ok(Transition { task_id, from: prior.status, to: target, task })
        }
        Err(e) => {
            if let Some((pos, card)) = held {
                board.take(task_id);
                board.place(card, Some(pos));
            }
            tracing::warn!(task_id, to = ?target, error = %e, "status write failed, reverted board");
            Err(e)
        }
    }
}

/// Write only the status field, on top of whatever the store holds now.
fn persist_status<S: Store + ?Sized>(store: &mut S, task_id: TaskId, target: Status) -> Result<Task> {
    let mut current = store.task(task_id)?;
    current.status = target;
    Ok(store.update_task(&current)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{project, BoardFilters};
    use crate::db::Database;
    use crate::error::EngineError;
    use crate::fields::ScopeFilter;
    use crate::fixtures::*;
    use crate::store::Snapshot;

    fn board_of<S: Store>(store: &S, team: u64) -> Board {
        project(&Snapshot::load(store, team).unwrap(), ScopeFilter::All, &BoardFilters::default())
    }

    fn columns_holding(board: &Board, id: TaskId) -> Vec<Status> {
        board
            .columns
            .iter()
            .filter(|c| c.tasks.iter().any(|t| t.id == id))
            .map(|c| c.status)
            .collect()
    }

    #[test]
    fn any_status_can_reach_any_other() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let t = task(&mut db, team, "A", None);
        let mut board = board_of(&db, team);
        for (from, to) in [
            (Status::Todo, Status::Done),
            (Status::Done, Status::Review),
            (Status::Review, Status::Todo),
            (Status::Todo, Status::InProgress),
        ] {
            let tr = move_task(&mut db, &mut board, t, to).unwrap();
            assert_eq!((tr.from, tr.to), (from, to));
            assert_eq!(db.task(t).unwrap().status, to);
        }
    }

    #[test]
    fn moved_task_shows_in_exactly_one_column() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let t = task(&mut db, team, "A", None);
        task(&mut db, team, "B", None);
        let mut board = board_of(&db, team);
        move_task(&mut db, &mut board, t, Status::Review).unwrap();
        assert_eq!(columns_holding(&board, t), vec![Status::Review]);
        assert_eq!(columns_holding(&board_of(&db, team), t), vec![Status::Review]);
    }

    #[test]
    fn same_status_is_a_no_op() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let t = task(&mut db, team, "A", None);
        let mut board = board_of(&db, team);
        let tr = move_task(&mut db, &mut board, t, Status::Todo).unwrap();
        assert!(!tr.changed());
    }

    #[test]
    fn failed_write_restores_column_and_position() {
        let mut store = FlakyStore::default();
        let team = team(&mut store);
        let a = task(&mut store, team, "A", None);
        let b = task(&mut store, team, "B", None);
        let c = task(&mut store, team, "C", None);
        let mut board = board_of(&store, team);
        let before = board.clone();
        store.fail_updates = true;

        let err = move_task(&mut store, &mut board, b, Status::Done).unwrap_err();
        assert!(matches!(err, EngineError::Remote(_)));
        assert_eq!(board, before);
        assert_eq!(board.column(Status::Todo).iter().map(|t| t.id).collect::<Vec<_>>(), vec![c, b, a]);
        assert_eq!(store.task(b).unwrap().status, Status::Todo);
    }

    #[test]
    fn task_off_the_board_moves_in_store_only() {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        let t = task(&mut db, team, "A", None);
        let mut board = Board::empty(ScopeFilter::Backlog);
        let tr = move_task(&mut db, &mut board, t, Status::Done).unwrap();
        assert!(tr.changed());
        assert!(board.is_empty());
        assert_eq!(db.task(t).unwrap().status, Status::Done);
    }

    #[test]
    fn unknown_task_is_not_found() {
        let mut db = Database::in_memory();
        let mut board = Board::default();
        assert!(move_task(&mut db, &mut board, 42, Status::Done).is_err());
    }
}
