//! Board projection.
//!
//! Turns a [`Snapshot`] into four status columns. Scope is resolved first
//! (all tasks, backlog, or one sprint), then the secondary filters (text,
//! epic, label) narrow the result. The projection is recomputed from the
//! snapshot on every call and never cached between snapshots.

use std::collections::HashSet;

use serde::Serialize;

use crate::fields::*;
use crate::store::Snapshot;
use crate::task::*;

/// Secondary filters applied after scope resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilters {
    /// Case-insensitive substring of title or description.
    pub text: Option<String>,
    pub epic: Option<EpicId>,
    pub label: Option<LabelId>,
}

impl BoardFilters {
    fn matches(&self, task: &Task) -> bool {
        if let Some(needle) = self.text.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_desc = task.description.as_ref().is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_desc {
                return false;
            }
        }
        if let Some(epic) = self.epic {
            if task.epic != Some(epic) {
                return false;
            }
        }
        if let Some(label) = self.label {
            if !task.labels.contains(&label) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub status: Status,
    pub tasks: Vec<Task>,
}

impl Column {
    pub fn points(&self) -> u64 {
        self.tasks.iter().map(|t| u64::from(t.points())).sum()
    }
}

/// Four columns, one per status, in board order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub scope: ScopeFilter,
    pub columns: Vec<Column>,
}

impl Default for Board {
    fn default() -> Self {
        Board::empty(ScopeFilter::All)
    }
}

impl Board {
    pub fn empty(scope: ScopeFilter) -> Self {
        Board {
            scope,
            columns: Status::ALL.iter().map(|&status| Column { status, tasks: Vec::new() }).collect(),
        }
    }

    pub fn column(&self, status: Status) -> &[Task] {
        &self.columns[status.column()].tasks
    }

    /// Total number of cards on the board.
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column and position of a task, if it is on the board.
    pub fn locate(&self, id: TaskId) -> Option<(Status, usize)> {
        self.columns
            .iter()
            .find_map(|c| c.tasks.iter().position(|t| t.id == id).map(|pos| (c.status, pos)))
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.locate(id).map(|(s, pos)| &self.columns[s.column()].tasks[pos])
    }

    /// Remove a card, returning it with the position it held.
    pub fn take(&mut self, id: TaskId) -> Option<(usize, Task)> {
        let (status, pos) = self.locate(id)?;
        Some((pos, self.columns[status.column()].tasks.remove(pos)))
    }

    /// Put a card into the column for its status, at `pos` or on top.
    pub fn place(&mut self, task: Task, pos: Option<usize>) {
        let col = &mut self.columns[task.status.column()].tasks;
        let pos = pos.unwrap_or(0).min(col.len());
        col.insert(pos, task);
    }

    /// Replace a card in place, keeping its position.
    pub fn refresh(&mut self, task: Task) -> bool {
        match self.locate(task.id) {
            Some((status, pos)) if status == task.status => {
                self.columns[status.column()].tasks[pos] = task;
                true
            }
            _ => false,
        }
    }
}

/// Task ids that sit on some sprint of the snapshot's team.
fn scheduled_ids(snapshot: &Snapshot) -> HashSet<TaskId> {
    let sprints: HashSet<SprintId> = snapshot.sprints.iter().map(|s| s.id).collect();
    snapshot
        .memberships
        .iter()
        .filter(|m| sprints.contains(&m.sprint_id))
        .map(|m| m.task_id)
        .collect()
}

/// Build the board for `scope` and `filters` from a snapshot.
pub fn project(snapshot: &Snapshot, scope: ScopeFilter, filters: &BoardFilters) -> Board {
    let in_scope: Box<dyn Fn(&Task) -> bool> = match scope {
        ScopeFilter::All => Box::new(|_: &Task| true),
        ScopeFilter::Backlog => {
            let scheduled = scheduled_ids(snapshot);
            Box::new(move |t: &Task| !scheduled.contains(&t.id))
        }
        ScopeFilter::Sprint(sprint_id) => {
            let on_sprint: HashSet<TaskId> = if snapshot.sprint(sprint_id).is_some() {
                snapshot.memberships.iter().filter(|m| m.sprint_id == sprint_id).map(|m| m.task_id).collect()
            } else {
                HashSet::new()
            };
            Box::new(move |t: &Task| on_sprint.contains(&t.id))
        }
    };

    let mut board = Board::empty(scope);
    for task in &snapshot.tasks {
        if task.team_id != snapshot.team_id || !in_scope(task) || !filters.matches(task) {
            continue;
        }
        board.columns[task.status.column()].tasks.push(task.clone());
    }
    for column in &mut board.columns {
        column.tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }
    tracing::debug!(team_id = snapshot.team_id, %scope, cards = board.len(), "projected board");
    board
}
