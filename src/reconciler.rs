//! Sprint plan reconciler.
//!
//! Commits an accepted plan as a new sprint plus its membership rows. In
//! custom-text mode the drafts are produced by parsing the plan text again
//! here, never taken from an earlier preview, so the committed tasks are
//! exactly the ones the same text previews as.
//!
//! Items are processed one at a time. A failed item is logged, recorded in
//! the report and skipped; items that already succeeded are kept.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ledger;
use crate::parser::{self, ParseVariant};
use crate::store::Store;
use crate::task::*;
use crate::validate::{validate_new_sprint, validate_new_task};

/// What goes onto the new sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum PlanItems {
    /// Tasks that already exist.
    Existing { task_ids: Vec<TaskId> },
    /// Free text, one task per non-blank line.
    Text {
        text: String,
        #[serde(default)]
        variant: ParseVariant,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub sprint: NewSprint,
    pub items: PlanItems,
}

/// The plan item a failure refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PlanItemRef {
    Task { task_id: TaskId },
    Line { source_line: usize, title: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: PlanItemRef,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub created_sprint_id: SprintId,
    pub linked_task_count: usize,
    pub requested_count: usize,
    /// Tasks created in custom-text mode, whether or not they got linked.
    pub created_task_ids: Vec<TaskId>,
    pub failures: Vec<ItemFailure>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.linked_task_count == self.requested_count
    }

    /// Turn a shortfall into `PartialBatch` so it cannot pass as success.
    pub fn ensure_complete(&self) -> Result<&Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(EngineError::PartialBatch { succeeded: self.linked_task_count, requested: self.requested_count })
        }
    }
}

/// Drop repeated ids, keeping first occurrences in order.
fn dedup_ids(ids: &[TaskId]) -> Vec<TaskId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn record(failures: &mut Vec<ItemFailure>, item: PlanItemRef, error: EngineError) {
    tracing::warn!(item = ?item, error = %error, "plan item skipped");
    failures.push(ItemFailure { item, error: error.to_string() });
}

/// Create the sprint described by `plan` and put its items on it.
///
/// Fails without writing anything if the sprint fields are invalid. Once the
/// sprint exists, per-item failures only shorten the report.
pub fn commit<S: Store + ?Sized>(store: &mut S, plan: &Plan, now: DateTime<Utc>) -> Result<CommitReport> {
    validate_new_sprint(store, &plan.sprint)?;
    let sprint = store.create_sprint(plan.sprint.clone())?;
    tracing::info!(sprint_id = sprint.id, name = %sprint.name, "created sprint for plan");

    let mut report = CommitReport {
        created_sprint_id: sprint.id,
        linked_task_count: 0,
        requested_count: 0,
        created_task_ids: Vec::new(),
        failures: Vec::new(),
    };

    match &plan.items {
        PlanItems::Existing { task_ids } => {
            let ids = dedup_ids(task_ids);
            report.requested_count = ids.len();
            for task_id in ids {
                match ledger::attach(store, sprint.id, task_id, now) {
                    Ok(_) => report.linked_task_count += 1,
                    Err(e) => record(&mut report.failures, PlanItemRef::Task { task_id }, e),
                }
            }
        }
        PlanItems::Text { text, variant } => {
            let drafts = parser::parse(text, *variant);
            report.requested_count = drafts.len();
            for draft in drafts {
                let item = PlanItemRef::Line { source_line: draft.source_line, title: draft.title.clone() };
                let fields = draft.to_new_task(sprint.team_id);
                let created = validate_new_task(store, &fields)
                    .and_then(|()| store.create_task(fields, now).map_err(EngineError::from));
                let task = match created {
                    Ok(t) => t,
                    Err(e) => {
                        record(&mut report.failures, item, e);
                        continue;
                    }
                };
                report.created_task_ids.push(task.id);
                match ledger::attach(store, sprint.id, task.id, now) {
                    Ok(_) => report.linked_task_count += 1,
                    Err(e) => record(&mut report.failures, item, e),
                }
            }
        }
    }

    tracing::info!(
        sprint_id = sprint.id,
        linked = report.linked_task_count,
        requested = report.requested_count,
        "committed plan"
    );
    Ok(report)
}
