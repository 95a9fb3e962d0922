//! Input checks that run before anything is written.

use crate::error::{EngineError, Result, StoreError};
use crate::store::Store;
use crate::task::*;

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(EngineError::validation("task title must not be empty"));
    }
    Ok(())
}

/// Load a team, treating only a missing team as bad input. Other store
/// failures pass through as remote errors.
pub fn existing_team<S: Store + ?Sized>(store: &S, team_id: TeamId) -> Result<Team> {
    match store.team(team_id) {
        Ok(team) => Ok(team),
        Err(StoreError::NotFound { .. }) => Err(EngineError::validation(format!("team {team_id} does not exist"))),
        Err(e) => Err(e.into()),
    }
}

/// Check that every reference on a task resolves inside its own team.
fn validate_refs<S: Store + ?Sized>(
    store: &S,
    team_id: TeamId,
    assignee: Option<MemberId>,
    epic: Option<EpicId>,
    labels: impl IntoIterator<Item = LabelId>,
) -> Result<()> {
    let team = existing_team(store, team_id)?;
    if let Some(a) = assignee {
        if !team.has_member(a) {
            return Err(EngineError::validation(format!("member {a} is not on team '{}'", team.name)));
        }
    }
    if let Some(e) = epic {
        if !store.epics(team_id)?.iter().any(|x| x.id == e) {
            return Err(EngineError::validation(format!("epic {e} does not belong to team '{}'", team.name)));
        }
    }
    let known = store.labels(team_id)?;
    for l in labels {
        if !known.iter().any(|x| x.id == l) {
            return Err(EngineError::validation(format!("label {l} does not belong to team '{}'", team.name)));
        }
    }
    Ok(())
}

pub fn validate_new_task<S: Store + ?Sized>(store: &S, fields: &NewTask) -> Result<()> {
    validate_title(&fields.title)?;
    validate_refs(store, fields.team_id, fields.assignee, fields.epic, fields.labels.iter().copied())
}

/// Check an edited task before it replaces the stored one.
pub fn validate_task<S: Store + ?Sized>(store: &S, task: &Task) -> Result<()> {
    validate_title(&task.title)?;
    validate_refs(store, task.team_id, task.assignee, task.epic, task.labels.iter().copied())
}

pub fn validate_new_sprint<S: Store + ?Sized>(store: &S, fields: &NewSprint) -> Result<()> {
    if fields.name.trim().is_empty() {
        return Err(EngineError::validation("sprint name must not be empty"));
    }
    if fields.end_date < fields.start_date {
        return Err(EngineError::validation(format!(
            "sprint ends ({}) before it starts ({})",
            fields.end_date, fields.start_date
        )));
    }
    existing_team(store, fields.team_id)?;
    Ok(())
}
