//! # sprintboard - Sprint workboard engine and CLI
//!
//! Keeps a team's task board, its sprints and the record of which task sits
//! on which sprint consistent with each other.
//!
//! ## Key Features
//!
//! - **Board projection**: four status columns for all tasks, the backlog or
//!   one sprint, narrowed by search text, epic and label
//! - **Optimistic status moves**: the board moves first and reverts exactly
//!   if the store refuses the write
//! - **Sprint membership ledger**: a task sits on at most one sprint; moves
//!   between sprints are a single write
//! - **Scope-creep alerts**: growth of an active sprint over what it held on
//!   its start date, graded medium past 15% and high past 25%
//! - **Task text parser**: one task per line with `[priority]`, `(points)`
//!   and `{type}` tags, identical for preview and commit
//! - **Plan reconciler**: turns an accepted plan into a sprint, its tasks and
//!   their membership, reporting every item that did not make it
//! - **Oracles**: planning and risk suggestions behind traits, with built-in
//!   capacity and heatmap heuristics
//!
//! ## Quick Start
//!
//! ```bash
//! sprint team create Core
//! sprint add "Implement login" --priority high --points 5
//! sprint sprint create "Sprint 1" --start today
//! sprint sprint attach 1 1
//! sprint board --scope sprint:1
//! echo "Fix crash [high] (3)" | sprint plan commit "Sprint 2"
//! ```
//!
//! Data is stored locally in `~/.sprintboard/board.json`; `--db` or
//! `SPRINTBOARD_DB` point elsewhere.

pub mod board;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod ledger;
pub mod logging;
pub mod oracle;
pub mod parser;
pub mod reconciler;
pub mod scope;
pub mod session;
pub mod store;
pub mod task;
pub mod transition;
pub mod validate;

#[cfg(test)]
mod fixtures;

pub use error::{EngineError, OracleError, Result, StoreError};
pub use session::BoardSession;
