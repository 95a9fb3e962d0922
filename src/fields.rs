//! Enumerations and field types for tasks and sprints.
//!
//! This module defines the closed sets a task or sprint field can take: task
//! types, board statuses, priorities and sprint lifecycle states. Every value
//! is matched exhaustively wherever it drives behaviour.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Story,
    Bug,
    #[default]
    Task,
}

/// Board column a task sits in.
///
/// Any status may move to any other status; the board is a free-form kanban,
/// not an approval workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl Status {
    /// All statuses in board column order.
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::Review, Status::Done];

    /// Column index of this status on the board.
    pub fn column(self) -> usize {
        match self {
            Status::Todo => 0,
            Status::InProgress => 1,
            Status::Review => 2,
            Status::Done => 3,
        }
    }
}

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort rank, highest priority first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

/// Sprint lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    #[default]
    Planning,
    Active,
    Completed,
}

impl SprintStatus {
    /// The next lifecycle state, or `None` once completed.
    pub fn next(self) -> Option<SprintStatus> {
        match self {
            SprintStatus::Planning => Some(SprintStatus::Active),
            SprintStatus::Active => Some(SprintStatus::Completed),
            SprintStatus::Completed => None,
        }
    }
}

/// Format a task type for display.
pub fn format_type(t: TaskType) -> &'static str {
    match t {
        TaskType::Story => "Story",
        TaskType::Bug => "Bug",
        TaskType::Task => "Task",
    }
}

/// Format a task status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Todo => "To Do",
        Status::InProgress => "In Progress",
        Status::Review => "Review",
        Status::Done => "Done",
    }
}

/// Format a priority for display.
pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
    }
}

/// Format a sprint status for display.
pub fn format_sprint_status(s: SprintStatus) -> &'static str {
    match s {
        SprintStatus::Planning => "Planning",
        SprintStatus::Active => "Active",
        SprintStatus::Completed => "Completed",
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format_status(*self))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format_priority(*self))
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format_type(*self))
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format_sprint_status(*self))
    }
}

/// Which tasks a board shows before secondary filters apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "sprint_id")]
pub enum ScopeFilter {
    /// Every task of the team.
    #[default]
    All,
    /// Tasks with no sprint membership.
    Backlog,
    /// Tasks on one sprint's board.
    Sprint(u64),
}

impl FromStr for ScopeFilter {
    type Err = String;

    /// Accepts `all`, `backlog`, `sprint:<id>` or a bare sprint id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "all" => return Ok(ScopeFilter::All),
            "backlog" => return Ok(ScopeFilter::Backlog),
            _ => {}
        }
        let id = s.strip_prefix("sprint:").unwrap_or(&s);
        id.trim()
            .parse::<u64>()
            .map(ScopeFilter::Sprint)
            .map_err(|_| format!("invalid scope '{s}': expected all, backlog, sprint:<id> or <id>"))
    }
}

impl fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeFilter::All => f.write_str("all"),
            ScopeFilter::Backlog => f.write_str("backlog"),
            ScopeFilter::Sprint(id) => write!(f, "sprint:{id}"),
        }
    }
}
