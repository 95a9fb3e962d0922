//! Task text parser.
//!
//! Each non-blank line of the input becomes one draft task. Inline tags set
//! fields and are cut out of the title:
//!
//! - `[low]`, `[medium]`, `[high]`: priority (default medium)
//! - `(N)`: story points (default 3)
//! - `{bug}`, `{story}`, `{task}`: type, workflow variant only (default task)
//!
//! Tags may sit anywhere in the line and in any order; only the first
//! occurrence of each kind counts. Tag names are case-insensitive.
//! The parser is a pure function of its input: previews and commits of the
//! same text always see the same drafts.

use std::ops::Range;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fields::{Priority, TaskType};
use crate::task::DraftTask;

pub const DEFAULT_POINTS: u32 = 3;

static PRIORITY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[(low|medium|high)\]").expect("valid priority pattern"));
static POINTS_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d+)\)").expect("valid points pattern"));
static TYPE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{(bug|story|task)\}").expect("valid type pattern"));

/// Which tag set the parser recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParseVariant {
    /// Priority and points tags; every draft is a plain task.
    #[default]
    Planner,
    /// Adds the `{bug|story|task}` type tag.
    Workflow,
}

fn priority_tag(line: &str) -> Option<(Priority, Range<usize>)> {
    let caps = PRIORITY_TAG.captures(line)?;
    let priority = match caps[1].to_ascii_lowercase().as_str() {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium,
    };
    Some((priority, caps.get(0)?.range()))
}

fn points_tag(line: &str) -> Option<(u32, Range<usize>)> {
    POINTS_TAG.captures_iter(line).find_map(|caps| {
        let points = caps[1].parse::<u32>().ok()?;
        Some((points, caps.get(0)?.range()))
    })
}

fn type_tag(line: &str) -> Option<(TaskType, Range<usize>)> {
    let caps = TYPE_TAG.captures(line)?;
    let task_type = match caps[1].to_ascii_lowercase().as_str() {
        "bug" => TaskType::Bug,
        "story" => TaskType::Story,
        _ => TaskType::Task,
    };
    Some((task_type, caps.get(0)?.range()))
}

/// Parse one non-blank line.
pub fn parse_line(line: &str, source_line: usize, variant: ParseVariant) -> DraftTask {
    let mut cut: Vec<Range<usize>> = Vec::new();

    let priority = priority_tag(line).map_or(Priority::Medium, |(p, r)| {
        cut.push(r);
        p
    });
    let story_points = points_tag(line).map_or(DEFAULT_POINTS, |(n, r)| {
        cut.push(r);
        n
    });
    let task_type = match variant {
        ParseVariant::Planner => TaskType::Task,
        ParseVariant::Workflow => type_tag(line).map_or(TaskType::Task, |(t, r)| {
            cut.push(r);
            t
        }),
    };

    // Tag delimiters differ per kind, so the ranges never overlap.
    cut.sort_by_key(|r| r.start);
    let mut title = String::with_capacity(line.len());
    let mut pos = 0;
    for r in cut {
        title.push_str(&line[pos..r.start]);
        pos = r.end;
    }
    title.push_str(&line[pos..]);

    DraftTask { title: title.trim().to_string(), task_type, priority, story_points, source_line }
}

/// Parse free text into drafts, one per non-blank line, in line order.
pub fn parse(text: &str, variant: ParseVariant) -> Vec<DraftTask> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(line, i, variant))
        .collect()
}
