//! Command implementations for the CLI interface.
//!
//! Each handler resolves its arguments against the store, calls into a
//! [`BoardSession`] and prints plain tables, or JSON with `--json`. Handlers
//! return errors instead of exiting so `main` reports them in one place.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDate};
use clap::Subcommand;
use clap_complete::{generate, Shell};
use serde::Serialize;

use crate::board::{Board, BoardFilters};
use crate::config::Config;
use crate::db::*;
use crate::error::{EngineError, OracleError, Result, StoreError};
use crate::fields::*;
use crate::ledger;
use crate::oracle::*;
use crate::parser::ParseVariant;
use crate::reconciler::{CommitReport, Plan, PlanItemRef, PlanItems};
use crate::session::BoardSession;
use crate::store::Store;
use crate::task::*;

type Session = BoardSession<Database>;

#[derive(Subcommand)]
pub enum Commands {
    /// Manage teams and their members.
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Manage epics of the current team.
    Epic {
        #[command(subcommand)]
        action: EpicAction,
    },

    /// Manage labels of the current team.
    Label {
        #[command(subcommand)]
        action: LabelAction,
    },

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        #[arg(long = "type", value_enum, default_value_t = TaskType::Task)]
        task_type: TaskType,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Story points.
        #[arg(long)]
        points: Option<u32>,
        /// Member id or name.
        #[arg(long)]
        assignee: Option<String>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "in Nd" or "in Nw".
        #[arg(long)]
        due: Option<String>,
        /// Epic id.
        #[arg(long)]
        epic: Option<EpicId>,
        /// Label names. May be repeated and comma-separated.
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Put the new task straight onto this sprint.
        #[arg(long)]
        sprint: Option<SprintId>,
    },

    /// Update fields on a task.
    Update {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long = "type", value_enum)]
        task_type: Option<TaskType>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        points: Option<u32>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        epic: Option<EpicId>,
        /// Add labels. May be repeated and comma-separated.
        #[arg(long = "add-label")]
        add_labels: Vec<String>,
        /// Remove labels. May be repeated and comma-separated.
        #[arg(long = "rm-label")]
        rm_labels: Vec<String>,
        #[arg(long)]
        clear_assignee: bool,
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        clear_epic: bool,
        #[arg(long)]
        clear_points: bool,
    },

    /// Delete a task and its sprint membership.
    Delete { id: TaskId },

    /// View a single task.
    View { id: TaskId },

    /// Move a task to another board column.
    Move {
        id: TaskId,
        #[arg(value_enum)]
        status: Status,
    },

    /// Show the board.
    Board {
        /// all | backlog | sprint:<id> | <id>
        #[arg(long, default_value = "all")]
        scope: ScopeFilter,
        /// Text to look for in titles and descriptions.
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        epic: Option<EpicId>,
        /// Label name.
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Manage sprints and their membership.
    Sprint {
        #[command(subcommand)]
        action: SprintAction,
    },

    /// Preview the tasks a block of text would create.
    Parse {
        /// Text to parse. Read from --file or stdin when omitted.
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ParseVariant::Planner)]
        variant: ParseVariant,
        #[arg(long)]
        json: bool,
    },

    /// Plan and commit sprints.
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Scope-creep alerts for active sprints.
    Alerts {
        #[arg(long)]
        json: bool,
    },

    /// Workload and delivery risk across the team's open tasks.
    Risk {
        /// Date to judge lateness against (default: today).
        #[arg(long)]
        today: Option<String>,
        /// Open story points one member may carry.
        #[arg(long, default_value_t = 13)]
        max_points: u32,
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum TeamAction {
    /// Create a team.
    Create { name: String },
    /// Add a member to the current team.
    AddMember { name: String },
    /// List teams and their members.
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum EpicAction {
    Create { title: String },
    List,
}

#[derive(Subcommand)]
pub enum LabelAction {
    Create { name: String },
    List,
}

#[derive(Subcommand)]
pub enum SprintAction {
    /// Create a sprint.
    Create {
        name: String,
        #[arg(long)]
        goal: Option<String>,
        /// Start date (default: today).
        #[arg(long)]
        start: Option<String>,
        /// End date (default: two weeks after the start).
        #[arg(long)]
        end: Option<String>,
        #[arg(long, value_enum, default_value_t = SprintStatus::Planning)]
        status: SprintStatus,
    },
    /// List sprints with their size.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Move a sprint to its next status.
    Advance { id: SprintId },
    /// Set a sprint's status directly.
    SetStatus {
        id: SprintId,
        #[arg(value_enum)]
        status: SprintStatus,
    },
    /// Put a task onto a sprint.
    Attach { task: TaskId, sprint: SprintId },
    /// Take a task off a sprint.
    Detach { task: TaskId, sprint: SprintId },
    /// Move a task to a sprint from wherever it is now.
    Relink { task: TaskId, sprint: SprintId },
    /// Delete a sprint. Its tasks return to the backlog.
    Delete { id: SprintId },
}

#[derive(Subcommand)]
pub enum PlanAction {
    /// Create a sprint from listed tasks or from text, one task per line.
    Commit {
        /// Sprint name.
        name: String,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Existing task ids. May be repeated.
        #[arg(long = "task")]
        tasks: Vec<TaskId>,
        /// Plan text. Read from --file or stdin when no tasks are listed.
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ParseVariant::Planner)]
        variant: ParseVariant,
        #[arg(long)]
        json: bool,
    },
    /// Ask the built-in planner for a sprint proposal.
    Suggest {
        /// Hours the team can spend in the sprint.
        #[arg(long)]
        capacity_hours: f64,
        #[arg(long, default_value_t = 14)]
        days: u32,
        #[arg(long, default_value_t = 4.0)]
        hours_per_point: f64,
        /// Plan from text instead of the open backlog.
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Write the proposal as JSON for `plan apply`.
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Commit a planning proposal saved as JSON.
    Apply {
        response: PathBuf,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    parse_date_input(s, today()).ok_or_else(|| EngineError::validation(format!("invalid date '{s}'")))
}

fn two_weeks_from(start: NaiveDate) -> Result<NaiveDate> {
    start
        .checked_add_signed(Duration::days(13))
        .ok_or_else(|| EngineError::validation(format!("a sprint starting {start} has no representable end date")))
}

/// Start and end of a new sprint; two weeks long unless `end` says otherwise.
fn sprint_dates(start: Option<&str>, end: Option<&str>) -> Result<(NaiveDate, NaiveDate)> {
    let start = start.map(parse_date).transpose()?.unwrap_or_else(today);
    let end = match end {
        Some(e) => parse_date(e)?,
        None => two_weeks_from(start)?,
    };
    Ok((start, end))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).map_err(StoreError::from)?;
    println!("{out}");
    Ok(())
}

/// Text from an argument, a file, or stdin, in that order.
fn read_text(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(t) = text {
        return Ok(t);
    }
    let mut buf = String::new();
    match file {
        Some(path) => {
            buf = fs::read_to_string(path)
                .map_err(|e| EngineError::validation(format!("cannot read {}: {e}", path.display())))?;
        }
        None => {
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| EngineError::validation(format!("cannot read stdin: {e}")))?;
        }
    }
    Ok(buf)
}

fn open_db(config: &Config) -> Result<Database> {
    config.ensure_data_dir()?;
    Ok(Database::open(config.db_path())?)
}

/// Pick the team by id or name, or the only team there is.
fn resolve_team(db: &Database, wanted: Option<&str>) -> Result<TeamId> {
    let teams = db.teams()?;
    match wanted {
        Some(w) => teams
            .iter()
            .find(|t| t.id.to_string() == w || t.name.eq_ignore_ascii_case(w))
            .map(|t| t.id)
            .ok_or_else(|| EngineError::validation(format!("no team matches '{w}'"))),
        None => match teams.as_slice() {
            [only] => Ok(only.id),
            [] => Err(EngineError::validation("no teams yet; create one with `sprint team create <name>`")),
            _ => Err(EngineError::validation("several teams exist; pass --team or set SPRINTBOARD_TEAM")),
        },
    }
}

fn open_session(config: &Config) -> Result<Session> {
    let db = open_db(config)?;
    let team = resolve_team(&db, config.team.as_deref())?;
    BoardSession::open(db, team)
}

fn resolve_member(team: &Team, wanted: &str) -> Result<MemberId> {
    team.members
        .iter()
        .find(|m| m.id.to_string() == wanted || m.name.eq_ignore_ascii_case(wanted.trim()))
        .map(|m| m.id)
        .ok_or_else(|| EngineError::validation(format!("no member of '{}' matches '{wanted}'", team.name)))
}

fn resolve_labels(session: &Session, names: &[String]) -> Result<Vec<LabelId>> {
    let known = session.store().labels(session.team().id)?;
    names
        .iter()
        .flat_map(|s| s.split(','))
        .map(normalise_label)
        .filter(|s| !s.is_empty())
        .map(|name| {
            known
                .iter()
                .find(|l| l.name == name)
                .map(|l| l.id)
                .ok_or_else(|| EngineError::validation(format!("unknown label '{name}'")))
        })
        .collect()
}

/// Run one command against the configured database.
pub fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
        Commands::Team { action } => cmd_team(config, action),
        Commands::Epic { action } => cmd_epic(config, action),
        Commands::Label { action } => cmd_label(config, action),
        Commands::Add { title, desc, task_type, priority, points, assignee, due, epic, labels, sprint } => {
            let mut session = open_session(config)?;
            let assignee = assignee.as_deref().map(|a| resolve_member(session.team(), a)).transpose()?;
            let fields = NewTask {
                team_id: session.team().id,
                title,
                description: desc,
                task_type,
                status: Status::Todo,
                priority,
                story_points: points,
                assignee,
                due_date: due.as_deref().map(parse_date).transpose()?,
                epic,
                labels: resolve_labels(&session, &labels)?.into_iter().collect(),
            };
            cmd_add(&mut session, fields, sprint)
        }
        Commands::Update {
            id, title, desc, task_type, priority, points, assignee, due, epic,
            add_labels, rm_labels, clear_assignee, clear_due, clear_epic, clear_points,
        } => {
            let mut session = open_session(config)?;
            let patch = TaskPatch {
                title,
                description: desc,
                task_type,
                priority,
                story_points: points,
                assignee: assignee.as_deref().map(|a| resolve_member(session.team(), a)).transpose()?,
                due_date: due.as_deref().map(parse_date).transpose()?,
                epic,
                add_labels: resolve_labels(&session, &add_labels)?,
                remove_labels: resolve_labels(&session, &rm_labels)?,
                clear_assignee,
                clear_due,
                clear_epic,
                clear_points,
            };
            let task = session.update_task(id, &patch)?;
            println!("Updated task {}", task.id);
            Ok(())
        }
        Commands::Delete { id } => {
            let task = open_session(config)?.delete_task(id)?;
            println!("Deleted task {} ({})", task.id, task.title);
            Ok(())
        }
        Commands::View { id } => cmd_view(&open_session(config)?, id),
        Commands::Move { id, status } => {
            let mut session = open_session(config)?;
            let tr = session.move_task(id, status)?;
            if tr.changed() {
                println!("Moved task {}: {} -> {}", id, tr.from, tr.to);
            } else {
                println!("Task {} is already {}", id, tr.to);
            }
            Ok(())
        }
        Commands::Board { scope, search, epic, label, json } => {
            let mut session = open_session(config)?;
            let label = label.map(|l| resolve_labels(&session, &[l])).transpose()?.and_then(|v| v.first().copied());
            let filters = BoardFilters { text: search, epic, label };
            let board = session.get_board(scope, filters)?;
            if json {
                print_json(board)
            } else {
                print_board(board);
                Ok(())
            }
        }
        Commands::Sprint { action } => cmd_sprint(&mut open_session(config)?, action),
        Commands::Parse { text, file, variant, json } => {
            let text = read_text(text, file.as_deref())?;
            let drafts = crate::parser::parse(&text, variant);
            if json {
                return print_json(&drafts);
            }
            print_drafts(&drafts);
            Ok(())
        }
        Commands::Plan { action } => cmd_plan(&mut open_session(config)?, action),
        Commands::Alerts { json } => {
            let alerts = open_session(config)?.get_scope_alerts()?;
            if json {
                return print_json(&alerts);
            }
            if alerts.is_empty() {
                println!("No scope alerts.");
            }
            for a in &alerts {
                println!(
                    "[{}] Sprint {} '{}': {} -> {} points (+{:.1}%)",
                    format!("{:?}", a.risk).to_uppercase(),
                    a.sprint_id,
                    a.sprint_name,
                    a.original_points,
                    a.current_points,
                    a.increase_pct
                );
                for t in &a.added_task_titles {
                    println!("    added: {t}");
                }
            }
            Ok(())
        }
        Commands::Risk { today: on, max_points, json } => {
            let session = open_session(config)?;
            let on = on.as_deref().map(parse_date).transpose()?.unwrap_or_else(today);
            let oracle = HeuristicRiskOracle { max_points_per_member: max_points };
            let report = session.risk_heatmap(&oracle, on)?;
            if json {
                return print_json(&report);
            }
            print_risk(&report, on);
            Ok(())
        }
    }
}

fn cmd_team(config: &Config, action: TeamAction) -> Result<()> {
    let mut db = open_db(config)?;
    match action {
        TeamAction::Create { name } => {
            let team = db.create_team(&name)?;
            println!("Created team {} ({})", team.id, team.name);
        }
        TeamAction::AddMember { name } => {
            let team_id = resolve_team(&db, config.team.as_deref())?;
            let member = db.add_member(team_id, &name)?;
            println!("Added member {} ({}) to team {}", member.id, member.name, team_id);
        }
        TeamAction::List { json } => {
            let teams = db.teams()?;
            if json {
                return print_json(&teams);
            }
            println!("{:<4} {:<20} {}", "ID", "Team", "Members");
            for t in teams {
                let members: Vec<String> = t.members.iter().map(|m| format!("{}:{}", m.id, m.name)).collect();
                let members = if members.is_empty() { "-".to_string() } else { members.join(", ") };
                println!("{:<4} {:<20} {}", t.id, truncate(&t.name, 20), members);
            }
        }
    }
    Ok(())
}

fn cmd_epic(config: &Config, action: EpicAction) -> Result<()> {
    let mut db = open_db(config)?;
    let team_id = resolve_team(&db, config.team.as_deref())?;
    match action {
        EpicAction::Create { title } => {
            let epic = db.create_epic(team_id, &title)?;
            println!("Created epic {} ({})", epic.id, epic.title);
        }
        EpicAction::List => {
            println!("{:<4} {}", "ID", "Epic");
            for e in db.epics(team_id)? {
                println!("{:<4} {}", e.id, e.title);
            }
        }
    }
    Ok(())
}

fn cmd_label(config: &Config, action: LabelAction) -> Result<()> {
    let mut db = open_db(config)?;
    let team_id = resolve_team(&db, config.team.as_deref())?;
    match action {
        LabelAction::Create { name } => {
            let label = db.create_label(team_id, &name)?;
            println!("Created label {} ({})", label.id, label.name);
        }
        LabelAction::List => {
            println!("{:<4} {}", "ID", "Label");
            for l in db.labels(team_id)? {
                println!("{:<4} {}", l.id, l.name);
            }
        }
    }
    Ok(())
}

fn cmd_add(session: &mut Session, fields: NewTask, sprint: Option<SprintId>) -> Result<()> {
    let task = session.create_task(fields)?;
    println!("Added task {}", task.id);
    if let Some(sprint_id) = sprint {
        session.attach_to_sprint(task.id, sprint_id)?;
        println!("Attached task {} to sprint {}", task.id, sprint_id);
    }
    Ok(())
}

fn cmd_view(session: &Session, id: TaskId) -> Result<()> {
    let store = session.store();
    let task = session.task(id)?;
    let team = session.team();
    let today = today();
    let assignee = task
        .assignee
        .map(|a| team.member(a).map_or_else(|| a.to_string(), |m| m.name.clone()))
        .unwrap_or_else(|| "-".into());
    let epic = match task.epic {
        Some(e) => store.epics(task.team_id)?.into_iter().find(|x| x.id == e).map_or_else(|| e.to_string(), |x| x.title),
        None => "-".into(),
    };
    let labels: Vec<String> = store
        .labels(task.team_id)?
        .into_iter()
        .filter(|l| task.labels.contains(&l.id))
        .map(|l| l.name)
        .collect();
    let sprint = match ledger::sprint_of(store, id)? {
        Some(m) => {
            let s = store.sprint(m.sprint_id)?;
            format!("{} ({}, added {})", s.name, s.id, m.added_at.to_rfc3339())
        }
        None => "backlog".into(),
    };

    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Type:         {}", task.task_type);
    println!("Status:       {}", task.status);
    println!("Priority:     {}", task.priority);
    println!("Points:       {}", task.story_points.map_or_else(|| "-".into(), |p| p.to_string()));
    println!("Assignee:     {assignee}");
    println!("Due:          {}", match task.due_date { Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)), None => "-".into() });
    println!("Epic:         {epic}");
    println!("Labels:       {}", if labels.is_empty() { "-".into() } else { labels.join(",") });
    println!("Sprint:       {sprint}");
    println!("Created UTC:  {}", task.created_at.to_rfc3339());
    println!("Description:\n{}\n", task.description.unwrap_or_else(|| "-".into()));
    Ok(())
}

fn print_board(board: &Board) {
    let today = today();
    println!("Board: {}", board.scope);
    for column in &board.columns {
        println!();
        println!("== {} ({} tasks, {} pts) ==", column.status, column.tasks.len(), column.points());
        for t in &column.tasks {
            println!(
                "{:<5} {:<40} {:<6} {:<7} {:>3} {}",
                format!("#{}", t.id),
                truncate(&t.title, 40),
                t.task_type,
                t.priority,
                t.story_points.map_or_else(|| "-".into(), |p| p.to_string()),
                format_due_relative(t.due_date, today)
            );
        }
    }
}

fn print_drafts(drafts: &[DraftTask]) {
    println!("{:<5} {:<6} {:<8} {:>6}  {}", "Line", "Type", "Priority", "Points", "Title");
    for d in drafts {
        println!(
            "{:<5} {:<6} {:<8} {:>6}  {}",
            d.source_line + 1,
            d.task_type,
            d.priority,
            d.story_points,
            if d.title.is_empty() { "(empty)" } else { d.title.as_str() }
        );
    }
}

fn print_report(report: &CommitReport) {
    println!(
        "Created sprint {}: linked {} of {} tasks",
        report.created_sprint_id, report.linked_task_count, report.requested_count
    );
    for f in &report.failures {
        match &f.item {
            PlanItemRef::Task { task_id } => println!("  task #{task_id}: {}", f.error),
            PlanItemRef::Line { source_line, title } => println!("  line {} '{title}': {}", source_line + 1, f.error),
        }
    }
}

fn print_risk(report: &RiskReport, on: NaiveDate) {
    println!("Risk as of {on}");
    println!("Overloaded members: {}", report.overloaded_members.len());
    for m in &report.overloaded_members {
        println!("  {} ({}): {} pts", m.name, m.member_id, m.story_points);
    }
    println!("Delayed tasks: {}", report.delayed_tasks.len());
    for t in &report.delayed_tasks {
        println!("  #{} {} ({})", t.task_id, t.title, format_due_relative(t.due_date, on));
    }
    println!("Blocked tasks: {}", report.blocked_tasks.len());
    for t in &report.blocked_tasks {
        println!("  #{} {}", t.task_id, t.title);
    }
    for r in &report.recommendations {
        println!("- {r}");
    }
}

fn cmd_sprint(session: &mut Session, action: SprintAction) -> Result<()> {
    match action {
        SprintAction::Create { name, goal, start, end, status } => {
            let (start_date, end_date) = sprint_dates(start.as_deref(), end.as_deref())?;
            let team_id = session.team().id;
            let sprint = session.create_sprint(NewSprint {
                team_id,
                name,
                goal,
                status,
                start_date,
                end_date,
            })?;
            println!("Created sprint {} ({}, {} to {})", sprint.id, sprint.name, sprint.start_date, sprint.end_date);
        }
        SprintAction::List { json } => {
            let snapshot = session.snapshot()?;
            if json {
                return print_json(&snapshot.sprints);
            }
            let index = snapshot.index();
            let mut counts: HashMap<SprintId, (usize, u64)> = HashMap::new();
            for m in &snapshot.memberships {
                let entry = counts.entry(m.sprint_id).or_default();
                entry.0 += 1;
                entry.1 += index.get(&m.task_id).map_or(0, |t| u64::from(t.points()));
            }
            println!("{:<4} {:<20} {:<10} {:<10} {:<10} {:>5} {:>6}", "ID", "Sprint", "Status", "Start", "End", "Tasks", "Points");
            for s in &snapshot.sprints {
                let (n, pts) = counts.get(&s.id).copied().unwrap_or_default();
                println!(
                    "{:<4} {:<20} {:<10} {:<10} {:<10} {:>5} {:>6}",
                    s.id,
                    truncate(&s.name, 20),
                    s.status,
                    s.start_date,
                    s.end_date,
                    n,
                    pts
                );
            }
        }
        SprintAction::Advance { id } => {
            let sprint = session.advance_sprint(id)?;
            println!("Sprint {} is now {}", sprint.id, sprint.status);
        }
        SprintAction::SetStatus { id, status } => {
            let sprint = session.set_sprint_status(id, status)?;
            println!("Sprint {} is now {}", sprint.id, sprint.status);
        }
        SprintAction::Attach { task, sprint } => {
            session.attach_to_sprint(task, sprint)?;
            println!("Attached task {task} to sprint {sprint}");
        }
        SprintAction::Detach { task, sprint } => {
            session.detach_from_sprint(task, sprint)?;
            println!("Detached task {task} from sprint {sprint}");
        }
        SprintAction::Relink { task, sprint } => {
            let relink = session.move_to_sprint(task, sprint)?;
            match relink.from {
                Some(from) if from == sprint => println!("Task {task} is already on sprint {sprint}"),
                Some(from) => println!("Moved task {task} from sprint {from} to sprint {sprint}"),
                None => println!("Moved task {task} from the backlog to sprint {sprint}"),
            }
        }
        SprintAction::Delete { id } => {
            let sprint = session.delete_sprint(id)?;
            println!("Deleted sprint {} ({})", sprint.id, sprint.name);
        }
    }
    Ok(())
}

/// Print the report, then fail if any item was left behind.
fn finish_commit(report: &CommitReport, json: bool) -> Result<()> {
    if json {
        print_json(report)?;
    } else {
        print_report(report);
    }
    report.ensure_complete()?;
    Ok(())
}

fn cmd_plan(session: &mut Session, action: PlanAction) -> Result<()> {
    match action {
        PlanAction::Commit { name, goal, start, end, tasks, text, file, variant, json } => {
            let (start_date, end_date) = sprint_dates(start.as_deref(), end.as_deref())?;
            let items = if tasks.is_empty() {
                PlanItems::Text { text: read_text(text, file.as_deref())?, variant }
            } else {
                PlanItems::Existing { task_ids: tasks }
            };
            let plan = Plan {
                sprint: NewSprint {
                    team_id: session.team().id,
                    name,
                    goal,
                    status: SprintStatus::Planning,
                    start_date,
                    end_date,
                },
                items,
            };
            let report = session.commit_plan(&plan)?;
            finish_commit(&report, json)
        }
        PlanAction::Suggest { capacity_hours, days, hours_per_point, text, file, output, json } => {
            let request = if text.is_some() || file.is_some() {
                PlanningRequest {
                    input: PlanningInput::RawText(read_text(text, file.as_deref())?),
                    team_capacity_hours: capacity_hours,
                    sprint_duration_days: days,
                }
            } else {
                session.backlog_request(capacity_hours, days)?
            };
            let planner = CapacityPlanner { hours_per_point };
            let response = session.suggest_plan(&planner, &request)?;
            if let Some(path) = output {
                let data = serde_json::to_string_pretty(&response).map_err(StoreError::from)?;
                fs::write(&path, data).map_err(|source| StoreError::Io { path: path.clone(), source })?;
                println!("Wrote proposal to {}", path.display());
            }
            if json {
                return print_json(&response);
            }
            println!("Proposal: {} ({} pts)", response.sprint_name, response.total_story_points);
            if let Some(r) = &response.reasoning {
                println!("{r}");
            }
            for id in &response.recommended_task_ids {
                let title = session.store().task(*id).map(|t| t.title).unwrap_or_default();
                println!("  #{id} {title}");
            }
            for r in &response.risk_factors {
                println!("  risk: {r}");
            }
            Ok(())
        }
        PlanAction::Apply { response, start, end, json } => {
            let data = fs::read_to_string(&response)
                .map_err(|source| StoreError::Io { path: response.clone(), source })?;
            let suggestion: PlanningResponse =
                serde_json::from_str(&data).map_err(|e| OracleError::Malformed(e.to_string()))?;
            if suggestion.recommended_task_ids.is_empty() {
                return Err(OracleError::Malformed(format!("{} recommends no tasks", response.display())).into());
            }
            let request = session.backlog_request(0.0, 0)?;
            validate_suggestion(&request, &suggestion)?;
            let (start_date, end_date) = sprint_dates(start.as_deref(), end.as_deref())?;
            let plan = Plan::from_suggestion(&suggestion, session.team().id, start_date, end_date);
            let report = session.commit_plan(&plan)?;
            finish_commit(&report, json)
        }
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    fn config(dir: &tempfile::TempDir, team: Option<&str>) -> Config {
        Config::resolve(Some(dir.path().join("board.json")), team.map(String::from), LogFormat::Text)
    }

    fn seed(dir: &tempfile::TempDir) {
        run(Commands::Team { action: TeamAction::Create { name: "Core".into() } }, &config(dir, None)).unwrap();
    }

    #[test]
    fn team_is_picked_by_name_id_or_uniqueness() {
        let mut db = Database::in_memory();
        assert!(resolve_team(&db, None).is_err());
        let core = db.create_team("Core").unwrap().id;
        assert_eq!(resolve_team(&db, None).unwrap(), core);
        let web = db.create_team("Web").unwrap().id;
        assert!(resolve_team(&db, None).is_err());
        assert_eq!(resolve_team(&db, Some("web")).unwrap(), web);
        assert_eq!(resolve_team(&db, Some(&core.to_string())).unwrap(), core);
        assert!(resolve_team(&db, Some("ops")).is_err());
    }

    #[test]
    fn sprint_defaults_to_two_weeks() {
        let (start, end) = sprint_dates(Some("2025-03-03"), None).unwrap();
        assert_eq!((end - start).num_days(), 13);
        assert!(sprint_dates(Some("someday"), None).is_err());
    }

    #[test]
    fn sprint_end_past_the_calendar_is_rejected() {
        assert!(matches!(two_weeks_from(NaiveDate::MAX), Err(EngineError::Validation(_))));
        assert!(two_weeks_from(NaiveDate::MAX - Duration::days(13)).is_ok());
        assert!(matches!(sprint_dates(Some("in 999999999d"), None), Err(EngineError::Validation(_))));
        assert!(matches!(sprint_dates(Some("2025-03-03"), Some("in 99999999w")), Err(EngineError::Validation(_))));
    }

    #[test]
    fn view_hides_other_teams_tasks() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);
        let core = config(&dir, Some("Core"));
        run(Commands::Team { action: TeamAction::Create { name: "Web".into() } }, &core).unwrap();
        let add = Commands::Add {
            title: "Core only".into(),
            desc: None,
            task_type: TaskType::Task,
            priority: Priority::Medium,
            points: None,
            assignee: None,
            due: None,
            epic: None,
            labels: vec![],
            sprint: None,
        };
        run(add, &core).unwrap();

        assert!(run(Commands::View { id: 1 }, &core).is_ok());
        let err = run(Commands::View { id: 1 }, &config(&dir, Some("Web"))).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn empty_proposal_is_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);
        let proposal = dir.path().join("proposal.json");
        fs::write(&proposal, r#"{"sprintName":"X","totalStoryPoints":0}"#).unwrap();
        let apply = Commands::Plan {
            action: PlanAction::Apply { response: proposal, start: Some("2025-03-03".into()), end: None, json: false },
        };
        let err = run(apply, &config(&dir, None)).unwrap_err();
        assert!(matches!(err, EngineError::Oracle(OracleError::Malformed(_))));
        let db = Database::open(&dir.path().join("board.json")).unwrap();
        assert!(db.tables().sprints.is_empty());
    }

    #[test]
    fn add_then_move_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);
        let cfg = config(&dir, None);
        let add = Commands::Add {
            title: "Write docs".into(),
            desc: None,
            task_type: TaskType::Task,
            priority: Priority::High,
            points: Some(2),
            assignee: None,
            due: Some("2025-01-10".into()),
            epic: None,
            labels: vec![],
            sprint: None,
        };
        run(add, &cfg).unwrap();
        run(Commands::Move { id: 1, status: Status::Done }, &cfg).unwrap();

        let db = Database::open(&dir.path().join("board.json")).unwrap();
        let task = db.task(1).unwrap();
        assert_eq!(task.status, Status::Done);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn plan_commit_shortfall_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);
        let cfg = config(&dir, Some("Core"));
        let commit = Commands::Plan {
            action: PlanAction::Commit {
                name: "S1".into(),
                goal: None,
                start: Some("2025-01-06".into()),
                end: None,
                tasks: vec![],
                text: Some("Real task\n[high] (3)".into()),
                file: None,
                variant: ParseVariant::Planner,
                json: false,
            },
        };
        let err = run(commit, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::PartialBatch { succeeded: 1, requested: 2 }));
        let db = Database::open(&dir.path().join("board.json")).unwrap();
        assert_eq!(db.tables().sprints.len(), 1);
        assert_eq!(db.tables().memberships.len(), 1);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);
        let session = open_session(&config(&dir, None)).unwrap();
        assert!(resolve_labels(&session, &["nope".into()]).is_err());
        assert!(resolve_labels(&session, &[" , ".into()]).unwrap().is_empty());
    }
}
