//! Board session: one user's view of one team's board.
//!
//! The session owns the store handle, the team it works in, the current
//! scope and filters, the board last projected for them, and the clock used
//! to stamp writes. Every operation the CLI offers goes through here.
//!
//! Status moves update the displayed board optimistically. Every other
//! write re-projects the board from a fresh snapshot once the store has
//! confirmed it.

use chrono::{DateTime, NaiveDate, Utc};

use crate::board::{self, Board, BoardFilters};
use crate::error::{EngineError, Result};
use crate::fields::{ScopeFilter, SprintStatus, Status};
use crate::ledger::{self, Relink};
use crate::oracle::*;
use crate::parser::{self, ParseVariant};
use crate::reconciler::{self, CommitReport, Plan};
use crate::scope::{self, ScopeAlert};
use crate::store::{Snapshot, Store};
use crate::task::*;
use crate::transition::{self, Transition};
use crate::validate::{existing_team, validate_new_sprint, validate_new_task, validate_task};

pub struct BoardSession<S: Store> {
    store: S,
    team: Team,
    scope: ScopeFilter,
    filters: BoardFilters,
    board: Board,
    clock: fn() -> DateTime<Utc>,
}

impl<S: Store> BoardSession<S> {
    /// Start a session on `team_id` showing every task.
    pub fn open(store: S, team_id: TeamId) -> Result<Self> {
        let team = existing_team(&store, team_id)?;
        let mut session = BoardSession {
            store,
            team,
            scope: ScopeFilter::All,
            filters: BoardFilters::default(),
            board: Board::default(),
            clock: Utc::now,
        };
        session.reproject()?;
        Ok(session)
    }

    /// Replace the clock used for `created_at` and `added_at` stamps.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot::load(&self.store, self.team.id)?)
    }

    fn reproject(&mut self) -> Result<()> {
        let snapshot = self.snapshot()?;
        self.board = board::project(&snapshot, self.scope, &self.filters);
        Ok(())
    }

    /// A task of this session's team.
    pub fn task(&self, task_id: TaskId) -> Result<Task> {
        self.own_task(task_id)
    }

    fn own_task(&self, task_id: TaskId) -> Result<Task> {
        let task = self.store.task(task_id)?;
        if task.team_id != self.team.id {
            return Err(EngineError::validation(format!(
                "task {task_id} does not belong to team '{}'",
                self.team.name
            )));
        }
        Ok(task)
    }

    fn own_sprint(&self, sprint_id: SprintId) -> Result<Sprint> {
        let sprint = self.store.sprint(sprint_id)?;
        if sprint.team_id != self.team.id {
            return Err(EngineError::validation(format!(
                "sprint {sprint_id} does not belong to team '{}'",
                self.team.name
            )));
        }
        Ok(sprint)
    }

    /// Switch scope and filters and project the board for them.
    pub fn get_board(&mut self, scope: ScopeFilter, filters: BoardFilters) -> Result<&Board> {
        self.scope = scope;
        self.filters = filters;
        self.reproject()?;
        Ok(&self.board)
    }

    pub fn move_task(&mut self, task_id: TaskId, target: Status) -> Result<Transition> {
        if self.board.get(task_id).is_none() {
            self.own_task(task_id)?;
        }
        transition::move_task(&mut self.store, &mut self.board, task_id, target)
    }

    pub fn create_task(&mut self, mut fields: NewTask) -> Result<Task> {
        fields.team_id = self.team.id;
        validate_new_task(&self.store, &fields)?;
        let task = self.store.create_task(fields, (self.clock)())?;
        tracing::info!(task_id = task.id, team_id = task.team_id, "created task");
        self.reproject()?;
        Ok(task)
    }

    pub fn update_task(&mut self, task_id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let current = self.own_task(task_id)?;
        let edited = patch.apply(&current);
        validate_task(&self.store, &edited)?;
        let task = self.store.update_task(&edited)?;
        tracing::info!(task_id, "updated task");
        self.reproject()?;
        Ok(task)
    }

    /// Delete a task along with its sprint membership.
    pub fn delete_task(&mut self, task_id: TaskId) -> Result<Task> {
        let task = self.own_task(task_id)?;
        self.store.delete_task(task_id)?;
        tracing::info!(task_id, "deleted task");
        self.reproject()?;
        Ok(task)
    }

    pub fn create_sprint(&mut self, mut fields: NewSprint) -> Result<Sprint> {
        fields.team_id = self.team.id;
        validate_new_sprint(&self.store, &fields)?;
        let sprint = self.store.create_sprint(fields)?;
        tracing::info!(sprint_id = sprint.id, name = %sprint.name, "created sprint");
        Ok(sprint)
    }

    pub fn sprints(&self) -> Result<Vec<Sprint>> {
        Ok(self.snapshot()?.sprints)
    }

    /// Set a sprint's status directly.
    pub fn set_sprint_status(&mut self, sprint_id: SprintId, status: SprintStatus) -> Result<Sprint> {
        let mut sprint = self.own_sprint(sprint_id)?;
        sprint.status = status;
        let sprint = self.store.update_sprint(&sprint)?;
        tracing::info!(sprint_id, status = %status, "set sprint status");
        Ok(sprint)
    }

    /// Move a sprint one step along planning, active, completed.
    pub fn advance_sprint(&mut self, sprint_id: SprintId) -> Result<Sprint> {
        let sprint = self.own_sprint(sprint_id)?;
        let next = sprint
            .status
            .next()
            .ok_or_else(|| EngineError::validation(format!("sprint '{}' is already completed", sprint.name)))?;
        self.set_sprint_status(sprint_id, next)
    }

    /// Delete a sprint. Its tasks go back to the backlog.
    pub fn delete_sprint(&mut self, sprint_id: SprintId) -> Result<Sprint> {
        let sprint = self.own_sprint(sprint_id)?;
        self.store.delete_sprint(sprint_id)?;
        tracing::info!(sprint_id, "deleted sprint");
        if self.scope == ScopeFilter::Sprint(sprint_id) {
            self.scope = ScopeFilter::All;
        }
        self.reproject()?;
        Ok(sprint)
    }

    pub fn attach_to_sprint(&mut self, task_id: TaskId, sprint_id: SprintId) -> Result<SprintMembership> {
        self.own_sprint(sprint_id)?;
        let row = ledger::attach(&mut self.store, sprint_id, task_id, (self.clock)())?;
        self.reproject()?;
        Ok(row)
    }

    pub fn detach_from_sprint(&mut self, task_id: TaskId, sprint_id: SprintId) -> Result<()> {
        self.own_sprint(sprint_id)?;
        ledger::detach(&mut self.store, sprint_id, task_id)?;
        self.reproject()
    }

    /// Move a task onto `sprint_id` from its current sprint or the backlog.
    pub fn move_to_sprint(&mut self, task_id: TaskId, sprint_id: SprintId) -> Result<Relink> {
        self.own_sprint(sprint_id)?;
        let relink = ledger::relink(&mut self.store, task_id, sprint_id, (self.clock)())?;
        self.reproject()?;
        Ok(relink)
    }

    pub fn preview_parse(&self, text: &str, variant: ParseVariant) -> Vec<DraftTask> {
        parser::parse(text, variant)
    }

    /// Commit a plan into a new sprint of this team.
    ///
    /// Returns the report even when some items failed; call
    /// [`CommitReport::ensure_complete`] to treat a shortfall as an error.
    pub fn commit_plan(&mut self, plan: &Plan) -> Result<CommitReport> {
        if plan.sprint.team_id != self.team.id {
            return Err(EngineError::validation(format!(
                "plan targets team {}, session is on team '{}'",
                plan.sprint.team_id, self.team.name
            )));
        }
        let report = reconciler::commit(&mut self.store, plan, (self.clock)())?;
        self.reproject()?;
        Ok(report)
    }

    pub fn get_scope_alerts(&self) -> Result<Vec<ScopeAlert>> {
        Ok(scope::scope_alerts(&self.snapshot()?))
    }

    /// Planning request over the open backlog.
    pub fn backlog_request(&self, team_capacity_hours: f64, sprint_duration_days: u32) -> Result<PlanningRequest> {
        let snapshot = self.snapshot()?;
        let backlog = board::project(&snapshot, ScopeFilter::Backlog, &BoardFilters::default());
        let tasks = backlog
            .columns
            .into_iter()
            .filter(|c| c.status != Status::Done)
            .flat_map(|c| c.tasks)
            .collect();
        Ok(PlanningRequest { input: PlanningInput::Tasks(tasks), team_capacity_hours, sprint_duration_days })
    }

    /// Ask `oracle` for a plan and check its answer before handing it back.
    pub fn suggest_plan(&self, oracle: &dyn PlanningOracle, request: &PlanningRequest) -> Result<PlanningResponse> {
        let response = oracle.propose(request)?;
        validate_suggestion(request, &response)?;
        tracing::info!(
            sprint_name = %response.sprint_name,
            recommended = response.recommended_task_ids.len(),
            points = response.total_story_points,
            "planning oracle answered"
        );
        Ok(response)
    }

    pub fn risk_heatmap(&self, oracle: &dyn RiskOracle, today: NaiveDate) -> Result<RiskReport> {
        let request = RiskRequest {
            tasks: self.snapshot()?.tasks,
            team_members: self.store.team(self.team.id)?.members,
            current_date: today,
        };
        Ok(oracle.assess(&request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::OracleError;
    use crate::fields::Priority;
    use crate::fixtures::*;
    use crate::reconciler::PlanItems;
    use pretty_assertions::assert_eq;

    fn fixed_now() -> DateTime<Utc> {
        at(2025, 1, 6)
    }

    fn session() -> BoardSession<Database> {
        let mut db = Database::in_memory();
        let team = team(&mut db);
        BoardSession::open(db, team).unwrap().with_clock(fixed_now)
    }

    fn column_ids(board: &Board, status: Status) -> Vec<TaskId> {
        board.column(status).iter().map(|t| t.id).collect()
    }

    #[test]
    fn unknown_team_cannot_open() {
        assert!(matches!(BoardSession::open(Database::in_memory(), 4), Err(EngineError::Validation(_))));
    }

    #[test]
    fn failing_store_on_open_is_remote() {
        let mut store = FlakyStore::default();
        let core = team(&mut store);
        store.fail_team_reads = true;
        let err = BoardSession::open(store, core).err().unwrap();
        assert!(matches!(err, EngineError::Remote(crate::error::StoreError::Unavailable(_))));
    }

    #[test]
    fn created_task_shows_up_in_todo() {
        let mut s = session();
        let t = s.create_task(NewTask { title: "Write docs".into(), ..NewTask::default() }).unwrap();
        assert_eq!(t.created_at, fixed_now());
        assert_eq!(t.team_id, s.team().id);
        assert_eq!(column_ids(s.board(), Status::Todo), vec![t.id]);
    }

    #[test]
    fn invalid_task_is_not_written() {
        let mut s = session();
        assert!(s.create_task(NewTask { title: "  ".into(), ..NewTask::default() }).is_err());
        assert!(s.store().tables().tasks.is_empty());
    }

    #[test]
    fn moved_task_sits_in_one_column() {
        let mut s = session();
        let t = s.create_task(NewTask { title: "A".into(), ..NewTask::default() }).unwrap();
        s.move_task(t.id, Status::Review).unwrap();
        let holding: Vec<Status> =
            s.board().columns.iter().filter(|c| c.tasks.iter().any(|x| x.id == t.id)).map(|c| c.status).collect();
        assert_eq!(holding, vec![Status::Review]);
        assert_eq!(s.store().task(t.id).unwrap().status, Status::Review);
    }

    #[test]
    fn tasks_of_other_teams_are_off_limits() {
        let mut db = Database::in_memory();
        let core = team(&mut db);
        let other = db.create_team("Other").unwrap().id;
        let foreign = task(&mut db, other, "Theirs", None);
        let mut s = BoardSession::open(db, core).unwrap();
        assert!(matches!(s.task(foreign), Err(EngineError::Validation(_))));
        assert!(matches!(s.move_task(foreign, Status::Done), Err(EngineError::Validation(_))));
        assert!(s.delete_task(foreign).is_err());
        assert_eq!(s.store().task(foreign).unwrap().status, Status::Todo);
    }

    #[test]
    fn attach_and_move_update_backlog_view() {
        let mut s = session();
        let team_id = s.team().id;
        let s1 = s.create_sprint(s1_fields(team_id)).unwrap();
        let s2 = s.create_sprint(NewSprint { name: "S2".into(), ..s1_fields(team_id) }).unwrap();
        let a = s.create_task(NewTask { title: "A".into(), ..NewTask::default() }).unwrap();
        s.get_board(ScopeFilter::Backlog, BoardFilters::default()).unwrap();
        assert_eq!(s.board().len(), 1);

        let row = s.attach_to_sprint(a.id, s1.id).unwrap();
        assert_eq!(row.added_at, fixed_now());
        assert!(s.board().is_empty());

        let relink = s.move_to_sprint(a.id, s2.id).unwrap();
        assert_eq!(relink.from, Some(s1.id));
        s.get_board(ScopeFilter::Sprint(s2.id), BoardFilters::default()).unwrap();
        assert_eq!(column_ids(s.board(), Status::Todo), vec![a.id]);

        s.detach_from_sprint(a.id, s2.id).unwrap();
        assert!(s.board().is_empty());
    }

    fn s1_fields(team_id: TeamId) -> NewSprint {
        NewSprint {
            team_id,
            name: "S1".into(),
            goal: None,
            status: SprintStatus::Planning,
            start_date: d(2025, 1, 6),
            end_date: d(2025, 1, 17),
        }
    }

    #[test]
    fn sprint_advances_until_completed() {
        let mut s = session();
        let team_id = s.team().id;
        let sp = s.create_sprint(s1_fields(team_id)).unwrap();
        assert_eq!(s.advance_sprint(sp.id).unwrap().status, SprintStatus::Active);
        assert_eq!(s.advance_sprint(sp.id).unwrap().status, SprintStatus::Completed);
        assert!(s.advance_sprint(sp.id).is_err());
        assert_eq!(s.set_sprint_status(sp.id, SprintStatus::Planning).unwrap().status, SprintStatus::Planning);
    }

    #[test]
    fn deleting_viewed_sprint_falls_back_to_all() {
        let mut s = session();
        let team_id = s.team().id;
        let sp = s.create_sprint(s1_fields(team_id)).unwrap();
        let a = s.create_task(NewTask { title: "A".into(), ..NewTask::default() }).unwrap();
        s.attach_to_sprint(a.id, sp.id).unwrap();
        s.get_board(ScopeFilter::Sprint(sp.id), BoardFilters::default()).unwrap();
        s.delete_sprint(sp.id).unwrap();
        assert_eq!(s.board().scope, ScopeFilter::All);
        assert_eq!(column_ids(s.board(), Status::Todo), vec![a.id]);
    }

    #[test]
    fn plan_for_another_team_is_rejected() {
        let mut s = session();
        let plan = Plan {
            sprint: NewSprint { team_id: 99, ..s1_fields(99) },
            items: PlanItems::Text { text: "A".into(), variant: ParseVariant::Planner },
        };
        assert!(matches!(s.commit_plan(&plan), Err(EngineError::Validation(_))));
    }

    #[test]
    fn suggested_plan_commits_backlog_tasks() {
        let mut s = session();
        let team_id = s.team().id;
        let hi = s
            .create_task(NewTask { title: "Hi".into(), priority: Priority::High, story_points: Some(3), ..NewTask::default() })
            .unwrap();
        s.create_task(NewTask { title: "Big".into(), story_points: Some(20), ..NewTask::default() }).unwrap();

        let request = s.backlog_request(40.0, 10).unwrap();
        let response = s.suggest_plan(&CapacityPlanner::default(), &request).unwrap();
        assert_eq!(response.recommended_task_ids, vec![hi.id]);

        let plan = Plan::from_suggestion(&response, team_id, d(2025, 1, 6), d(2025, 1, 17));
        let report = s.commit_plan(&plan).unwrap();
        assert!(report.is_complete());
        s.get_board(ScopeFilter::Sprint(report.created_sprint_id), BoardFilters::default()).unwrap();
        assert_eq!(column_ids(s.board(), Status::Todo), vec![hi.id]);
    }

    struct Rogue;

    impl PlanningOracle for Rogue {
        fn propose(&self, _: &PlanningRequest) -> std::result::Result<PlanningResponse, OracleError> {
            Ok(PlanningResponse {
                sprint_name: "Rogue".into(),
                recommended_task_ids: vec![404],
                reasoning: None,
                total_story_points: 0,
                workload_distribution: vec![],
                risk_factors: vec![],
            })
        }
    }

    #[test]
    fn malformed_oracle_answer_is_an_oracle_error() {
        let s = session();
        let request = s.backlog_request(40.0, 10).unwrap();
        let err = s.suggest_plan(&Rogue, &request).unwrap_err();
        assert!(matches!(err, EngineError::Oracle(OracleError::Malformed(_))));
        assert!(err.is_remote());
    }

    #[test]
    fn heatmap_uses_team_members() {
        let mut db = Database::in_memory();
        let team_id = team(&mut db);
        let ana = db.add_member(team_id, "ana").unwrap().id;
        let mut s = BoardSession::open(db, team_id).unwrap().with_clock(fixed_now);
        s.create_task(NewTask { title: "Huge".into(), story_points: Some(21), assignee: Some(ana), ..NewTask::default() })
            .unwrap();
        let report = s.risk_heatmap(&HeuristicRiskOracle::default(), d(2025, 1, 6)).unwrap();
        assert_eq!(report.overloaded_members.len(), 1);
        assert_eq!(report.overloaded_members[0].name, "ana");
    }

    #[test]
    fn scope_alerts_come_from_fresh_snapshot() {
        let mut s = session();
        let team_id = s.team().id;
        let sp = s.create_sprint(NewSprint { status: SprintStatus::Active, ..s1_fields(team_id) }).unwrap();
        let a = s.create_task(NewTask { title: "A".into(), story_points: Some(5), ..NewTask::default() }).unwrap();
        let b = s.create_task(NewTask { title: "B".into(), story_points: Some(5), ..NewTask::default() }).unwrap();
        // Clock sits at noon on the start day, so both count as added.
        s.attach_to_sprint(a.id, sp.id).unwrap();
        s.attach_to_sprint(b.id, sp.id).unwrap();
        assert!(s.get_scope_alerts().unwrap().is_empty());
    }
}
