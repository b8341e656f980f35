use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use thewall::agent::scheduler::{with_suffix, EDIT_SUFFIXES};
use thewall::agent::seeds::SeedTemplate;
use thewall::agent::{ActivityScheduler, ActivityTracker, AgentBoard, AgentMode, TickOutcome};
use thewall::clock::{DynClock, ManualClock};
use thewall::config::AgentConfig;
use thewall::error::{AppError, AppResult};
use thewall::posts::domain::{DayKey, PostId};

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Create(String),
    Edit(String),
}

/// In-memory board that records what the agent did. Optionally simulates a
/// person writing while an action is in flight.
struct FakeBoard {
    counts: (u64, u64),
    actions: Mutex<Vec<Action>>,
    human_during_action: Mutex<Option<(usize, ActivityTracker)>>,
    fail_creates: bool,
}

impl FakeBoard {
    fn new(total: u64, agent: u64) -> Self {
        Self {
            counts: (total, agent),
            actions: Mutex::new(Vec::new()),
            human_during_action: Mutex::new(None),
            fail_creates: false,
        }
    }

    fn human_writes_during(&self, action: usize, tracker: ActivityTracker) {
        *self.human_during_action.lock().unwrap() = Some((action, tracker));
    }

    fn record(&self, action: Action) {
        let mut actions = self.actions.lock().unwrap();
        actions.push(action);
        if let Some((n, tracker)) = self.human_during_action.lock().unwrap().as_ref() {
            if actions.len() == *n {
                tracker.record_human_activity();
            }
        }
    }

    fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentBoard for FakeBoard {
    async fn day_counts(&self, _day: &DayKey) -> AppResult<(u64, u64)> {
        Ok(self.counts)
    }

    async fn create_post(&self, topic: &str, _body: &str) -> AppResult<PostId> {
        self.record(Action::Create(topic.to_string()));
        if self.fail_creates {
            return Err(AppError::Internal("disk on fire".into()));
        }
        Ok(PostId::generate())
    }

    async fn edit_random_unclaimed(&self, suffix: &str) -> AppResult<Option<PostId>> {
        self.record(Action::Edit(suffix.to_string()));
        Ok(Some(PostId::generate()))
    }
}

fn seeds() -> Vec<SeedTemplate> {
    vec![SeedTemplate {
        topic: "Seeded".into(),
        body: "A post from the seed corpus".into(),
    }]
}

fn quick_config(create_probability: f64) -> AgentConfig {
    AgentConfig {
        action_pause_secs: 0,
        create_probability,
        ..AgentConfig::default()
    }
}

struct Harness {
    clock: ManualClock,
    tracker: ActivityTracker,
    board: Arc<FakeBoard>,
    scheduler: ActivityScheduler,
}

fn harness(board: FakeBoard, config: AgentConfig) -> Harness {
    let clock = ManualClock::new(Utc::now());
    let dyn_clock: DynClock = Arc::new(clock.clone());
    let tracker = ActivityTracker::new(dyn_clock.clone());
    let board = Arc::new(board);
    let scheduler = ActivityScheduler::new(
        config,
        board.clone(),
        tracker.clone(),
        dyn_clock,
        seeds(),
    )
    .with_rng_seed(7);

    Harness {
        clock,
        tracker,
        board,
        scheduler,
    }
}

#[tokio::test]
async fn stays_asleep_while_humans_are_around() {
    let mut h = harness(FakeBoard::new(100, 0), quick_config(1.0));
    h.clock.advance(Duration::minutes(30));

    assert_eq!(h.scheduler.tick().await, TickOutcome::Asleep);
    assert!(h.board.actions().is_empty());
    assert_eq!(h.tracker.mode(), AgentMode::Sleeping);
}

#[tokio::test]
async fn idle_two_hours_under_cap_runs_a_full_burst() {
    // 3 agent posts of 100 is 3%.
    let mut h = harness(FakeBoard::new(100, 3), quick_config(1.0));
    h.clock.advance(Duration::hours(2));

    let outcome = h.scheduler.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Burst {
            performed: 3,
            interrupted: false
        }
    );
    assert_eq!(h.board.actions().len(), 3);
    assert!(h
        .board
        .actions()
        .iter()
        .all(|a| *a == Action::Create("Seeded".into())));
    assert_eq!(h.tracker.mode(), AgentMode::Awake);
}

#[tokio::test]
async fn human_write_mid_burst_stops_the_agent() {
    let mut h = harness(FakeBoard::new(100, 3), quick_config(1.0));
    h.board.human_writes_during(1, h.tracker.clone());
    h.clock.advance(Duration::hours(2));

    let outcome = h.scheduler.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Burst {
            performed: 1,
            interrupted: true
        }
    );
    assert_eq!(h.board.actions().len(), 1);
    assert_eq!(h.tracker.mode(), AgentMode::Sleeping);

    // Next tick finds a fresh human and stays asleep.
    assert_eq!(h.scheduler.tick().await, TickOutcome::Asleep);
}

#[tokio::test]
async fn over_cap_wakes_but_does_nothing() {
    // 6 of 100 is 6%.
    let mut h = harness(FakeBoard::new(100, 6), quick_config(1.0));
    h.clock.advance(Duration::hours(2));

    assert_eq!(
        h.scheduler.tick().await,
        TickOutcome::CapReached {
            total: 100,
            agent: 6
        }
    );
    assert!(h.board.actions().is_empty());
    assert_eq!(h.tracker.mode(), AgentMode::Awake);
}

#[tokio::test]
async fn empty_day_is_under_cap() {
    let mut h = harness(FakeBoard::new(0, 0), quick_config(1.0));
    h.clock.advance(Duration::hours(2));

    assert!(matches!(
        h.scheduler.tick().await,
        TickOutcome::Burst { performed: 3, .. }
    ));
}

#[tokio::test]
async fn edits_use_known_suffixes() {
    let mut h = harness(FakeBoard::new(100, 0), quick_config(0.0));
    h.clock.advance(Duration::hours(2));
    h.scheduler.tick().await;

    let actions = h.board.actions();
    assert_eq!(actions.len(), 3);
    for action in actions {
        match action {
            Action::Edit(suffix) => assert!(EDIT_SUFFIXES.contains(&suffix.as_str())),
            other => panic!("expected an edit, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn failed_actions_do_not_abort_the_burst() {
    let mut board = FakeBoard::new(100, 0);
    board.fail_creates = true;
    let mut h = harness(board, quick_config(1.0));
    h.clock.advance(Duration::hours(2));

    assert_eq!(
        h.scheduler.tick().await,
        TickOutcome::Burst {
            performed: 3,
            interrupted: false
        }
    );
    assert_eq!(h.board.actions().len(), 3);
}

#[test]
fn long_bodies_keep_their_text() {
    let body = "z".repeat(180);
    assert_eq!(with_suffix(&body, EDIT_SUFFIXES[0]), body);
}
