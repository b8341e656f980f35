use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::agent::seeds::{load_seeds, SeedTemplate};
use crate::agent::tracker::ActivityTracker;
use crate::clock::DynClock;
use crate::config::AgentConfig;
use crate::error::AppResult;
use crate::posts::domain::{DayKey, Identity, PostId, BODY_MAX_CHARS};
use crate::posts::PostService;

/// Flourishes the agent tacks onto existing posts.
pub const EDIT_SUFFIXES: &[&str] = &[
    " ...and yet",
    " (someone was here)",
    " \u{2014} continued",
    ", perhaps",
    " \u{2728}",
    " \u{2014} or maybe not",
    ". Think about it.",
    " [edited]",
];

/// The slice of the board the agent is allowed to touch.
#[async_trait]
pub trait AgentBoard: Send + Sync {
    /// (total, agent-authored) posts for `day`.
    async fn day_counts(&self, day: &DayKey) -> AppResult<(u64, u64)>;

    async fn create_post(&self, topic: &str, body: &str) -> AppResult<PostId>;

    /// Append `suffix` to a random unclaimed post. `None` when there is
    /// nothing to edit.
    async fn edit_random_unclaimed(&self, suffix: &str) -> AppResult<Option<PostId>>;
}

pub type DynAgentBoard = Arc<dyn AgentBoard>;

#[async_trait]
impl AgentBoard for PostService {
    async fn day_counts(&self, day: &DayKey) -> AppResult<(u64, u64)> {
        PostService::day_counts(self, day).await
    }

    async fn create_post(&self, topic: &str, body: &str) -> AppResult<PostId> {
        let post = self.create(topic, body, Identity::Agent, None).await?;
        Ok(post.id)
    }

    async fn edit_random_unclaimed(&self, suffix: &str) -> AppResult<Option<PostId>> {
        let Some(post) = self.random_unclaimed().await? else {
            return Ok(None);
        };
        let body = with_suffix(&post.body, suffix);
        let edited = self.edit(&post.id, &post.topic, &body).await?;
        Ok(Some(edited.id))
    }
}

/// `body` plus `suffix` if the result still fits; otherwise `body` unchanged.
pub fn with_suffix(body: &str, suffix: &str) -> String {
    if body.chars().count() + suffix.chars().count() <= BODY_MAX_CHARS {
        format!("{}{}", body, suffix)
    } else {
        body.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still inside the inactivity window.
    Asleep,
    /// Awake, but the agent already has its share of today's posts.
    CapReached { total: u64, agent: u64 },
    /// Awake, but the day's counts could not be read.
    Skipped,
    Burst { performed: usize, interrupted: bool },
}

pub struct ActivityScheduler {
    config: AgentConfig,
    board: DynAgentBoard,
    tracker: ActivityTracker,
    clock: DynClock,
    seeds: Vec<SeedTemplate>,
    rng: StdRng,
}

impl ActivityScheduler {
    pub fn new(
        config: AgentConfig,
        board: DynAgentBoard,
        tracker: ActivityTracker,
        clock: DynClock,
        seeds: Vec<SeedTemplate>,
    ) -> Self {
        Self {
            config,
            board,
            tracker,
            clock,
            seeds,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the random source, for reproducible runs.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn inactivity(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.inactivity()).unwrap_or(chrono::Duration::hours(1))
    }

    /// One pass of the control loop.
    pub async fn tick(&mut self) -> TickOutcome {
        let threshold = self.inactivity();
        if !self.tracker.try_wake(threshold) {
            return TickOutcome::Asleep;
        }

        let day = DayKey::today(self.clock.now());
        let (total, agent) = match self.board.day_counts(&day).await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!("Agent could not read post counts for {}: {}", day, e);
                return TickOutcome::Skipped;
            }
        };

        let share = agent as f64 / (total + 1) as f64;
        if share >= self.config.max_daily_ratio {
            tracing::info!(
                "Agent has {} of {} posts for {}, holding off",
                agent,
                total,
                day
            );
            return TickOutcome::CapReached { total, agent };
        }

        let mut performed = 0;
        let mut interrupted = false;
        for n in 0..self.config.max_actions {
            if self.tracker.yield_if_human_returned(threshold) {
                tracing::info!("Human is back, agent stopping after {} actions", performed);
                interrupted = true;
                break;
            }

            self.act().await;
            performed += 1;

            let pause = self.config.action_pause();
            if n + 1 < self.config.max_actions && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        TickOutcome::Burst {
            performed,
            interrupted,
        }
    }

    /// A single create or edit. Failures are logged and swallowed.
    async fn act(&mut self) {
        if self.rng.gen::<f64>() < self.config.create_probability {
            let Some(seed) = self.seeds.choose(&mut self.rng).cloned() else {
                return;
            };
            match self.board.create_post(&seed.topic, &seed.body).await {
                Ok(id) => tracing::info!("Agent created post {} ({:?})", id, seed.topic),
                Err(e) => tracing::warn!("Agent failed to create a post: {}", e),
            }
        } else {
            let suffix = EDIT_SUFFIXES.choose(&mut self.rng).copied().unwrap_or("");
            match self.board.edit_random_unclaimed(suffix).await {
                Ok(Some(id)) => tracing::info!("Agent edited post {}", id),
                Ok(None) => tracing::debug!("Agent found nothing unclaimed to edit"),
                Err(e) => tracing::warn!("Agent failed to edit a post: {}", e),
            }
        }
    }

    fn next_wait(&mut self) -> Duration {
        let min = self.config.min_interval_secs;
        let max = self.config.max_interval_secs.max(min);
        Duration::from_secs(self.rng.gen_range(min..=max))
    }

    /// Tick forever with a jittered pause in between.
    pub async fn run(mut self) {
        tracing::info!(
            "Agent loaded {} seed posts, watching for inactivity",
            self.seeds.len()
        );
        loop {
            let outcome = self.tick().await;
            tracing::debug!("Agent tick: {:?}", outcome);

            let wait = self.next_wait();
            tokio::time::sleep(wait).await;
        }
    }
}

/// Start the agent in the background. Returns `None` when it is disabled or
/// its corpus cannot be loaded; the rest of the board keeps running.
pub fn spawn(
    config: AgentConfig,
    board: DynAgentBoard,
    tracker: ActivityTracker,
    clock: DynClock,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Agent disabled");
        return None;
    }

    let seeds = match load_seeds(config.seeds_path.as_deref()) {
        Ok(seeds) => seeds,
        Err(e) => {
            tracing::error!("Agent will not start: {}", e);
            return None;
        }
    };

    let scheduler = ActivityScheduler::new(config, board, tracker, clock, seeds);
    Some(tokio::spawn(scheduler.run()))
}
