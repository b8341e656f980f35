use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::agent::ActivityTracker;
use crate::antiabuse::{ChallengeGate, RateLimiter};
use crate::clock::DynClock;
use crate::config::Config;
use crate::live::BroadcastHub;
use crate::posts::repository::DynPostRepository;
use crate::posts::PostService;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub posts: PostService,
    pub challenges: Arc<ChallengeGate>,
    pub limiter: Arc<RateLimiter>,
    pub hub: Arc<BroadcastHub>,
    pub activity: ActivityTracker,
    pub clock: DynClock,
}

impl AppState {
    pub fn new(config: Config, repo: DynPostRepository, clock: DynClock) -> Self {
        let hub = BroadcastHub::new(config.live.subscriber_buffer);
        let posts = PostService::new(repo, hub.clone(), clock.clone(), config.board.clone());
        let challenges = Arc::new(ChallengeGate::new(
            clock.clone(),
            config.challenge.difficulty,
            config.challenge.ttl(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            clock.clone(),
            config.limits.window(),
            config.limits.create_per_window,
            config.limits.edit_per_window,
        ));
        let activity = ActivityTracker::new(clock.clone());

        Self {
            config,
            posts,
            challenges,
            limiter,
            hub,
            activity,
            clock,
        }
    }
}
