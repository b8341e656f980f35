// Background maintenance loops.
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::antiabuse::{ChallengeGate, RateLimiter};
use crate::posts::PostService;

pub const ARCHIVAL_EVERY: Duration = Duration::from_secs(60 * 60);

/// Delete posts that have aged out of the retention window. Runs once
/// immediately, then every `every`.
pub fn spawn_archival_sweep(posts: PostService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = posts.purge_expired().await {
                tracing::error!("Archival sweep failed: {}", e);
            }
        }
    })
}

/// Drop expired challenges and idle rate windows.
pub fn spawn_challenge_sweep(
    challenges: Arc<ChallengeGate>,
    limiter: Arc<RateLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let expired = challenges.sweep_expired();
            let idle = limiter.prune();
            if expired + idle > 0 {
                tracing::debug!(
                    "Swept {} expired challenges and {} idle rate windows",
                    expired,
                    idle
                );
            }
        }
    })
}
