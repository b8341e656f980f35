use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

use crate::clock::DynClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    Sleeping,
    Awake,
}

#[derive(Debug)]
struct SchedulerState {
    last_human_activity_at: DateTime<Utc>,
    mode: AgentMode,
}

/// Shared record of when a person last wrote to the board. The write path
/// only ever calls `record_human_activity`; the scheduler makes its
/// wake and yield decisions through the other methods, each under one lock.
#[derive(Clone)]
pub struct ActivityTracker {
    state: Arc<Mutex<SchedulerState>>,
    clock: DynClock,
}

impl ActivityTracker {
    /// Starts asleep, with the clock's current time as the last activity.
    pub fn new(clock: DynClock) -> Self {
        let now = clock.now();
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                last_human_activity_at: now,
                mode: AgentMode::Sleeping,
            })),
            clock,
        }
    }

    pub fn record_human_activity(&self) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.last_human_activity_at = now;
        if state.mode == AgentMode::Awake {
            tracing::info!("Human activity, agent going back to sleep");
        }
        state.mode = AgentMode::Sleeping;
    }

    /// Wake if the board has been idle longer than `threshold`. Returns
    /// whether the agent is awake afterwards.
    pub fn try_wake(&self, threshold: Duration) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        if state.mode == AgentMode::Sleeping && now - state.last_human_activity_at > threshold {
            state.mode = AgentMode::Awake;
            tracing::info!("No human activity for a while, agent waking up");
        }
        state.mode == AgentMode::Awake
    }

    /// Go back to sleep if someone wrote within `threshold`. Returns true
    /// when the caller should stop acting.
    pub fn yield_if_human_returned(&self, threshold: Duration) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        if now - state.last_human_activity_at < threshold {
            state.mode = AgentMode::Sleeping;
            return true;
        }
        false
    }

    pub fn mode(&self) -> AgentMode {
        self.lock().mode
    }

    pub fn idle(&self) -> Duration {
        self.clock.now() - self.lock().last_human_activity_at
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker() -> (ActivityTracker, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        (ActivityTracker::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn starts_sleeping() {
        let (tracker, _) = tracker();
        assert_eq!(tracker.mode(), AgentMode::Sleeping);
        assert!(!tracker.try_wake(Duration::hours(1)));
    }

    #[test]
    fn wakes_only_after_threshold() {
        let (tracker, clock) = tracker();
        clock.advance(Duration::hours(1));
        assert!(!tracker.try_wake(Duration::hours(1)));

        clock.advance(Duration::seconds(1));
        assert!(tracker.try_wake(Duration::hours(1)));
        assert_eq!(tracker.mode(), AgentMode::Awake);
    }

    #[test]
    fn human_activity_forces_sleep_and_resets_idle() {
        let (tracker, clock) = tracker();
        clock.advance(Duration::hours(2));
        assert!(tracker.try_wake(Duration::hours(1)));

        tracker.record_human_activity();
        assert_eq!(tracker.mode(), AgentMode::Sleeping);
        assert_eq!(tracker.idle(), Duration::zero());
    }

    #[test]
    fn yield_puts_agent_back_to_sleep() {
        let (tracker, clock) = tracker();
        clock.advance(Duration::hours(2));
        assert!(tracker.try_wake(Duration::hours(1)));
        assert!(!tracker.yield_if_human_returned(Duration::hours(1)));

        clock.advance(Duration::seconds(5));
        tracker.record_human_activity();
        // record_human_activity already slept the agent; yield agrees.
        assert!(tracker.yield_if_human_returned(Duration::hours(1)));
        assert_eq!(tracker.mode(), AgentMode::Sleeping);
    }

    #[test]
    fn clones_share_state() {
        let (tracker, clock) = tracker();
        let write_path = tracker.clone();
        clock.advance(Duration::hours(2));
        assert!(tracker.try_wake(Duration::hours(1)));

        write_path.record_human_activity();
        assert_eq!(tracker.mode(), AgentMode::Sleeping);
    }
}
