use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::DynClock;

/// Budgets are tracked separately per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionClass {
    Create,
    Edit,
}

type WindowKey = (String, ActionClass);

/// Sliding-log limiter: each identity keeps the timestamps of its admitted
/// actions inside the rolling window.
pub struct RateLimiter {
    clock: DynClock,
    window: chrono::Duration,
    create_budget: usize,
    edit_budget: usize,
    windows: Mutex<HashMap<WindowKey, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(clock: DynClock, window: Duration, create_budget: usize, edit_budget: usize) -> Self {
        Self {
            clock,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::hours(1)),
            create_budget,
            edit_budget,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn budget(&self, class: ActionClass) -> usize {
        match class {
            ActionClass::Create => self.create_budget,
            ActionClass::Edit => self.edit_budget,
        }
    }

    /// Check and record in one step. A rejected attempt is not recorded.
    pub fn admit(&self, key: &str, class: ActionClass) -> bool {
        let now = self.clock.now();
        let cutoff = now - self.window;
        let budget = self.budget(class);

        let mut windows = self.lock();
        let log = windows.entry((key.to_string(), class)).or_default();

        while log.front().is_some_and(|ts| *ts <= cutoff) {
            log.pop_front();
        }

        if log.len() >= budget {
            tracing::info!("Rate limit hit for {} ({:?})", key, class);
            return false;
        }

        log.push_back(now);
        true
    }

    /// Forget identities with nothing left in their window.
    pub fn prune(&self) -> usize {
        let cutoff = self.clock.now() - self.window;
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, log| {
            log.retain(|ts| *ts > cutoff);
            !log.is_empty()
        });
        before - windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<WindowKey, VecDeque<DateTime<Utc>>>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn limiter() -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let limiter = RateLimiter::new(Arc::new(clock.clone()), Duration::from_secs(3600), 3, 10);
        (limiter, clock)
    }

    #[test]
    fn create_budget_is_three_per_hour() {
        let (limiter, _) = limiter();
        for _ in 0..3 {
            assert!(limiter.admit("fp", ActionClass::Create));
        }
        assert!(!limiter.admit("fp", ActionClass::Create));
    }

    #[test]
    fn edit_budget_is_independent_of_create() {
        let (limiter, _) = limiter();
        for _ in 0..3 {
            assert!(limiter.admit("fp", ActionClass::Create));
        }
        for _ in 0..10 {
            assert!(limiter.admit("fp", ActionClass::Edit));
        }
        assert!(!limiter.admit("fp", ActionClass::Edit));
    }

    #[test]
    fn identities_do_not_share_budgets() {
        let (limiter, _) = limiter();
        for _ in 0..3 {
            assert!(limiter.admit("a", ActionClass::Create));
        }
        assert!(limiter.admit("b", ActionClass::Create));
    }

    #[test]
    fn window_rolls_rather_than_resetting() {
        let (limiter, clock) = limiter();
        assert!(limiter.admit("fp", ActionClass::Create));
        clock.advance(chrono::Duration::minutes(30));
        assert!(limiter.admit("fp", ActionClass::Create));
        assert!(limiter.admit("fp", ActionClass::Create));
        assert!(!limiter.admit("fp", ActionClass::Create));

        // The first action ages out; the two later ones still count.
        clock.advance(chrono::Duration::minutes(31));
        assert!(limiter.admit("fp", ActionClass::Create));
        assert!(!limiter.admit("fp", ActionClass::Create));
    }

    #[test]
    fn rejections_do_not_extend_the_window() {
        let (limiter, clock) = limiter();
        for _ in 0..3 {
            limiter.admit("fp", ActionClass::Create);
        }
        for _ in 0..5 {
            clock.advance(chrono::Duration::minutes(10));
            assert!(!limiter.admit("fp", ActionClass::Create));
        }
        clock.advance(chrono::Duration::minutes(11));
        assert!(limiter.admit("fp", ActionClass::Create));
    }

    #[test]
    fn prune_drops_idle_identities() {
        let (limiter, clock) = limiter();
        limiter.admit("old", ActionClass::Create);
        clock.advance(chrono::Duration::minutes(61));
        limiter.admit("new", ActionClass::Edit);

        assert_eq!(limiter.prune(), 1);
        assert_eq!(limiter.tracked(), 1);
    }
}
