use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::DynClock;

const PREFIX_BYTES: usize = 16;

/// What a client needs to start solving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    pub prefix: String,
    pub difficulty: usize,
}

/// Issues proof-of-work puzzles and checks their solutions. Each prefix is
/// single-use and lives for at most `ttl`.
pub struct ChallengeGate {
    clock: DynClock,
    difficulty: usize,
    ttl: chrono::Duration,
    outstanding: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ChallengeGate {
    pub fn new(clock: DynClock, difficulty: usize, ttl: Duration) -> Self {
        Self {
            clock,
            difficulty,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(5)),
            outstanding: Mutex::new(HashMap::new()),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn issue(&self) -> Challenge {
        let mut bytes = [0u8; PREFIX_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let prefix = hex::encode(bytes);

        self.lock().insert(prefix.clone(), self.clock.now());

        Challenge {
            prefix,
            difficulty: self.difficulty,
        }
    }

    /// True exactly once per issued prefix, and only with a nonce whose
    /// digest clears the difficulty before the prefix expires. A wrong
    /// nonce leaves the challenge usable.
    pub fn verify(&self, prefix: &str, nonce: &str) -> bool {
        let solved = meets_difficulty(&digest_hex(prefix, nonce), self.difficulty);
        let now = self.clock.now();

        let mut outstanding = self.lock();
        let issued_at = match outstanding.get(prefix) {
            Some(issued_at) => *issued_at,
            None => return false,
        };

        if now - issued_at > self.ttl {
            outstanding.remove(prefix);
            tracing::debug!("Challenge {} expired", prefix);
            return false;
        }
        if !solved {
            return false;
        }

        outstanding.remove(prefix);
        true
    }

    /// Drop everything past its TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut outstanding = self.lock();
        let before = outstanding.len();
        outstanding.retain(|_, issued_at| now - *issued_at <= self.ttl);
        before - outstanding.len()
    }

    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.outstanding.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lowercase hex SHA-256 of `prefix` immediately followed by `nonce`.
pub fn digest_hex(prefix: &str, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(nonce.as_bytes());
    hex::encode(hasher.finalize())
}

fn meets_difficulty(digest: &str, difficulty: usize) -> bool {
    digest.len() >= difficulty && digest.bytes().take(difficulty).all(|b| b == b'0')
}

/// Brute-force a nonce the way a browser would. Used by tests and tooling.
pub fn solve(prefix: &str, difficulty: usize) -> u64 {
    (0u64..)
        .find(|nonce| meets_difficulty(&digest_hex(prefix, &nonce.to_string()), difficulty))
        .unwrap_or_default()
}
