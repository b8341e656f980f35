pub mod challenge;
pub mod rate_limit;

pub use challenge::{Challenge, ChallengeGate};
pub use rate_limit::{ActionClass, RateLimiter};
