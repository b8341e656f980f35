pub mod scheduler;
pub mod seeds;
pub mod tracker;

pub use scheduler::{ActivityScheduler, AgentBoard, DynAgentBoard, TickOutcome};
pub use tracker::{ActivityTracker, AgentMode};
