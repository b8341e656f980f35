pub mod hub;

pub use hub::{BroadcastHub, LiveEvent, LiveEventKind, LivePayload, Subscription};
