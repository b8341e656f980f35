// Library exports for thewall
// This allows integration tests and the binary to share modules

pub mod agent;
pub mod antiabuse;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod live;
pub mod posts;
pub mod render;
pub mod routes;
pub mod state;
