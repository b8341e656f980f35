use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use thewall::clock::{DynClock, SystemClock};
use thewall::config::{Cli, Config};
use thewall::posts::repository::SqlitePostRepository;
use thewall::state::AppState;
use thewall::{agent, db, jobs, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    // Build app state
    let clock: DynClock = Arc::new(SystemClock);
    let repo = Arc::new(SqlitePostRepository::new(pool));
    let state = AppState::new(config.clone(), repo, clock.clone());

    // Background work
    jobs::spawn_archival_sweep(state.posts.clone(), jobs::ARCHIVAL_EVERY);
    jobs::spawn_challenge_sweep(
        state.challenges.clone(),
        state.limiter.clone(),
        config.challenge.sweep_every(),
    );
    agent::scheduler::spawn(
        config.agent.clone(),
        Arc::new(state.posts.clone()),
        state.activity.clone(),
        clock,
    );

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
