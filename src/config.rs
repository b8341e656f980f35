use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Default)]
#[command(name = "thewall", about = "A shared, ephemeral posting board")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Keep the autonomous poster switched off
    #[arg(long)]
    pub no_agent: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub board: BoardConfig,
    pub challenge: ChallengeConfig,
    pub limits: LimitsConfig,
    pub live: LiveConfig,
    pub agent: AgentConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BoardConfig {
    /// Days of history kept, counting back from today.
    pub retention_days: u32,
    pub feed_limit: u32,
    pub pin_hash_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Leading zero hex digits a solution must produce.
    pub difficulty: usize,
    pub ttl_secs: u64,
    pub sweep_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub create_per_window: usize,
    pub edit_per_window: usize,
    pub window_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LiveConfig {
    pub keepalive_secs: u64,
    pub subscriber_buffer: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub enabled: bool,
    /// Seed corpus override. The built-in corpus is used when unset.
    pub seeds_path: Option<PathBuf>,
    pub inactivity_secs: u64,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    pub max_actions: usize,
    pub max_daily_ratio: f64,
    pub create_probability: f64,
    pub action_pause_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            feed_limit: 50,
            pin_hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            ttl_secs: 300,
            sweep_secs: 60,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            create_per_window: 3,
            edit_per_window: 10,
            window_secs: 3600,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            subscriber_buffer: 32,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seeds_path: None,
            inactivity_secs: 3600,
            min_interval_secs: 45 * 60,
            max_interval_secs: 90 * 60,
            max_actions: 3,
            max_daily_ratio: 0.05,
            create_probability: 0.4,
            action_pause_secs: 5,
        }
    }
}

impl ChallengeConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_every(&self) -> Duration {
        Duration::from_secs(self.sweep_secs.max(1))
    }
}

impl LimitsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl LiveConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }
}

impl AgentConfig {
    pub fn inactivity(&self) -> Duration {
        Duration::from_secs(self.inactivity_secs)
    }

    pub fn action_pause(&self) -> Duration {
        Duration::from_secs(self.action_pause_secs)
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if cli.no_agent {
            config.agent.enabled = false;
        }

        if config.agent.min_interval_secs > config.agent.max_interval_secs {
            anyhow::bail!(
                "agent.min_interval_secs ({}) exceeds agent.max_interval_secs ({})",
                config.agent.min_interval_secs,
                config.agent.max_interval_secs
            );
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("thewall.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match &cli.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".thewall"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("thewall.db"))
    }
}
