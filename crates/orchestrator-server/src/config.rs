//! Process configuration, loaded from `.env` (if present) and the environment,
//! with command-line flags taking precedence over both.

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "orchestrator-server", about = "Single-node dependency-aware task orchestrator")]
pub struct Config {
    /// Port the HTTP API binds to.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Upper bound on tasks the scheduler runs at once. Must be positive.
    #[arg(long, env = "MAX_CONCURRENT_TASKS", default_value_t = 3)]
    pub max_concurrent_tasks: usize,

    /// One of error, warn, info, http, debug. `http` is a dedicated
    /// access-log target mapped onto `tracing::Level::INFO`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// SQLite database file. Only consulted when the `sqlite` feature is enabled.
    #[arg(long, env = "DATABASE_PATH", default_value = "tasks.db")]
    pub database_path: String,

    /// Scheduler polling interval, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,
}

const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "http", "debug"];

impl Config {
    /// Load from `.env`, the environment, and the command line (in that
    /// order of precedence, lowest to highest), then validate. Fails fast
    /// before any listener is bound.
    pub fn load() -> Result<Self> {
        // Missing .env is not an error; real deployments configure via the
        // environment directly.
        let _ = dotenvy::dotenv();
        let config = Config::parse();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            bail!("MAX_CONCURRENT_TASKS must be a positive integer");
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!(
                "LOG_LEVEL must be one of {VALID_LOG_LEVELS:?}, got {:?}",
                self.log_level
            );
        }
        Ok(())
    }

    /// The `tracing` `EnvFilter` directive string this config maps onto.
    ///
    /// `http` has no meaning to `tracing::Level`, so the base level is
    /// downgraded to `info`; what distinguishes it is the `http_access`
    /// target (the one `handler::route`'s per-request event is logged
    /// under), which this turns on at `info` only when `http` is selected
    /// and explicitly suppresses otherwise, so `LOG_LEVEL=info` alone does
    /// not produce a line per request.
    pub fn tracing_filter(&self) -> String {
        match self.log_level.as_str() {
            "http" => "info,http_access=info".to_string(),
            other => format!("{other},http_access=off"),
        }
    }
}
