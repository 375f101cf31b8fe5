//! Configuration module for drainserve
//!
//! Configuration is loaded with the following priority (highest first):
//! 1. Command line arguments
//! 2. Environment variables (`PORT`, or prefixed with DRAINSERVE_)
//! 3. Configuration file (config.toml or config.yaml)
//! 4. Default values

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use config::{ConfigError, Environment, File};
use serde::Deserialize;

use crate::gate::RequestGate;
use crate::task::{LongTask, SimulatedWork};

/// Default host to bind to
const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port
const DEFAULT_PORT: u16 = 3000;
/// Default deadline for draining after SIGTERM (2 minutes)
const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 120;
/// Default duration of the simulated long-running task (5 minutes)
const DEFAULT_LONG_TASK_SECS: u64 = 300;

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "drainserve")]
#[command(about = "An HTTP server that drains in-flight requests before exiting")]
pub struct CliArgs {
    /// Host to bind the server to
    #[arg(long, env = "DRAINSERVE_HOST")]
    pub host: Option<String>,

    /// Port to bind the server to
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Seconds to wait for in-flight requests after SIGTERM before forcing exit
    #[arg(long, env = "DRAINSERVE_DRAIN_TIMEOUT_SECS")]
    pub drain_timeout_secs: Option<u64>,

    /// Duration in seconds of the simulated work behind /long-running
    #[arg(long, env = "DRAINSERVE_LONG_TASK_SECS")]
    pub long_task_secs: Option<u64>,

    /// Path to configuration file
    #[arg(short, long, env = "DRAINSERVE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// File-based configuration (for TOML/YAML)
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    drain_timeout_secs: Option<u64>,
    long_task_secs: Option<u64>,
}

/// Configuration for the drainserve server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind the server to
    pub host: String,

    /// Port to bind the server to (0 picks an ephemeral port)
    pub port: u16,

    /// Drain deadline applied after SIGTERM
    pub drain_timeout_secs: u64,

    /// Duration of the simulated long-running task
    pub long_task_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
            long_task_secs: DEFAULT_LONG_TASK_SECS,
        }
    }
}

impl Config {
    /// Create a new configuration with explicit bind values and default timings
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Override the drain deadline and long task duration
    pub fn with_timings(mut self, drain_timeout_secs: u64, long_task_secs: u64) -> Self {
        self.drain_timeout_secs = drain_timeout_secs;
        self.long_task_secs = long_task_secs;
        self
    }

    /// Load configuration from all sources (CLI > env > file > defaults)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(CliArgs::parse())
    }

    /// Load configuration from provided CLI args (for testing)
    pub fn load_from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let file_config = Self::load_file_config(&args.config)?;

        // Apply file config (file overrides defaults)
        if let Some(h) = file_config.host {
            config.host = h;
        }
        if let Some(p) = file_config.port {
            config.port = p;
        }
        if let Some(secs) = file_config.drain_timeout_secs {
            config.drain_timeout_secs = secs;
        }
        if let Some(secs) = file_config.long_task_secs {
            config.long_task_secs = secs;
        }

        // Apply CLI args (CLI overrides everything)
        if let Some(h) = args.host {
            config.host = h;
        }
        if let Some(p) = args.port {
            config.port = p;
        }
        if let Some(secs) = args.drain_timeout_secs {
            config.drain_timeout_secs = secs;
        }
        if let Some(secs) = args.long_task_secs {
            config.long_task_secs = secs;
        }

        Ok(config)
    }

    /// Load configuration from file
    fn load_file_config(config_path: &Option<PathBuf>) -> Result<FileConfig, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.as_path()));
        } else {
            // Try default config files (optional)
            builder = builder
                .add_source(File::with_name("config").required(false))
                .add_source(File::with_name("drainserve").required(false));
        }

        // Add environment variables with DRAINSERVE_ prefix
        builder = builder.add_source(Environment::with_prefix("DRAINSERVE").try_parsing(true));

        let settings = builder.build()?;
        settings.try_deserialize()
    }

    /// Get the socket address for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn long_task_duration(&self) -> Duration {
        Duration::from_secs(self.long_task_secs)
    }
}

/// Shared application state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub gate: RequestGate,
    pub long_task: Arc<dyn LongTask>,
}

impl AppState {
    /// Create application state whose long task is simulated work of the
    /// configured duration.
    ///
    /// The gate is shared with the shutdown coordinator that flips it.
    pub fn new(config: &Config, gate: RequestGate) -> Self {
        let long_task = Arc::new(SimulatedWork::new(config.long_task_duration()));
        Self { gate, long_task }
    }

    /// Replace the work behind `/long-running`.
    pub fn with_long_task(mut self, long_task: Arc<dyn LongTask>) -> Self {
        self.long_task = long_task;
        self
    }
}
