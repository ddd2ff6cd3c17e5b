//! Configuration loading
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `RUNBOOK_CONFIG_PATH`, or `./runbook.toml` when present)
//! 3. Environment variables such as `RUNBOOK__SESSIONS__MAX_SESSIONS=20`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "RUNBOOK";
const CONFIG_PATH_ENV: &str = "RUNBOOK_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "runbook.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub sessions: SessionConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Ceiling on concurrently registered sessions
    pub max_sessions: usize,
    /// Sessions idle for longer than this are removed by `sweep_expired`
    pub idle_timeout_secs: u64,
    /// Ceiling on successfully executed steps per session
    pub max_steps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    /// Shell used to run command steps
    pub shell: String,
    /// Flag passing the command string to the shell
    pub shell_arg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10,
            idle_timeout_secs: 3600,
            max_steps: 1000,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                shell: "cmd".to_string(),
                shell_arg: "/C".to_string(),
            }
        } else {
            Self {
                shell: "sh".to_string(),
                shell_arg: "-c".to_string(),
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration using the default search path and environment
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    max_sessions: Option<usize>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Use an explicit config file (must exist)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Override the session ceiling after all other sources are applied
    pub fn max_sessions(mut self, max: Option<usize>) -> Self {
        self.max_sessions = max;
        self
    }

    /// Ignore `RUNBOOK__*` environment variables
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();

        let mut builder = config::Config::builder()
            .set_default("sessions.max_sessions", defaults.sessions.max_sessions as i64)?
            .set_default(
                "sessions.idle_timeout_secs",
                defaults.sessions.idle_timeout_secs as i64,
            )?
            .set_default("sessions.max_steps", defaults.sessions.max_steps as i64)?
            .set_default("executor.shell", defaults.executor.shell)?
            .set_default("executor.shell_arg", defaults.executor.shell_arg)?
            .set_default("logging.level", defaults.logging.level)?;

        if let Some((path, required)) = self.resolve_path() {
            builder = builder.add_source(config::File::from(path.as_path()).required(required));
        }

        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(max) = self.max_sessions {
            config.sessions.max_sessions = max;
        }

        if config.sessions.max_sessions == 0 {
            anyhow::bail!("sessions.max_sessions must be at least 1");
        }
        if config.sessions.max_steps == 0 {
            anyhow::bail!("sessions.max_steps must be at least 1");
        }

        Ok(config)
    }

    fn resolve_path(&self) -> Option<(PathBuf, bool)> {
        if let Some(path) = &self.config_path {
            return Some((path.clone(), true));
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some((PathBuf::from(path), true));
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            return Some((fallback.to_path_buf(), false));
        }
        None
    }
}
