//! Configuration management for Drover

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Automation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Engine to resolve from the registry ("headless" or "remote")
    pub engine: String,

    /// Directory scanned for vendor driver executables
    pub driver_dir: Option<String>,

    /// Explicit vendor driver executable path
    pub driver_path: Option<String>,

    /// Endpoint of an already-running engine to attach to
    pub endpoint: Option<String>,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Pacing interval between flow steps in milliseconds
    pub flow_pacing_ms: u64,

    /// Per-task timeout in seconds
    pub task_timeout_secs: u64,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: "headless".to_string(),
            driver_dir: None,
            driver_path: None,
            endpoint: None,
            headless: true,
            flow_pacing_ms: 1000,
            task_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(engine) = env::var("DROVER_ENGINE") {
            config.engine = engine;
        }

        if let Ok(driver_dir) = env::var("DROVER_DRIVER_DIR") {
            config.driver_dir = Some(driver_dir);
        }

        if let Ok(driver_path) = env::var("DROVER_DRIVER_PATH") {
            config.driver_path = Some(driver_path);
        }

        if let Ok(endpoint) = env::var("DROVER_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        if let Ok(headless) = env::var("DROVER_HEADLESS") {
            config.headless = headless
                .parse()
                .map_err(|_| Error::configuration("Invalid DROVER_HEADLESS"))?;
        }

        if let Ok(pacing) = env::var("DROVER_FLOW_PACING_MS") {
            config.flow_pacing_ms = pacing
                .parse()
                .map_err(|_| Error::configuration("Invalid DROVER_FLOW_PACING_MS"))?;
        }

        if let Ok(timeout) = env::var("DROVER_TASK_TIMEOUT_SECS") {
            config.task_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid DROVER_TASK_TIMEOUT_SECS"))?;
        }

        if let Ok(log_level) = env::var("DROVER_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }
}
