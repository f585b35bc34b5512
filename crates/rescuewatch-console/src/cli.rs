//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::Parser;
use rescuewatch_core::{ConfigError, ConsoleConfig};

#[derive(Parser, Debug, Default)]
#[command(name = "rescuewatch", about = "Operator console for rescue-drone alerts")]
pub struct Cli {
    /// TOML config file; flags below override its values
    #[arg(long, env = "RESCUEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// WebSocket URL of the event relay
    #[arg(long, env = "RESCUEWATCH_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Operator id stamped on responses
    #[arg(long, env = "RESCUEWATCH_OPERATOR")]
    pub operator: Option<String>,

    /// Events kept in history
    #[arg(long)]
    pub history: Option<usize>,

    /// Reconnect attempts before going offline
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

impl Cli {
    /// Config file (or defaults) with flag overrides applied, validated.
    pub fn resolve(&self) -> Result<ConsoleConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ConsoleConfig::load(path)?,
            None => ConsoleConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(operator) = &self.operator {
            config.operator_id = operator.clone();
        }
        if let Some(history) = self.history {
            config.history_capacity = history;
        }
        if let Some(max) = self.max_attempts {
            config.reconnect.max_attempts = max;
        }
        config.validate()?;
        Ok(config)
    }
}
