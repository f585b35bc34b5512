//! Error types for the console core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("no connection to the event source is open")]
    NotConnected,

    #[error("no event is selected")]
    NoSelection,

    #[error("transport send failed: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {detail}")]
    Invalid { field: &'static str, detail: String },
}
