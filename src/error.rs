use std::io;
use std::num::ParseFloatError;
use std::str::Utf8Error;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to settings file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on settings file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode settings as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write settings file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build settings file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ThresholdError {
    #[error("Critical angle is not a number: {source}")]
    NotANumber { #[from] source: ParseFloatError },

    #[error("Critical angle must be finite")]
    NotFinite,

    #[error("Critical angle must be greater than 0 (got {0})")]
    NotPositive(f32),
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("No suitable network interface found")]
    NoInterface,

    #[error("Could not resolve endpoint host {0}")]
    Unresolvable(String),

    #[error("Network error: {source}")]
    Io { #[from] source: io::Error },

    #[error("WebSocket error: {source}")]
    WebSocket { #[from] source: tungstenite::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start monitor (settings): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to initialize logging: {source}")]
    Logging { #[from] source: fern::InitError },

    #[error("Failed to start monitor (runtime): {source}")]
    Runtime { #[from] source: io::Error },
}
