//! Error types for the keeper service

use thiserror::Error;
use twamm_core::TwammError;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Pair error: {0}")]
    Pair(#[from] TwammError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown pair: {0}")]
    UnknownPair(String),

    #[error("Action not supported by a live keeper: {0}")]
    UnsupportedAction(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type KeeperResult<T> = Result<T, KeeperError>;

impl From<std::io::Error> for KeeperError {
    fn from(err: std::io::Error) -> Self {
        KeeperError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for KeeperError {
    fn from(err: config::ConfigError) -> Self {
        KeeperError::InvalidConfig(err.to_string())
    }
}

impl From<toml::de::Error> for KeeperError {
    fn from(err: toml::de::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<toml::ser::Error> for KeeperError {
    fn from(err: toml::ser::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}
