//! Error types for bridgebot.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
