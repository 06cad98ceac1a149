//! Error types for the HTTP adapter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpAdapterError {
    /// Configuration value missing or malformed
    #[error("Invalid target configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HttpAdapterError>;
