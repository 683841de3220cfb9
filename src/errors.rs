//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Event source transport could not be reached; retried next tick.
    SourceUnavailable(String),
    /// A single item could not be fetched; the rest of the batch continues.
    Fetch(String),
    /// Task record could not be written; the item stays eligible for retry.
    Materialization(String),
    /// Log archive or recreate failed; the original file is left intact.
    Rotation(String),
    /// Optional configuration (e.g. mail credentials) is absent.
    ConfigurationMissing(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Mail login or OAuth token refresh failure.
    Auth(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether this error selects a documented fallback mode rather than
    /// signalling a failure.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::ConfigurationMissing(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable(msg) => write!(f, "source unavailable: {msg}"),
            Self::Fetch(msg) => write!(f, "fetch: {msg}"),
            Self::Materialization(msg) => write!(f, "materialization: {msg}"),
            Self::Rotation(msg) => write!(f, "rotation: {msg}"),
            Self::ConfigurationMissing(msg) => write!(f, "configuration missing: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Auth(msg) => write!(f, "auth: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("json: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Auth(format!("http: {err}"))
    }
}
