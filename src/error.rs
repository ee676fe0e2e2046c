//! Error types for schema loading and document synthesis

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, XsdError>;

/// Errors raised while loading, describing or synthesizing from a schema
#[derive(Error, Debug)]
pub enum XsdError {
    #[error("Schema parse error: {0}")]
    SchemaParse(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Malformed XML at byte {position}: {message}")]
    MalformedXml { position: u64, message: String },

    #[error("Root element not declared in schema: {0}")]
    UnknownRoot(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl XsdError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        XsdError::SchemaParse(message.into())
    }

    pub(crate) fn synthesis(message: impl Into<String>) -> Self {
        XsdError::Synthesis(message.into())
    }
}

impl From<roxmltree::Error> for XsdError {
    fn from(err: roxmltree::Error) -> Self {
        XsdError::SchemaParse(format!("not well-formed XML: {}", err))
    }
}

impl From<reqwest::Error> for XsdError {
    fn from(err: reqwest::Error) -> Self {
        XsdError::Fetch(err.to_string())
    }
}
