use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OeisError {
    #[error("key {0} is not a valid OEIS id")]
    InvalidIdentifier(String),

    #[error("key {0} missing from OEIS")]
    MissingIdentifier(String),

    #[error("OEIS numbers don't match: {number} should be {found}")]
    RegistrationConflict { number: u64, found: String },

    #[error("term {index} of {name} is unavailable")]
    IndexUnavailable { name: String, index: i64 },

    #[error("malformed `{field}` field: {message}")]
    MalformedField {
        field: &'static str,
        message: String,
    },

    #[error("search term must be non-empty")]
    EmptySearchTerm,

    #[error("OEIS request failed: {0}")]
    Http(String),

    #[error("OEIS returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode OEIS response: {0}")]
    Decode(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl OeisError {
    pub(crate) fn malformed(field: &'static str, message: impl Into<String>) -> Self {
        OeisError::MalformedField {
            field,
            message: message.into(),
        }
    }
}
