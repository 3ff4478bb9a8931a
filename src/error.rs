//! Error types for sqlrest.

use thiserror::Error;

/// The main error type for statement translation and execution.
#[derive(Debug, Error)]
pub enum SqlRestError {
    /// The statement text could not be tokenized.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// The statement shape cannot be decomposed into a supported form.
    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    /// An INSERT without a usable column list or value list.
    #[error("Invalid INSERT syntax: {0}")]
    InvalidInsertSyntax(String),

    /// A WHERE fragment that matches none of the supported operators.
    #[error("Unsupported predicate: '{0}'")]
    UnsupportedPredicate(String),

    /// UPDATE or DELETE without a WHERE clause.
    #[error("{kind} requires a WHERE clause")]
    MissingWhereClause { kind: &'static str },

    /// Fewer parameters than placeholder markers.
    #[error("Statement has {expected} placeholder(s) but {supplied} parameter(s) were supplied")]
    ParameterCountMismatch { expected: usize, supplied: usize },

    /// A bound value the client cannot represent, such as a NaN float.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error reported by the upstream query service, passed through unchanged.
    #[error("Upstream error ({status}): {message}")]
    Upstream {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Transport failure talking to the upstream service.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be decoded into the requested row type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqlRestError {
    /// Create a parse error at the given byte offset.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an unsupported-statement error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedStatement(message.into())
    }

    /// Create an invalid-insert error.
    pub fn invalid_insert(message: impl Into<String>) -> Self {
        Self::InvalidInsertSyntax(message.into())
    }

    /// True for errors raised before anything was sent upstream.
    pub fn is_translation_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnsupportedStatement(_)
                | Self::InvalidInsertSyntax(_)
                | Self::UnsupportedPredicate(_)
                | Self::MissingWhereClause { .. }
                | Self::ParameterCountMismatch { .. }
                | Self::InvalidParameter(_)
        )
    }
}

impl From<reqwest::Error> for SqlRestError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Result type alias for sqlrest operations.
pub type SqlRestResult<T> = Result<T, SqlRestError>;
