//! Bag builder error types.

use thiserror::Error;

/// Errors raised while assembling or executing a bag query.
///
/// `Configuration` and `InvalidArgument` are programmer errors: a builder
/// declared without a table, or a caller passing a structurally invalid value.
/// `Precondition` and `NotFound` report a call made without the state it
/// depends on. None of them are retried.
#[derive(Debug, Error)]
pub enum BagError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl BagError {
    /// Shorthand for an [`BagError::InvalidArgument`] with a message.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        BagError::InvalidArgument(message.into())
    }

    /// Whether this error is one of the configuration kinds.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BagError::Configuration(_) | BagError::InvalidArgument(_)
        )
    }

    /// Whether this error reports missing prior state.
    pub fn is_precondition(&self) -> bool {
        matches!(self, BagError::Precondition(_) | BagError::NotFound(_))
    }
}

/// Result type alias using BagError.
pub type BagResult<T> = Result<T, BagError>;
