//! # AppError
//!
//! Centralized error handling for the feed core.
//! Engines return [`AppError`]; store adapters return [`StoreError`], which the
//! engines translate so that a uniqueness violation becomes a `Conflict`
//! while any other storage fault becomes an opaque `Persistence` failure.

use thiserror::Error;

/// The primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Entity absent, or the caller is not allowed to know it exists.
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation (e.g. a second like on the same post).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Semantically illegal request (e.g. liking a post that is not approved).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Malformed input (e.g. page size out of range, blank content).
    #[error("validation error: {0}")]
    Validation(String),

    /// The store failed. The cause is kept for logging and never rendered.
    #[error("persistence failure")]
    Persistence(#[source] anyhow::Error),

    /// Credential missing or rejected by the identity provider.
    #[error("unauthenticated")]
    Unauthenticated,
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound(entity, id.to_string())
    }
}

/// Failure reported by a store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced row disappeared before the write landed.
    #[error("referenced row missing: {0}")]
    MissingReference(String),

    /// The referenced row exists but its state forbids the write
    /// (e.g. a like on a post that is not approved).
    #[error("referenced row not eligible: {0}")]
    NotEligible(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// A specialized Result type for engine logic.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type returned by store ports.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
