//! # AppError
//!
//! Centralized error handling for anonboard.
//! Every failure a request can end in maps onto one of these variants.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all ab-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Target entity absent (e.g. "Thread", "Reply")
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, Uuid),

    /// Supplied delete password does not match the stored one
    #[error("incorrect password")]
    IncorrectPassword,

    /// Request shape failure (missing field, malformed identifier)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Infrastructure failure (e.g. DB down, hashing failure)
    #[error("internal service error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A specialized Result type for anonboard logic.
pub type Result<T> = std::result::Result<T, AppError>;
