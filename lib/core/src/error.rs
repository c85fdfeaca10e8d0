//! Error handling foundation for waymark.
//!
//! This module provides the `Result` type alias using rootcause and the
//! persistence error shared by every store contract. Each crate defines its
//! own domain-specific error types in its own error module.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context via `.context()` as errors propagate.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Errors from persisted-store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or the statement failed.
    Unavailable { reason: String },
    /// A row was read back but could not be decoded.
    Corrupt { reason: String },
    /// A value could not be prepared for storage.
    Encoding { reason: String },
}

impl StoreError {
    /// Wraps any displayable error as an unavailable store.
    pub fn unavailable(err: impl fmt::Display) -> Self {
        Self::Unavailable {
            reason: err.to_string(),
        }
    }

    /// Wraps any displayable error as an undecodable row.
    pub fn corrupt(err: impl fmt::Display) -> Self {
        Self::Corrupt {
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "store unavailable: {reason}"),
            Self::Corrupt { reason } => write!(f, "store returned corrupt data: {reason}"),
            Self::Encoding { reason } => write!(f, "value could not be encoded for storage: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}
