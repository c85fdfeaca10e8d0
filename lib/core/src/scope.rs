//! Namespace and project scope codes.
//!
//! Permissions name the namespace and project they apply to. Either may be
//! the wildcard `"*"`, which is kept as a string in storage and converted to
//! [`Scope::Any`] at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespace or project code in a permission, possibly the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    /// Matches every code.
    Any,
    /// Matches exactly one code.
    Exact(String),
}

impl Scope {
    /// The persisted form of [`Scope::Any`].
    pub const WILDCARD: &'static str = "*";

    /// Parses a persisted code.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        if code == Self::WILDCARD {
            Self::Any
        } else {
            Self::Exact(code.to_string())
        }
    }

    /// Creates an exact scope.
    #[must_use]
    pub fn exact(code: impl Into<String>) -> Self {
        Self::Exact(code.into())
    }

    /// Returns the persisted form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => Self::WILDCARD,
            Self::Exact(code) => code,
        }
    }

    /// Returns true for the wildcard.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns the concrete code, if this is not the wildcard.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Exact(code) => Some(code),
        }
    }

    /// Returns true if this scope covers `code`.
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(own) => own == code,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Scope {
    fn from(code: String) -> Self {
        if code == Self::WILDCARD {
            Self::Any
        } else {
            Self::Exact(code)
        }
    }
}

impl From<&str> for Scope {
    fn from(code: &str) -> Self {
        Self::parse(code)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Any => Scope::WILDCARD.to_string(),
            Scope::Exact(code) => code,
        }
    }
}
