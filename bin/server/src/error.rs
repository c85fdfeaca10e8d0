//! HTTP mapping for domain errors.
//!
//! Clients never learn whether a username exists: unknown users and wrong
//! passwords answer identically. Store and internal failures are logged and
//! answered with a generic 500.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rootcause::prelude::Report;
use serde::Serialize;
use std::fmt;
use waymark_core::StoreError;
use waymark_identity::AuthError;

/// Errors returned by handlers and extractors.
#[derive(Debug)]
pub enum ApiError {
    Auth(Report<AuthError>),
    Store(Report<StoreError>),
    /// The OpenID routes were called while federation is disabled.
    OpenIdDisabled,
    /// The provider returned without an authorization code.
    SignInAborted { reason: String },
}

impl From<Report<AuthError>> for ApiError {
    fn from(report: Report<AuthError>) -> Self {
        Self::Auth(report)
    }
}

impl From<Report<StoreError>> for ApiError {
    fn from(report: Report<StoreError>) -> Self {
        Self::Store(report)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(report) => write!(f, "{report}"),
            Self::Store(report) => write!(f, "{report}"),
            Self::OpenIdDisabled => write!(f, "OpenID sign-in is disabled"),
            Self::SignInAborted { reason } => write!(f, "OpenID sign-in aborted: {reason}"),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl ApiError {
    /// Status and client-facing message.
    fn status(&self) -> (StatusCode, &'static str) {
        let Self::Auth(report) = self else {
            return match self {
                Self::OpenIdDisabled => (StatusCode::NOT_FOUND, "OpenID sign-in is disabled"),
                Self::SignInAborted { .. } => (StatusCode::BAD_REQUEST, "Sign-in was not completed"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            };
        };
        match report.current_context() {
            AuthError::InvalidCredentials | AuthError::UserNotFound { .. } => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AuthError::UserInactive { .. } => (StatusCode::FORBIDDEN, "User is inactive"),
            AuthError::TokenInvalid { .. } | AuthError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired token")
            }
            AuthError::Unauthenticated { .. } => {
                (StatusCode::UNAUTHORIZED, "Authentication required")
            }
            AuthError::InvalidState => (StatusCode::BAD_REQUEST, "Invalid sign-in state"),
            AuthError::IdTokenMissing | AuthError::IdTokenInvalid { .. } => {
                (StatusCode::UNAUTHORIZED, "Federated sign-in failed")
            }
            AuthError::ProviderFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "Identity provider unavailable")
            }
            AuthError::StoreFailure { .. } | AuthError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
