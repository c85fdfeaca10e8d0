//! Authentication extractors for Axum.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::sync::Arc;
use waymark_identity::CallContext;

use super::AppState;
use crate::error::ApiError;

/// Extractor for requiring an authenticated caller.
///
/// Reads the access token from the configured header, with or without a
/// `Bearer` prefix. Rejects with 401 when the token is missing or invalid.
pub struct RequireAuth(pub CallContext);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let authenticator = &app_state.authenticator;

        let header_value = parts
            .headers
            .get(authenticator.header_name())
            .and_then(|value| value.to_str().ok());

        let context = authenticator.authenticate(header_value).await?;
        Ok(RequireAuth(context))
    }
}
