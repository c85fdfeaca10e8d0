//! Authentication routes for login, refresh, logout and OpenID sign-in.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;
use waymark_authz::{Subject, SubjectPermissions};
use waymark_identity::{CallContext, LoginBinding, Session};

use super::{AppState, RequireAuth};
use crate::error::ApiError;

/// Cookie binding the OpenID callback to the browser that began it.
///
/// Holds the state, nonce and PKCE verifier of the pending sign-in.
pub const OPENID_STATE_COOKIE: &str = "openid_state";

/// Lifetime of the sign-in cookie.
const OPENID_STATE_MAX_AGE: TimeDuration = TimeDuration::seconds(300);

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

/// Query parameters for the OpenID callback.
///
/// Missing values are treated as empty so that they fail the state check.
/// `error` is set when the provider ends the sign-in without a code.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackQuery {
    code: String,
    state: String,
    error: Option<String>,
}

/// Display settings for the login page.
#[derive(Debug, Serialize)]
pub struct OpenIdInfo {
    enabled: bool,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
}

/// The caller's identity and current permissions.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    context: CallContext,
    permissions: SubjectPermissions,
}

/// Signs in with a username and password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state.auth.login(&request.username, &request.password).await?;
    Ok(Json(session))
}

/// Trades a refresh token for a new pair.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(session))
}

/// Revokes the caller's refresh token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequireAuth(context): RequireAuth,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(context.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns whether OpenID sign-in is offered and how to present it.
pub async fn openid_info(State(state): State<Arc<AppState>>) -> Json<OpenIdInfo> {
    Json(OpenIdInfo {
        enabled: state.oidc.is_some(),
        name: state.openid.name().to_string(),
        icon: state.openid.icon().map(str::to_string),
    })
}

/// Begins OpenID sign-in by redirecting to the provider.
pub async fn openid_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let oidc = state.oidc.as_ref().ok_or(ApiError::OpenIdDisabled)?;
    let initiation = oidc.begin_auth();

    let cookie = Cookie::build((OPENID_STATE_COOKIE, initiation.binding.encode()))
        .path("/")
        .http_only(true)
        .secure(is_secure(&state, &headers))
        .same_site(SameSite::Lax)
        .max_age(OPENID_STATE_MAX_AGE);

    Ok((jar.add(cookie), Redirect::to(&initiation.authorization_url)))
}

/// Completes OpenID sign-in from the provider callback.
///
/// The sign-in cookie is cleared whatever the outcome. A callback carrying
/// an `error` or no code is rejected before anything is sent to the provider.
pub async fn openid_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Result<Json<Session>, ApiError>) {
    let expected = jar
        .get(OPENID_STATE_COOKIE)
        .and_then(|cookie| LoginBinding::decode(cookie.value()))
        .unwrap_or_default();

    let remove_state = Cookie::build((OPENID_STATE_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(is_secure(&state, &headers))
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(-1));
    let jar = jar.add(remove_state);

    let Some(oidc) = state.oidc.as_ref() else {
        return (jar, Err(ApiError::OpenIdDisabled));
    };
    if let Some(reason) = query.error {
        return (jar, Err(ApiError::SignInAborted { reason }));
    }
    if query.code.is_empty() {
        let reason = "missing code".to_string();
        return (jar, Err(ApiError::SignInAborted { reason }));
    }

    let result = oidc
        .complete_auth(&query.code, &query.state, &expected)
        .await
        .map(Json)
        .map_err(ApiError::from);
    (jar, result)
}

/// Returns the caller's identity and freshly fetched permissions.
pub async fn me(
    State(state): State<Arc<AppState>>,
    RequireAuth(context): RequireAuth,
) -> Result<Json<MeResponse>, ApiError> {
    let permissions = state
        .authorizer
        .permissions(Subject::Username(&context.username))
        .await?;
    Ok(Json(MeResponse {
        context,
        permissions,
    }))
}

/// Whether cookies should carry the Secure flag for this request.
fn is_secure(state: &AppState, headers: &HeaderMap) -> bool {
    state.secure_cookies
        || headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}
