//! OpenID Connect provider client.
//!
//! [`IdentityProvider`] is the seam the OIDC service talks through;
//! [`OidcClient`] implements it with discovery, code exchange and ID token
//! verification against the provider's published keys.
//!
//! Every sign-in is bound by a [`LoginBinding`]: the state travels in the
//! authorization URL, the nonce must come back inside the ID token, and the
//! PKCE verifier must accompany the code exchange.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreIdToken, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, OAuth2TokenResponse,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use rootcause::prelude::Report;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::error::OidcError;
use crate::federation::generate_state;
use crate::oidc::OpenIdConfig;
use crate::userinfo::UserInfo;

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Compact ID token, when the provider returned one.
    pub id_token: Option<String>,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-sign-in values that transport keeps until the provider calls back.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginBinding {
    /// Echoed by the provider on the callback URL.
    pub state: String,
    /// Must appear as the `nonce` claim of the ID token.
    pub nonce: String,
    /// Proves the code exchange comes from whoever began the sign-in.
    pub pkce_verifier: String,
}

impl LoginBinding {
    /// Draws a fresh state, nonce and PKCE verifier.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            state: generate_state(),
            nonce: generate_state(),
            pkce_verifier: generate_state(),
        }
    }

    /// Packs the binding into an opaque base64url value.
    #[must_use]
    pub fn encode(&self) -> String {
        let packed = json!({
            "state": self.state,
            "nonce": self.nonce,
            "pkce_verifier": self.pkce_verifier,
        });
        URL_SAFE_NO_PAD.encode(packed.to_string())
    }

    /// Unpacks a value produced by [`Self::encode`].
    #[must_use]
    pub fn decode(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl std::fmt::Debug for LoginBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginBinding")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdToken {
    subject: String,
    claims: Map<String, Value>,
}

impl IdToken {
    /// Wraps verified claims, which must carry a string `sub`.
    pub fn from_claims(claims: Map<String, Value>) -> Result<Self, Report<OidcError>> {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OidcError::ClaimsParseFailed {
                reason: "missing sub claim".to_string(),
            })?
            .to_string();
        Ok(Self { subject, claims })
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Every claim in the token payload, standard and custom.
    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// An OpenID provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the authorization endpoint URL carrying the binding's state,
    /// nonce and PKCE challenge.
    fn auth_url(&self, binding: &LoginBinding) -> String;

    /// Trades an authorization code for tokens, proving possession of the
    /// PKCE verifier.
    async fn exchange(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<OAuthToken, Report<OidcError>>;

    /// Checks signature, issuer, audience, expiry and nonce of a compact ID
    /// token.
    async fn verify_id_token(
        &self,
        raw: &str,
        nonce: &str,
    ) -> Result<IdToken, Report<OidcError>>;

    /// Extracts the user's profile.
    fn user_info(
        &self,
        token: &OAuthToken,
        id_token: &IdToken,
    ) -> Result<UserInfo, Report<OidcError>>;
}

/// Provider client built from discovery metadata.
pub struct OidcClient {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
    config: OpenIdConfig,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OidcClient {
    /// Runs discovery against the configured provider.
    #[instrument(skip_all, fields(provider = %config.provider_url()))]
    pub async fn discover(config: OpenIdConfig) -> Result<Self, Report<OidcError>> {
        let issuer_url =
            IssuerUrl::new(config.provider_url().to_string()).map_err(|e| {
                OidcError::ProviderInit {
                    reason: format!("invalid provider URL: {e}"),
                }
            })?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OidcError::ProviderInit {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| OidcError::ProviderInit {
                reason: format!("discovery failed: {e}"),
            })?;

        let redirect_url =
            RedirectUrl::new(config.redirect_url().to_string()).map_err(|e| {
                OidcError::ProviderInit {
                    reason: format!("invalid redirect URL: {e}"),
                }
            })?;

        debug!("provider metadata discovered");

        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(config.client_id().to_string()),
            client_secret: ClientSecret::new(config.client_secret().to_string()),
            redirect_url,
            http_client,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &OpenIdConfig {
        &self.config
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn auth_url(&self, binding: &LoginBinding) -> String {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let pkce_challenge = PkceCodeChallenge::from_code_verifier_sha256(
            &PkceCodeVerifier::new(binding.pkce_verifier.clone()),
        );
        let state = binding.state.clone();
        let nonce = binding.nonce.clone();
        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                move || CsrfToken::new(state),
                move || Nonce::new(nonce),
            )
            .set_pkce_challenge(pkce_challenge);

        // openid is always requested by the flow itself
        for scope in self.config.scopes() {
            if scope != "openid" {
                auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
            }
        }

        let (auth_url, _, _) = auth_request.url();
        auth_url.to_string()
    }

    #[instrument(skip_all)]
    async fn exchange(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<OAuthToken, Report<OidcError>> {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let token_request = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| OidcError::ExchangeFailed {
                reason: format!("token endpoint error: {e}"),
            })?;

        let token_response = token_request
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| OidcError::ExchangeFailed {
                reason: format!("token exchange failed: {e}"),
            })?;

        Ok(OAuthToken {
            access_token: token_response.access_token().secret().clone(),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
            id_token: token_response.id_token().map(ToString::to_string),
        })
    }

    #[instrument(skip_all)]
    async fn verify_id_token(
        &self,
        raw: &str,
        nonce: &str,
    ) -> Result<IdToken, Report<OidcError>> {
        let id_token: CoreIdToken = serde_json::from_value(Value::String(raw.to_string()))
            .map_err(|e| OidcError::IdTokenInvalid {
                reason: format!("malformed ID token: {e}"),
            })?;

        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        );

        let expected_nonce = Nonce::new(nonce.to_string());
        id_token
            .claims(&client.id_token_verifier(), &expected_nonce)
            .map_err(|e| OidcError::IdTokenInvalid {
                reason: e.to_string(),
            })?;

        IdToken::from_claims(decode_payload(raw)?)
    }

    fn user_info(
        &self,
        _token: &OAuthToken,
        id_token: &IdToken,
    ) -> Result<UserInfo, Report<OidcError>> {
        UserInfo::from_claims(id_token.claims(), self.config.roles_claim())
    }
}

/// Decodes the payload segment of a compact JWT without verifying it.
///
/// Custom claims such as nested role arrays are not exposed by the typed
/// ID token, so they are read from the raw payload after verification.
fn decode_payload(raw: &str) -> Result<Map<String, Value>, Report<OidcError>> {
    let parse_failed = |reason: String| OidcError::ClaimsParseFailed { reason };

    let mut parts = raw.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(parse_failed("ID token is not a compact JWT".to_string()).into());
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| parse_failed(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| parse_failed(format!("payload is not a JSON object: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use openidconnect::core::{
        CoreIdTokenClaims, CoreJsonWebKeySet, CoreJwsSigningAlgorithm, CoreResponseType,
        CoreRsaPrivateSigningKey, CoreSubjectIdentifierType,
    };
    use openidconnect::{
        Audience, AuthUrl, EmptyAdditionalClaims, EmptyAdditionalProviderMetadata, JsonWebKeyId,
        JsonWebKeySetUrl, PrivateSigningKey, ResponseTypes, StandardClaims, SubjectIdentifier,
    };

    const ISSUER: &str = "https://sso.example.com";
    const CLIENT_ID: &str = "waymark";
    const SIGNING_KEY_PEM: &str = include_str!("testdata/id_token_signing_key.pem");

    fn signing_key() -> CoreRsaPrivateSigningKey {
        CoreRsaPrivateSigningKey::from_pem(
            SIGNING_KEY_PEM,
            Some(JsonWebKeyId::new("test-key".to_string())),
        )
        .expect("pem")
    }

    /// A client whose provider metadata publishes `key` without discovery.
    fn local_client(key: &CoreRsaPrivateSigningKey) -> OidcClient {
        let provider_metadata = CoreProviderMetadata::new(
            IssuerUrl::new(ISSUER.to_string()).expect("issuer"),
            AuthUrl::new(format!("{ISSUER}/authorize")).expect("auth url"),
            JsonWebKeySetUrl::new(format!("{ISSUER}/jwks")).expect("jwks url"),
            vec![ResponseTypes::new(vec![CoreResponseType::Code])],
            vec![CoreSubjectIdentifierType::Public],
            vec![CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256],
            EmptyAdditionalProviderMetadata {},
        )
        .set_jwks(CoreJsonWebKeySet::new(vec![key.as_verification_key()]));

        let config = OpenIdConfig::builder(
            ISSUER,
            CLIENT_ID,
            "s3cret",
            "https://waymark.example.com/auth/openid/callback",
        )
        .build();

        OidcClient {
            provider_metadata,
            client_id: ClientId::new(CLIENT_ID.to_string()),
            client_secret: ClientSecret::new("s3cret".to_string()),
            redirect_url: RedirectUrl::new(config.redirect_url().to_string()).expect("redirect"),
            http_client: reqwest::Client::new(),
            config,
        }
    }

    struct Signed<'a> {
        issuer: &'a str,
        audience: &'a str,
        nonce: &'a str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    }

    impl Default for Signed<'_> {
        fn default() -> Self {
            let now = Utc::now();
            Self {
                issuer: ISSUER,
                audience: CLIENT_ID,
                nonce: "nonce-1",
                issued_at: now,
                expires_at: now + Duration::minutes(5),
            }
        }
    }

    impl Signed<'_> {
        fn sign(&self, key: &CoreRsaPrivateSigningKey) -> String {
            let claims = CoreIdTokenClaims::new(
                IssuerUrl::new(self.issuer.to_string()).expect("issuer"),
                vec![Audience::new(self.audience.to_string())],
                self.expires_at,
                self.issued_at,
                StandardClaims::new(SubjectIdentifier::new("sub-1".to_string())),
                EmptyAdditionalClaims {},
            )
            .set_nonce(Some(Nonce::new(self.nonce.to_string())));

            CoreIdToken::new(
                claims,
                key,
                CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256,
                None,
                None,
            )
            .expect("sign")
            .to_string()
        }
    }

    fn is_invalid(err: &Report<OidcError>) -> bool {
        matches!(err.current_context(), OidcError::IdTokenInvalid { .. })
    }

    #[tokio::test]
    async fn signed_id_token_verifies() {
        let key = signing_key();
        let client = local_client(&key);
        let raw = Signed::default().sign(&key);

        let token = client.verify_id_token(&raw, "nonce-1").await.expect("verify");

        assert_eq!(token.subject(), "sub-1");
        assert_eq!(token.claims()["nonce"], "nonce-1");
    }

    #[tokio::test]
    async fn wrong_nonce_is_rejected() {
        let key = signing_key();
        let client = local_client(&key);
        let raw = Signed::default().sign(&key);

        let err = client.verify_id_token(&raw, "nonce-2").await.unwrap_err();

        assert!(is_invalid(&err));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let key = signing_key();
        let client = local_client(&key);
        let raw = Signed {
            audience: "another-client",
            ..Signed::default()
        }
        .sign(&key);

        let err = client.verify_id_token(&raw, "nonce-1").await.unwrap_err();

        assert!(is_invalid(&err));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let key = signing_key();
        let client = local_client(&key);
        let raw = Signed {
            issuer: "https://evil.example.com",
            ..Signed::default()
        }
        .sign(&key);

        let err = client.verify_id_token(&raw, "nonce-1").await.unwrap_err();

        assert!(is_invalid(&err));
    }

    #[tokio::test]
    async fn expired_id_token_is_rejected() {
        let key = signing_key();
        let client = local_client(&key);
        let now = Utc::now();
        let raw = Signed {
            issued_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
            ..Signed::default()
        }
        .sign(&key);

        let err = client.verify_id_token(&raw, "nonce-1").await.unwrap_err();

        assert!(is_invalid(&err));
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected() {
        let key = signing_key();
        let client = local_client(&key);
        let raw = Signed::default().sign(&key);
        let mut parts: Vec<&str> = raw.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            json!({
                "iss": ISSUER,
                "aud": CLIENT_ID,
                "sub": "admin",
                "nonce": "nonce-1",
                "iat": Utc::now().timestamp(),
                "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
            })
            .to_string(),
        );
        parts[1] = &forged;

        let err = client
            .verify_id_token(&parts.join("."), "nonce-1")
            .await
            .unwrap_err();

        assert!(is_invalid(&err));
    }

    #[test]
    fn auth_url_carries_state_nonce_and_pkce_challenge() {
        let key = signing_key();
        let client = local_client(&key);
        let binding = LoginBinding::generate();

        let url = client.auth_url(&binding);

        let expected_challenge = PkceCodeChallenge::from_code_verifier_sha256(
            &PkceCodeVerifier::new(binding.pkce_verifier.clone()),
        );
        assert!(url.contains(&format!("state={}", binding.state)));
        assert!(url.contains(&format!("nonce={}", binding.nonce)));
        assert!(url.contains(&format!(
            "code_challenge={}",
            expected_challenge.as_str()
        )));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(!url.contains(&binding.pkce_verifier));
    }

    #[test]
    fn binding_round_trips_through_cookie_value() {
        let binding = LoginBinding::generate();

        let encoded = binding.encode();

        assert!(!encoded.contains('=') && !encoded.contains(';'));
        assert_eq!(LoginBinding::decode(&encoded), Some(binding));
        assert_eq!(LoginBinding::decode("not a binding"), None);
    }

    #[test]
    fn bindings_are_independent_values() {
        let binding = LoginBinding::generate();

        assert_ne!(binding.state, binding.nonce);
        assert_ne!(binding.nonce, binding.pkce_verifier);
        assert!(!format!("{binding:?}").contains(&binding.pkce_verifier));
    }

    fn compact(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2ln")
    }

    #[test]
    fn payload_decodes_custom_claims() {
        let raw = compact(&json!({"sub": "u1", "realm_access": {"roles": ["admin"]}}));

        let claims = decode_payload(&raw).expect("decode");
        let token = IdToken::from_claims(claims).expect("token");

        assert_eq!(token.subject(), "u1");
        assert_eq!(
            token.claims()["realm_access"]["roles"],
            json!(["admin"])
        );
    }

    #[test]
    fn payload_rejects_non_jwt() {
        for raw in ["abc", "a.b", "a.b.c.d", "a.!!!.c"] {
            let err = decode_payload(raw).unwrap_err();
            assert!(matches!(
                err.current_context(),
                OidcError::ClaimsParseFailed { .. }
            ));
        }
    }

    #[test]
    fn id_token_requires_subject() {
        let err = IdToken::from_claims(Map::new()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            OidcError::ClaimsParseFailed { .. }
        ));
    }

    #[test]
    fn oauth_token_debug_hides_secrets() {
        let token = OAuthToken {
            access_token: "access-secret".to_string(),
            refresh_token: None,
            id_token: Some("id-secret".to_string()),
        };
        let debug = format!("{token:?}");
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("id-secret"));
    }
}
