//! Profile extraction from ID token claims.

use rootcause::prelude::Report;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::OidcError;

/// Profile of a federated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub subject: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
    /// `None` when no roles claim is configured or the path is absent;
    /// `Some(vec![])` when the claim is present but empty.
    pub roles: Option<Vec<String>>,
}

impl UserInfo {
    /// Reads the profile out of ID token claims.
    ///
    /// Only `sub` is required. When `given_name` and `family_name` are both
    /// missing, `name` is split on its first space.
    pub fn from_claims(
        claims: &Map<String, Value>,
        roles_claim: Option<&str>,
    ) -> Result<Self, Report<OidcError>> {
        let subject = string_claim(claims, "sub");
        if subject.is_empty() {
            return Err(OidcError::ClaimsParseFailed {
                reason: "missing sub claim".to_string(),
            }
            .into());
        }

        let name = string_claim(claims, "name");
        let mut first_name = string_claim(claims, "given_name");
        let mut last_name = string_claim(claims, "family_name");
        if first_name.is_empty() && last_name.is_empty() && !name.is_empty() {
            let (first, last) = name.split_once(' ').unwrap_or((name.as_str(), ""));
            first_name = first.to_string();
            last_name = last.to_string();
        }

        Ok(Self {
            subject,
            email: string_claim(claims, "email"),
            first_name,
            last_name,
            name,
            roles: roles_claim.and_then(|path| roles_at_path(claims, path)),
        })
    }

    /// The local username: the email when present, otherwise the subject.
    #[must_use]
    pub fn username(&self) -> &str {
        if self.email.is_empty() {
            &self.subject
        } else {
            &self.email
        }
    }
}

fn string_claim(claims: &Map<String, Value>, key: &str) -> String {
    claims
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Follows a dotted path through nested objects to an array of strings.
///
/// Non-string array entries are dropped. A missing segment, a non-object
/// along the way or a non-array at the end all yield `None`.
#[must_use]
pub fn roles_at_path(claims: &Map<String, Value>, path: &str) -> Option<Vec<String>> {
    let mut segments = path.split('.');
    let mut current = claims.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    let roles = current
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    Some(roles)
}
