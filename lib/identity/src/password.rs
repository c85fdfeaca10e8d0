//! Argon2id password hashing.
//!
//! Hashing is CPU-bound; the async wrappers move it onto the blocking pool so
//! request workers are not stalled.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rootcause::prelude::Report;

use crate::error::PasswordError;

/// Hashes and verifies passwords as PHC strings.
///
/// Digests embed their own parameters, so verification keeps working after
/// the cost is raised.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Creates a hasher with the argon2 crate's recommended cost.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hasher with explicit cost parameters.
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, Report<PasswordError>> {
        let params = Params::new(memory_kib, iterations, parallelism, None).map_err(|e| {
            PasswordError::Hash {
                reason: format!("invalid argon2 parameters: {e}"),
            }
        })?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `plaintext` under a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, Report<PasswordError>> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash {
                reason: e.to_string(),
            })?;
        Ok(digest.to_string())
    }

    /// Checks `plaintext` against a stored digest in constant time.
    ///
    /// A mismatch is `Ok(false)`; a digest that cannot be parsed is an error.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, Report<PasswordError>> {
        let parsed = PasswordHash::new(digest).map_err(|e| PasswordError::Hash {
            reason: format!("malformed digest: {e}"),
        })?;
        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Hash {
                reason: e.to_string(),
            }
            .into()),
        }
    }

    /// [`Self::hash`] on the blocking pool.
    pub async fn hash_async(&self, plaintext: &str) -> Result<String, Report<PasswordError>> {
        let hasher = self.clone();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| PasswordError::Hash {
                reason: format!("hashing task failed: {e}"),
            })?
    }

    /// [`Self::verify`] on the blocking pool.
    pub async fn verify_async(
        &self,
        plaintext: &str,
        digest: &str,
    ) -> Result<bool, Report<PasswordError>> {
        let hasher = self.clone();
        let plaintext = plaintext.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(|e| PasswordError::Hash {
                reason: format!("verification task failed: {e}"),
            })?
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::with_params(8, 1, 1).expect("valid test params")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = cheap_hasher();
        let digest = hasher.hash("hunter2").expect("hash");

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("hunter2", &digest).expect("verify"));
        assert!(!hasher.verify("hunter3", &digest).expect("verify"));
    }

    #[test]
    fn salts_differ() {
        let hasher = cheap_hasher();
        let a = hasher.hash("same").expect("hash");
        let b = hasher.hash("same").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_digest_is_an_error() {
        let hasher = cheap_hasher();
        let err = hasher.verify("pw", "not-a-phc-string").unwrap_err();
        assert!(matches!(err.current_context(), PasswordError::Hash { .. }));
    }

    #[test]
    fn digest_carries_its_own_cost() {
        let digest = cheap_hasher().hash("pw").expect("hash");
        assert!(PasswordHasher::new().verify("pw", &digest).expect("verify"));
    }

    #[test]
    fn invalid_params_rejected() {
        let err = PasswordHasher::with_params(0, 0, 0).unwrap_err();
        assert!(matches!(err.current_context(), PasswordError::Hash { .. }));
    }

    #[tokio::test]
    async fn async_wrappers_agree() {
        let hasher = cheap_hasher();
        let digest = hasher.hash_async("pw").await.expect("hash");
        assert!(hasher.verify_async("pw", &digest).await.expect("verify"));
    }
}
