//! Staff credentials: Argon2 password hashes and opaque session tokens.
//!
//! A session token is handed to the client exactly once; the server keeps only
//! its SHA-256 digest in `session_token.session_token_hash`.

use argon2::password_hash::{self, SaltString, rand_core::OsRng as SaltRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::error::ApiError;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("argon2 hash error: {0}")]
    Hash(password_hash::Error),
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// PHC string for `users.password_hash`.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(CredentialError::Hash)
}

/// A stored hash that does not parse never matches.
pub fn password_matches(password: &str, stored_phc: &str) -> bool {
    PasswordHash::new(stored_phc).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    /// Returned to the client as `access_token`.
    pub bearer: String,
    /// Persisted instead of the bearer.
    pub digest: String,
}

impl SessionToken {
    pub fn issue() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let bearer = URL_SAFE_NO_PAD.encode(bytes);
        let digest = Self::digest_of(&bearer);
        SessionToken { bearer, digest }
    }

    /// Digest used to look up the session behind an `Authorization` header.
    pub fn digest_of(bearer: &str) -> String {
        hex::encode(Sha256::digest(bearer.as_bytes()))
    }
}
