//! Shared-secret session gate.
//!
//! A single password unlocks the whole share. Submitting it sets a session
//! cookie whose value is derived from the password and a salt drawn at
//! startup, so sessions do not survive a restart and the cookie never
//! carries the password itself.

use axum::http::header::{HeaderMap, COOKIE};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Authorization predicate consulted before every path-bearing request.
#[derive(Clone)]
pub struct SessionGate {
    /// SHA-256 of the configured password.
    password_digest: [u8; 32],
    /// Hex session token issued on successful login.
    token: String,
    /// Name of the session cookie.
    cookie_name: String,
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl SessionGate {
    /// Create a gate for `password`, issuing cookies named `cookie_name`.
    pub fn new(password: &str, cookie_name: impl Into<String>) -> Self {
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        let token = hex::encode(hasher.finalize());

        Self {
            password_digest: Sha256::digest(password.as_bytes()).into(),
            token,
            cookie_name: cookie_name.into(),
        }
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Check a submitted password.
    pub fn verify_password(&self, candidate: &str) -> bool {
        let digest: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        constant_time_eq(&digest, &self.password_digest)
    }

    /// Whether the request carries a valid session cookie.
    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.cookie_name)
            .any(|(_, value)| constant_time_eq(value.as_bytes(), self.token.as_bytes()))
    }

    /// `Set-Cookie` value that opens a session.
    pub fn login_cookie(&self) -> String {
        format!(
            "{}={}; HttpOnly; Path=/; SameSite=Lax",
            self.cookie_name, self.token
        )
    }

    /// `Set-Cookie` value that ends a session.
    pub fn logout_cookie(&self) -> String {
        format!("{}=; Max-Age=0; HttpOnly; Path=/; SameSite=Lax", self.cookie_name)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
