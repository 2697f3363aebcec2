//! Anti-forgery `state` token binding an authorization request to its callback

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

/// Minimum number of random bytes behind a state token
pub const MIN_STATE_BYTES: usize = 32;

/// Opaque, unguessable correlation token for one login attempt.
///
/// Random bytes come straight from the operating system CSPRNG and are
/// base64url encoded so the value can travel in a query string untouched.
/// `Debug` is redacted so the value never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct CorrelationState(String);

impl CorrelationState {
    /// Generate a state token backed by [`MIN_STATE_BYTES`] random bytes
    pub fn generate() -> Self {
        Self::with_strength(MIN_STATE_BYTES)
    }

    /// Generate a state token backed by `bytes` random bytes (at least 32).
    ///
    /// Panics if the OS random source is unavailable.
    pub fn with_strength(bytes: usize) -> Self {
        let mut random = vec![0u8; bytes.max(MIN_STATE_BYTES)];
        OsRng.fill_bytes(&mut random);
        Self(URL_SAFE_NO_PAD.encode(&random))
    }

    /// Encoded value, for building the authorization URL
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a callback's reported state is exactly this one.
    ///
    /// Runs in time independent of where the first mismatch is.
    pub fn matches(&self, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        let (expected, candidate) = (self.0.as_bytes(), candidate.as_bytes());
        if expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for CorrelationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CorrelationState(<redacted>)")
    }
}
