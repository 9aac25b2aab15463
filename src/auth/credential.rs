//! Password credential codec.
//!
//! Turns a plain-text password into a self-describing stored string
//! and verifies candidates against it:
//!
//! ```text
//! {iterations}${salt_b64}${derived_key_b64}
//! ```
//!
//! - PBKDF2-HMAC-SHA256, 32-byte derived key, 16-byte random salt
//! - standard base64 (padded, no line wrapping) for salt and key
//! - the iteration count travels with the record, so raising
//!   [`DEFAULT_ITERATIONS`] never breaks verification of older records
//!
//! Verification fails closed: a stored string that does not parse is a
//! mismatch, never an error.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Default PBKDF2 cost for newly encoded credentials.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Salt byte length for new credentials.
pub const SALT_LEN: usize = 16;

/// Derived key length (SHA-256 output size).
pub const KEY_LEN: usize = 32;

const DELIMITER: char = '$';

// ── Errors ──────────────────────────────────────────────────────

/// Failure while producing a new credential.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The OS random source could not supply salt bytes.
    #[error("system entropy source unavailable: {0}")]
    Entropy(getrandom::Error),
}

/// Why a stored credential string could not be parsed.
///
/// Messages describe the failing field only; they never echo input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedCredential {
    #[error("expected 3 '$'-separated fields, found {0}")]
    FieldCount(usize),
    #[error("iteration count is not a positive integer")]
    Iterations,
    #[error("salt is not valid base64")]
    Salt,
    #[error("derived key is not valid base64")]
    DerivedKey,
}

// ── Parameters ──────────────────────────────────────────────────

/// Cost parameters applied when encoding a new credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialParams {
    /// PBKDF2 rounds.
    #[serde(default = "default_iterations")]
    pub iterations: NonZeroU32,
}

fn default_iterations() -> NonZeroU32 {
    NonZeroU32::new(DEFAULT_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

impl CredentialParams {
    pub fn with_iterations(iterations: NonZeroU32) -> Self {
        Self { iterations }
    }
}

impl Default for CredentialParams {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
        }
    }
}

// ── Record ──────────────────────────────────────────────────────

/// Parsed form of a stored credential string.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub iterations: NonZeroU32,
    pub salt: Vec<u8>,
    pub derived_key: Vec<u8>,
}

impl CredentialRecord {
    /// Derive a fresh record for `password` using a new random salt.
    pub fn derive(password: &str, params: &CredentialParams) -> Result<Self, CredentialError> {
        let mut salt = vec![0u8; SALT_LEN];
        getrandom::fill(&mut salt).map_err(CredentialError::Entropy)?;
        let derived_key = derive_key(password, &salt, params.iterations);
        Ok(Self {
            iterations: params.iterations,
            salt,
            derived_key,
        })
    }

    /// Re-derive with this record's iteration count and salt and compare
    /// against the stored key in constant time.
    pub fn matches(&self, password: &str) -> bool {
        let candidate = derive_key(password, &self.salt, self.iterations);
        // Length mismatch yields 0 without inspecting contents.
        candidate.as_slice().ct_eq(self.derived_key.as_slice()).into()
    }
}

impl FromStr for CredentialRecord {
    type Err = MalformedCredential;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(DELIMITER).collect();
        let [iterations, salt, derived_key] = fields.as_slice() else {
            return Err(MalformedCredential::FieldCount(fields.len()));
        };

        let iterations = iterations
            .parse::<NonZeroU32>()
            .map_err(|_| MalformedCredential::Iterations)?;
        let salt = STANDARD
            .decode(salt)
            .map_err(|_| MalformedCredential::Salt)?;
        let derived_key = STANDARD
            .decode(derived_key)
            .map_err(|_| MalformedCredential::DerivedKey)?;

        Ok(Self {
            iterations,
            salt,
            derived_key,
        })
    }
}

impl fmt::Display for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.iterations,
            STANDARD.encode(&self.salt),
            STANDARD.encode(&self.derived_key)
        )
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("iterations", &self.iterations)
            .field("salt", &"<redacted>")
            .field("derived_key", &"<redacted>")
            .finish()
    }
}

// ── Public operations ───────────────────────────────────────────

/// Encode `password` into a storable credential string.
pub fn encode(password: &str, params: &CredentialParams) -> Result<String, CredentialError> {
    CredentialRecord::derive(password, params).map(|record| record.to_string())
}

/// Check `password` against a stored credential string.
///
/// Returns `false` for a wrong password and for any stored string that
/// does not parse; callers cannot tell the two apart.
pub fn verify(password: &str, stored: &str) -> bool {
    match stored.parse::<CredentialRecord>() {
        Ok(record) => record.matches(password),
        Err(reason) => {
            tracing::debug!(%reason, "stored credential rejected");
            false
        }
    }
}

/// Whether a stored credential should be re-encoded under `params`.
pub fn needs_rehash(stored: &str, params: &CredentialParams) -> bool {
    match stored.parse::<CredentialRecord>() {
        Ok(record) => record.iterations < params.iterations,
        Err(_) => true,
    }
}

fn derive_key(password: &str, salt: &[u8], iterations: NonZeroU32) -> Vec<u8> {
    let mut key = vec![0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations.get(), &mut key);
    key
}

// ── Tests ───────────────────────────────────────────────────────
