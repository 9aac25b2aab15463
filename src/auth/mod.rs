//! User registration and password credentials.
//!
//! Provides:
//! - Password credential codec (PBKDF2-HMAC-SHA256, 100k rounds, per-credential salt)
//! - SQLite-backed user storage with duplicate username/email detection
//!
//! ## Design Decisions
//! - The stored credential is a single self-describing string
//!   (`iterations$salt$key`), so the cost can be raised later without a
//!   schema change or breaking older records.
//! - Verification collapses every failure (wrong password, corrupted
//!   record) into `false`.

pub mod credential;
pub mod store;

pub use credential::{CredentialError, CredentialParams, CredentialRecord, MalformedCredential};
pub use store::{NewUser, StoreError, User, UserStore};
