//! SQLite-backed user store.
//!
//! Tables:
//! - `users`: id, username, email, password_hash, created_at
//!
//! `password_hash` holds the credential string produced by
//! [`credential::encode`] verbatim; the store never interprets it.

use crate::auth::credential::{self, CredentialError, CredentialParams};
use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Stored credential string (`iterations$salt$key`).
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Registration input, already validated by the caller.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Username or email is already registered.
    #[error("username or email already exists")]
    Duplicate,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// SQLite-backed user store.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open (or create) the user database at the given path.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database dir: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user DB: {}", db_path.display()))?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;",
        )?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Volatile store, used by tests and throwaway runs.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> anyhow::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                username      TEXT NOT NULL UNIQUE,
                email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at    INTEGER NOT NULL
            );",
        )
        .context("Failed to initialize users table")?;
        Ok(())
    }

    // ── User Management ─────────────────────────────────────────────

    /// Register a new user.
    ///
    /// Derives the credential before taking the connection lock; the row
    /// is written by a single INSERT once the credential string exists.
    pub fn create_user(
        &self,
        new_user: &NewUser,
        cost: &CredentialParams,
    ) -> Result<User, StoreError> {
        let password_hash = credential::encode(&new_user.password, cost)?;
        let created_at = Utc::now();

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                new_user.username,
                new_user.email,
                password_hash,
                created_at.timestamp()
            ],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                tracing::info!(user_id = id, username = %new_user.username, "user registered");
                Ok(User {
                    id,
                    username: new_user.username.clone(),
                    email: new_user.email.clone(),
                    password_hash,
                    // Round to what the column stores so reads agree.
                    created_at: from_epoch(created_at.timestamp()),
                })
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by ID.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        self.find_one("id = ?1", params![user_id])
    }

    /// Look up a user by exact username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("username = ?1", params![username])
    }

    /// Look up a user by email (case-insensitive).
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email = ?1", params![email])
    }

    /// Number of registered users.
    pub fn user_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn find_one(
        &self,
        predicate: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE {predicate}"
        );
        let user = conn
            .query_row(&sql, args, |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                    created_at: from_epoch(row.get(4)?),
                })
            })
            .optional()?;
        Ok(user)
    }
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

// ── Tests ───────────────────────────────────────────────────────────
