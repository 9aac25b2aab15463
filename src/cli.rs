//! Command-line surface: `serve` plus offline credential tools.

use crate::auth::credential::{self, CredentialParams};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::num::NonZeroU32;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "secure-user-api", version, about = "User registration service")]
pub struct Cli {
    /// Path to config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Encode or check password credentials offline
    Credential {
        #[command(subcommand)]
        cmd: CredentialCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum CredentialCommands {
    /// Read a password from stdin and print its credential string
    Hash {
        /// PBKDF2 rounds (defaults to the configured cost)
        #[arg(long)]
        iterations: Option<NonZeroU32>,
    },
    /// Read a password from stdin and check it against STORED
    Verify {
        /// Stored credential string (`iterations$salt$key`)
        stored: String,
    },
}

/// Read one password line. The trailing newline is not part of the password.
pub fn read_password<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut raw = Vec::new();
    reader
        .read_until(b'\n', &mut raw)
        .context("Failed to read password from stdin")?;
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    match String::from_utf8(raw) {
        Ok(password) => Ok(password),
        Err(_) => bail!("Password is not valid UTF-8"),
    }
}

/// `credential hash`: print the encoded credential.
pub fn run_hash<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    cost: &CredentialParams,
) -> Result<()> {
    let password = read_password(input)?;
    let encoded = credential::encode(&password, cost)?;
    writeln!(output, "{encoded}")?;
    Ok(())
}

/// `credential verify`: report the outcome and return whether it matched.
pub fn run_verify<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    stored: &str,
    cost: &CredentialParams,
) -> Result<bool> {
    let password = read_password(input)?;
    let valid = credential::verify(&password, stored);
    if valid {
        writeln!(output, "valid")?;
        if credential::needs_rehash(stored, cost) {
            writeln!(
                output,
                "note: record uses fewer than the configured {} iterations; re-hash on next change",
                cost.iterations
            )?;
        }
    } else {
        writeln!(output, "invalid")?;
    }
    Ok(valid)
}
