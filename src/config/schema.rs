use crate::auth::CredentialParams;
use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "SECURE_USER_API_";

const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "users.db";

/// Top-level service configuration (`config.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub credentials: CredentialParams,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the `users` table.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = project_dirs()
            .map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME));
        Self { path }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on key derivations running at once.
    pub max_concurrent_hashes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            max_concurrent_hashes: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "secure-user-api", "secure-user-api")
}

/// Default location of `config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// read when present and built-in defaults are used otherwise.
    /// Environment overrides are applied last.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// File that [`Config::load`] reads, or `None` when defaults apply.
    pub fn locate(explicit_path: Option<&Path>) -> Option<PathBuf> {
        match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        }
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Apply `SECURE_USER_API_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(host) = var("HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = var("PORT") {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("Invalid {ENV_PREFIX}PORT: {port}"))?;
        }
        if let Some(iterations) = var("HASH_ITERATIONS") {
            let iterations: NonZeroU32 = iterations.parse().with_context(|| {
                format!("Invalid {ENV_PREFIX}HASH_ITERATIONS: {iterations} (must be > 0)")
            })?;
            self.credentials = CredentialParams::with_iterations(iterations);
        }
        if let Some(level) = var("LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            bail!("[database] path must not be empty");
        }
        if self.gateway.max_concurrent_hashes == 0 {
            bail!("[gateway] max_concurrent_hashes must be at least 1");
        }
        if self.gateway.host.trim().is_empty() {
            bail!("[gateway] host must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8000);
        assert!(config.gateway.max_concurrent_hashes >= 1);
        assert_eq!(config.credentials.iterations.get(), 100_000);
        assert_eq!(config.logging.level, "info");
        assert!(config.database.path.ends_with(DB_FILE_NAME));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            port = 9100

            [credentials]
            iterations = 250000
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.credentials.iterations.get(), 250_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_iterations_rejected_at_parse() {
        let result: std::result::Result<Config, _> = toml::from_str("[credentials]\niterations = 0");
        assert!(result.is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[database]\npath = \"/tmp/users-test.db\"\n[gateway]\nhost = \"0.0.0.0\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/users-test.db"));
        assert_eq!(config.gateway.host, "0.0.0.0");
    }

    #[test]
    fn locate_prefers_explicit_path() {
        let explicit = PathBuf::from("/nonexistent/custom.toml");
        assert_eq!(Config::locate(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn load_fails_for_missing_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(Some(&tmp.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn load_fails_for_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("DATABASE_PATH", "/srv/users.db"),
                ("HOST", "0.0.0.0"),
                ("PORT", "8080"),
                ("HASH_ITERATIONS", "310000"),
                ("LOG", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/srv/users.db"));
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.credentials.iterations.get(), 310_000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("HOST", "   ")])).unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn invalid_env_values_are_errors() {
        let mut config = Config::default();
        assert!(config.apply_env_overrides(env(&[("PORT", "eighty")])).is_err());
        assert!(config
            .apply_env_overrides(env(&[("HASH_ITERATIONS", "0")]))
            .is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.gateway.max_concurrent_hashes = 0;
        assert!(config.validate().is_err());
    }
}
