use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_COLLECTION: &str = "cleaned";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// How the clear-before-import step obtains its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// Clear without asking (unattended runs).
    Auto,
    /// Ask the operator; append unless they confirm.
    Ask,
    /// Never clear; always append.
    Never,
    /// Not configured; decided at run time from the execution context.
    Infer,
}

/// Importer configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // MongoDB
    pub mongo_uri: String,
    pub mongo_db: String,
    pub mongo_collection: String,

    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Pipeline
    pub batch_size: usize,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub clear_mode: ClearMode,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load a `.env` file into the process environment without overriding
    /// variables that are already set. Returns the path that was loaded.
    ///
    /// An explicit `path` must load. Without one, a missing `.env` in the
    /// working directory tree is not an error.
    pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        match path {
            Some(p) => dotenvy::from_path(p)
                .map(|_| Some(p.to_path_buf()))
                .map_err(|e| env_file_error(p, &e)),
            None => match dotenvy::dotenv() {
                Ok(found) => Ok(Some(found)),
                Err(e) if e.not_found() => Ok(None),
                Err(e) => Err(env_file_error(Path::new(".env"), &e)),
            },
        }
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// All missing required keys are collected into one error so the
    /// operator sees the complete list at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &str, alias: Option<&str>| -> String {
            match get(key).or_else(|| alias.and_then(|a| get(a))) {
                Some(v) => v,
                None => {
                    missing.push(key.to_string());
                    String::new()
                }
            }
        };

        let mongo_uri = required("MONGO_URI", None);
        let mongo_db = required("MONGO_DB", Some("DB2"));
        let neo4j_uri = required("NEO4J_URI", None);
        let neo4j_user = required("NEO4J_USER", None);
        let neo4j_password = required("NEO4J_PASSWORD", None);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let batch_size: usize = parse_or("IMPORT_BATCH_SIZE", get("IMPORT_BATCH_SIZE"), DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(invalid("IMPORT_BATCH_SIZE", "0", "must be at least 1"));
        }
        let max_attempts: u32 = parse_or("IMPORT_MAX_ATTEMPTS", get("IMPORT_MAX_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(invalid("IMPORT_MAX_ATTEMPTS", "0", "must be at least 1"));
        }
        let retry_delay_secs: u64 = parse_or(
            "IMPORT_RETRY_DELAY_SECS",
            get("IMPORT_RETRY_DELAY_SECS"),
            DEFAULT_RETRY_DELAY_SECS,
        )?;

        let clear_mode = match get("IMPORT_AUTO_CLEAR") {
            None => ClearMode::Infer,
            Some(v) => match parse_bool(&v) {
                Some(true) => ClearMode::Auto,
                Some(false) => ClearMode::Ask,
                None => return Err(invalid("IMPORT_AUTO_CLEAR", &v, "expected true or false")),
            },
        };

        Ok(Self {
            mongo_uri,
            mongo_db,
            mongo_collection: get("MONGO_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            batch_size,
            max_attempts,
            retry_delay: Duration::from_secs(retry_delay_secs),
            clear_mode,
        })
    }

    /// True when the target URI addresses the compose service host `neo4j`,
    /// which only happens inside the container network.
    pub fn targets_container_host(&self) -> bool {
        self.neo4j_uri.starts_with("bolt://neo4j:") || self.neo4j_uri.starts_with("neo4j://neo4j:")
    }

    /// Log the loaded configuration without leaking secrets.
    pub fn log_redacted(&self) {
        fn preview_uri(val: &str) -> String {
            // Credentials embedded in a connection string never get printed.
            let shown = match (val.find("://"), val.rfind('@')) {
                (Some(scheme), Some(at)) if at > scheme => format!("{}://***@{}", &val[..scheme], &val[at + 1..]),
                _ => val.to_string(),
            };
            if shown.chars().count() > 30 {
                format!("{}...", shown.chars().take(30).collect::<String>())
            } else {
                shown
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  MONGO_URI: {}", preview_uri(&self.mongo_uri));
        tracing::info!("  MONGO_DB: {}", self.mongo_db);
        tracing::info!("  MONGO_COLLECTION: {}", self.mongo_collection);
        tracing::info!("  NEO4J_URI: {}", preview_uri(&self.neo4j_uri));
        tracing::info!("  NEO4J_USER: {}", self.neo4j_user);
        tracing::info!("  NEO4J_PASSWORD: ***");
        tracing::info!(
            batch_size = self.batch_size,
            max_attempts = self.max_attempts,
            retry_delay_secs = self.retry_delay.as_secs(),
            clear_mode = ?self.clear_mode,
            "  Pipeline settings"
        );
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &v, &e.to_string())),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_file_error(path: &Path, err: &dotenvy::Error) -> ConfigError {
    ConfigError::EnvFile {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> HashMap<String, String> {
        env(&[
            ("MONGO_URI", "mongodb://localhost:27017"),
            ("MONGO_DB", "polymarket"),
            ("NEO4J_URI", "bolt://localhost:7687"),
            ("NEO4J_USER", "neo4j"),
            ("NEO4J_PASSWORD", "secret"),
        ])
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_optional_keys_absent() {
        let config = load(&base()).unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_attempts, 30);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.mongo_collection, "cleaned");
        assert_eq!(config.clear_mode, ClearMode::Infer);
    }

    #[test]
    fn all_missing_keys_are_reported_together() {
        let err = load(&env(&[("MONGO_URI", "mongodb://x")])).unwrap_err();
        match err {
            ConfigError::Missing(keys) => {
                assert_eq!(keys, vec!["MONGO_DB", "NEO4J_URI", "NEO4J_USER", "NEO4J_PASSWORD"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut vars = base();
        vars.insert("NEO4J_PASSWORD".into(), "   ".into());
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing(vec!["NEO4J_PASSWORD".into()])
        );
    }

    #[test]
    fn legacy_db_alias_is_accepted() {
        let mut vars = base();
        vars.remove("MONGO_DB");
        vars.insert("DB2".into(), "legacy_db".into());
        assert_eq!(load(&vars).unwrap().mongo_db, "legacy_db");
    }

    #[test]
    fn overrides_and_clear_flag_parse() {
        let mut vars = base();
        vars.insert("IMPORT_BATCH_SIZE".into(), "25".into());
        vars.insert("IMPORT_MAX_ATTEMPTS".into(), "3".into());
        vars.insert("IMPORT_RETRY_DELAY_SECS".into(), "0".into());
        vars.insert("IMPORT_AUTO_CLEAR".into(), "yes".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::ZERO);
        assert_eq!(config.clear_mode, ClearMode::Auto);

        vars.insert("IMPORT_AUTO_CLEAR".into(), "false".into());
        assert_eq!(load(&vars).unwrap().clear_mode, ClearMode::Ask);
    }

    #[test]
    fn garbage_numbers_are_invalid() {
        let mut vars = base();
        vars.insert("IMPORT_BATCH_SIZE".into(), "lots".into());
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { key, .. }) if key == "IMPORT_BATCH_SIZE"));

        vars.insert("IMPORT_BATCH_SIZE".into(), "0".into());
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn container_host_detection() {
        let mut vars = base();
        assert!(!load(&vars).unwrap().targets_container_host());
        vars.insert("NEO4J_URI".into(), "bolt://neo4j:7687".into());
        assert!(load(&vars).unwrap().targets_container_host());
    }

    #[test]
    fn explicit_env_file_must_exist() {
        let path = std::env::temp_dir().join(format!("marketgraph-absent-{}.env", std::process::id()));
        let err = Config::load_dotenv(Some(&path)).unwrap_err();
        assert!(matches!(&err, ConfigError::EnvFile { path: p, .. } if p.contains("marketgraph-absent")));
        assert!(err.to_string().starts_with("Could not load env file"));
    }
}
