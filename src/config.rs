//! Configuration management for NextUp.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DEV_MODE` - Optional. Skip JWT checks and take the user from `X-User-Id`. Defaults to `false`.
//! - `JWT_SECRET` - Required unless `DEV_MODE=true`. Secret for signing session tokens.
//! - `DASHBOARD_PASSWORD` - Optional. Password accepted by `/api/auth/login`.
//! - `JWT_TTL_DAYS` - Optional. Token lifetime. Defaults to `30`.
//! - `STORE_BACKEND` - Optional. `sqlite` or `memory`. Defaults to `sqlite`.
//! - `DATA_DIR` - Optional. Directory for the SQLite database. Defaults to `./data`.
//! - `RANKER` - Optional. `llm` or `heuristic`. Defaults to `llm` when an API key is set.
//! - `OPENROUTER_API_KEY` - Optional. Enables the LLM ranker.
//! - `LLM_API_URL` - Optional. Chat completions endpoint. Defaults to OpenRouter.
//! - `DEFAULT_MODEL` - Optional. Model used for ranking. Defaults to `google/gemini-2.0-flash-001`.
//! - `LLM_MAX_RETRIES` - Optional. Retries for transient LLM errors. Defaults to `2`.
//! - `RANKING_TIMEOUT_SECS` - Optional. Upper bound on one ranking call. Defaults to `60`.
//! - `REORDER_STRICT_COMMIT` - Optional. Reject a commit if tasks changed meanwhile. Defaults to `false`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::llm::OPENROUTER_API_URL;

pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Where tasks are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'sqlite' or 'memory', got '{}'", other)),
        }
    }
}

/// Which ranking capability backs the prioritizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankerKind {
    Llm,
    Heuristic,
}

impl FromStr for RankerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(format!("expected 'llm' or 'heuristic', got '{}'", other)),
        }
    }
}

/// Session auth settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub dashboard_password: Option<String>,
    pub jwt_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            dashboard_password: None,
            jwt_ttl_days: 30,
        }
    }
}

impl AuthConfig {
    /// Auth is enforced everywhere except dev mode.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }
}

/// LLM ranking backend settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: OPENROUTER_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_retries: 2,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Disable auth and accept `X-User-Id`
    pub dev_mode: bool,

    pub auth: AuthConfig,

    pub store_backend: StoreBackend,

    /// Directory for persistent data
    pub data_dir: PathBuf,

    pub ranker: RankerKind,

    pub llm: LlmConfig,

    /// Upper bound on one ranking call
    pub ranking_timeout: Duration,

    /// Condition order commits on the snapshot revision
    pub strict_commit: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `JWT_SECRET` is unset outside
    /// dev mode or `RANKER=llm` is set without `OPENROUTER_API_KEY`, and
    /// `ConfigError::InvalidValue` for values that do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&var, "PORT", 3000u16)?;
        let dev_mode = parse_bool(&var, "DEV_MODE", false)?;

        let auth = AuthConfig {
            jwt_secret: var("JWT_SECRET"),
            dashboard_password: var("DASHBOARD_PASSWORD"),
            jwt_ttl_days: parse_or(&var, "JWT_TTL_DAYS", 30i64)?,
        };
        if auth.auth_required(dev_mode) && auth.jwt_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let store_backend = parse_or(&var, "STORE_BACKEND", StoreBackend::Sqlite)?;
        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let llm = LlmConfig {
            api_key: var("OPENROUTER_API_KEY"),
            api_url: var("LLM_API_URL").unwrap_or_else(|| OPENROUTER_API_URL.to_string()),
            model: var("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_retries: parse_or(&var, "LLM_MAX_RETRIES", 2u32)?,
        };

        let default_ranker = if llm.api_key.is_some() {
            RankerKind::Llm
        } else {
            RankerKind::Heuristic
        };
        let ranker = parse_or(&var, "RANKER", default_ranker)?;
        if ranker == RankerKind::Llm && llm.api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()));
        }

        let timeout_secs: u64 = parse_or(&var, "RANKING_TIMEOUT_SECS", 60u64)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "RANKING_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            dev_mode,
            auth,
            store_backend,
            data_dir,
            ranker,
            llm,
            ranking_timeout: Duration::from_secs(timeout_secs),
            strict_commit: parse_bool(&var, "REORDER_STRICT_COMMIT", false)?,
        })
    }

    /// Create a config with custom values (useful for testing).
    ///
    /// Dev mode, in-memory store, heuristic ranker.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: true,
            auth: AuthConfig::default(),
            store_backend: StoreBackend::Memory,
            data_dir,
            ranker: RankerKind::Heuristic,
            llm: LlmConfig::default(),
            ranking_timeout: Duration::from_secs(60),
            strict_commit: false,
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool<F>(var: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue(key.to_string(), v)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn dev_mode_defaults() {
        let config = load(&[("DEV_MODE", "true")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.ranker, RankerKind::Heuristic);
        assert_eq!(config.ranking_timeout, Duration::from_secs(60));
        assert!(!config.strict_commit);
    }

    #[test]
    fn jwt_secret_required_outside_dev_mode() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingEnvVar(key)) if key == "JWT_SECRET"
        ));
        assert!(load(&[("JWT_SECRET", "s3cret")]).is_ok());
    }

    #[test]
    fn api_key_selects_llm_ranker() {
        let config = load(&[("DEV_MODE", "1"), ("OPENROUTER_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.ranker, RankerKind::Llm);
        assert_eq!(config.llm.model, DEFAULT_MODEL);

        let config = load(&[
            ("DEV_MODE", "1"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("RANKER", "heuristic"),
        ])
        .unwrap();
        assert_eq!(config.ranker, RankerKind::Heuristic);
    }

    #[test]
    fn llm_ranker_without_key_is_rejected() {
        assert!(matches!(
            load(&[("DEV_MODE", "1"), ("RANKER", "llm")]),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[("DEV_MODE", "1"), ("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        let err = load(&[("DEV_MODE", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("DEV_MODE"));
        let err = load(&[("DEV_MODE", "1"), ("STORE_BACKEND", "postgres")]).unwrap_err();
        assert!(err.to_string().contains("STORE_BACKEND"));
        let err = load(&[("DEV_MODE", "1"), ("RANKING_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("RANKING_TIMEOUT_SECS"));
    }
}
