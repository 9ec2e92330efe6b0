//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use crate::adapters::gemini_llm::DEFAULT_API_BASE as DEFAULT_GEMINI_API_BASE;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which text generation backend the pipeline talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(format!("'{}' is not a supported provider (gemini, openai)", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub llm_provider: LlmProvider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub generation_max_attempts: u32,
    pub generation_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Text Generation Settings ---
        let llm_provider = parse_var("LLM_PROVIDER", var_or("LLM_PROVIDER", "gemini"))?;
        let gemini_api_key = lookup("GEMINI_API_KEY");
        let gemini_model = var_or("GEMINI_MODEL", "gemini-1.5-flash");
        let gemini_api_base = var_or("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE);
        let openai_api_key = lookup("OPENAI_API_KEY");
        let openai_model = var_or("OPENAI_MODEL", "gpt-4o-mini");

        let generation_max_attempts: u32 =
            parse_var("GENERATION_MAX_ATTEMPTS", var_or("GENERATION_MAX_ATTEMPTS", "3"))?;
        if generation_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "GENERATION_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let timeout_secs: u64 =
            parse_var("GENERATION_TIMEOUT_SECS", var_or("GENERATION_TIMEOUT_SECS", "60"))?;

        // The selected provider must have a key.
        match llm_provider {
            LlmProvider::Gemini if gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar("GEMINI_API_KEY".to_string()))
            }
            LlmProvider::OpenAi if openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
            }
            _ => {}
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            llm_provider,
            gemini_api_key,
            gemini_model,
            gemini_api_base,
            openai_api_key,
            openai_model,
            generation_max_attempts,
            generation_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<T>(key: &str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/notes"), ("GEMINI_API_KEY", "k")])
            .unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.llm_provider, LlmProvider::Gemini);
        assert_eq!(config.gemini_model, "gemini-1.5-flash");
        assert_eq!(config.generation_max_attempts, 3);
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = load(&[("GEMINI_API_KEY", "k")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn selected_provider_needs_its_key() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/notes"),
            ("LLM_PROVIDER", "openai"),
            ("GEMINI_API_KEY", "k"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "OPENAI_API_KEY"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let base = [("DATABASE_URL", "postgres://localhost/notes"), ("GEMINI_API_KEY", "k")];
        for (key, value) in [
            ("BIND_ADDRESS", "nowhere"),
            ("RUST_LOG", "loud"),
            ("LLM_PROVIDER", "llama"),
            ("GENERATION_MAX_ATTEMPTS", "0"),
            ("GENERATION_TIMEOUT_SECS", "soon"),
        ] {
            let mut vars = base.to_vec();
            vars.push((key, value));
            let err = load(&vars).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue(ref v, _) if v == key),
                "{} should be rejected",
                key
            );
        }
    }
}
