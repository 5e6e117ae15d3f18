//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file by the binaries.

use crate::error::OrchestrationError;
use crate::llm::gemini::DEFAULT_GEMINI_MODEL;
use crate::llm::DEFAULT_REASONING_TIMEOUT;
use crate::Result;
use std::env;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    pub reasoning_timeout: Duration,
    pub max_planning_rounds: u32,
    pub market_api_base_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            port: DEFAULT_PORT,
            reasoning_timeout: DEFAULT_REASONING_TIMEOUT,
            max_planning_rounds: 1,
            market_api_base_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse(&raw, "PORT")?,
            None => defaults.port,
        };

        let reasoning_timeout = match get("REASONING_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse::<u64>(&raw, "REASONING_TIMEOUT_SECS")?),
            None => defaults.reasoning_timeout,
        };

        let max_planning_rounds = match get("MAX_PLANNING_ROUNDS") {
            Some(raw) => parse::<u32>(&raw, "MAX_PLANNING_ROUNDS")?,
            None => defaults.max_planning_rounds,
        };

        if max_planning_rounds == 0 {
            return Err(OrchestrationError::ConfigError(
                "MAX_PLANNING_ROUNDS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            port,
            reasoning_timeout,
            max_planning_rounds,
            market_api_base_url: get("MARKET_API_BASE_URL"),
        })
    }
}

fn parse<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| OrchestrationError::ConfigError(format!("{} has invalid value '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.reasoning_timeout, Duration::from_secs(30));
        assert_eq!(cfg.max_planning_rounds, 1);
        assert!(cfg.gemini_api_key.is_empty());
        assert!(cfg.market_api_base_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("API_PORT", "9000"),
            ("REASONING_TIMEOUT_SECS", "5"),
            ("MAX_PLANNING_ROUNDS", "3"),
            ("GEMINI_API_KEY", " key "),
            ("MARKET_API_BASE_URL", "http://localhost:3000"),
        ])
        .unwrap();

        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.reasoning_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_planning_rounds, 3);
        assert_eq!(cfg.gemini_api_key, "key");
        assert_eq!(cfg.market_api_base_url.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(OrchestrationError::ConfigError(_))));
        assert!(config(&[("MAX_PLANNING_ROUNDS", "0")]).is_err());
    }
}
