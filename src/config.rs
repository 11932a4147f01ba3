use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::auth::TokenTable;

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub history_path: PathBuf,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    pub llm_api_key: String,
    pub cors_origin: Option<String>,
    pub tokens: TokenTable,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_sources(|key| env::var(key).ok(), read_secret)
    }

    pub fn from_sources<V, S>(var: V, secret: S) -> Result<Self>
    where
        V: Fn(&str) -> Option<String>,
        S: Fn(&str) -> Option<String>,
    {
        let tokens = secret("AUTH_TOKENS").ok_or_else(|| anyhow!("AUTH_TOKENS secret missing"))?;

        Ok(Self {
            port: try_load(&var, "RUST_PORT", "1111")?,
            history_path: try_load(&var, "HISTORY_PATH", "data/prescriptions.json")?,
            llm_base_url: try_load(&var, "LLM_BASE_URL", "https://api.anthropic.com")?,
            llm_model: try_load(&var, "LLM_MODEL", "claude-sonnet-4-20250514")?,
            llm_max_tokens: try_load(&var, "LLM_MAX_TOKENS", "2000")?,
            llm_timeout_secs: try_load(&var, "LLM_TIMEOUT_SECS", "60")?,
            llm_api_key: secret("ANTHROPIC_API_KEY")
                .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY secret missing"))?,
            cors_origin: var("CORS_ORIGIN"),
            tokens: tokens
                .parse::<TokenTable>()
                .context("AUTH_TOKENS misconfigured")?,
        })
    }

    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            port: 0,
            history_path: PathBuf::from("prescriptions.json"),
            llm_base_url: "http://127.0.0.1:9".to_string(),
            llm_model: "claude-test".to_string(),
            llm_max_tokens: 256,
            llm_timeout_secs: 5,
            llm_api_key: "test-key".to_string(),
            cors_origin: None,
            tokens: "token-1:counselor-1:counselor".parse().unwrap(),
        }
    }
}

fn try_load<T, V>(var: &V, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("Invalid {key} value {raw:?}: {e}")
    })
}

/// Docker secret file first, then an environment variable of the same name.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Secret {secret_name} not readable from file ({e}), checking environment");
        })
        .ok()
        .or_else(|| env::var(secret_name).ok())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key| map.get(key).cloned()
    }

    fn secrets() -> impl Fn(&str) -> Option<String> + use<> {
        lookup(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("AUTH_TOKENS", "abc:principal-7:admin"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(lookup(&[]), secrets()).unwrap();

        assert_eq!(config.port, 1111);
        assert_eq!(config.history_path, PathBuf::from("data/prescriptions.json"));
        assert_eq!(config.llm_max_tokens, 2000);
        assert_eq!(config.llm_api_key, "sk-test");
        assert_eq!(config.cors_origin, None);
        assert_eq!(config.tokens.get("abc").unwrap().id, "principal-7");
    }

    #[test]
    fn test_overrides() {
        let vars = lookup(&[
            ("RUST_PORT", "8080"),
            ("LLM_MODEL", "claude-other"),
            ("CORS_ORIGIN", "https://guidance.example.edu"),
        ]);
        let config = Config::from_sources(vars, secrets()).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.llm_model, "claude-other");
        assert_eq!(
            config.cors_origin.as_deref(),
            Some("https://guidance.example.edu")
        );
    }

    #[test]
    fn test_invalid_value_rejected() {
        let vars = lookup(&[("RUST_PORT", "not-a-port")]);

        assert!(Config::from_sources(vars, secrets()).is_err());
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let secrets = lookup(&[("AUTH_TOKENS", "abc:p:admin")]);

        assert!(Config::from_sources(lookup(&[]), secrets).is_err());
    }
}
