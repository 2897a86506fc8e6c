use std::fmt;
use std::path::PathBuf;

use anyhow::{Result, bail};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Runtime configuration, read from the environment (and `.env` via dotenv).
#[derive(Clone)]
pub struct Config {
    /// Missing key is not a load error: handlers report it per call.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: u64,
    pub temperature: f32,
    /// Directory for the scoring log; `None` disables persistence.
    pub log_dir: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout = match get("OPENAI_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("OPENAI_TIMEOUT_SECS must be an integer: {}", e))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let temperature = match get("OPENAI_TEMPERATURE") {
            Some(raw) => raw
                .parse::<f32>()
                .map_err(|e| anyhow::anyhow!("OPENAI_TEMPERATURE must be a number: {}", e))?,
            None => DEFAULT_TEMPERATURE,
        };

        let config = Self {
            api_key: get("OPENAI_API_KEY"),
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
            temperature,
            log_dir: get("SHOWGRID_LOG_DIR").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            bail!("base URL must not be empty");
        }
        if self.model.trim().is_empty() {
            bail!("model name must not be empty");
        }
        if self.timeout == 0 {
            bail!("timeout must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be within [0.0, 2.0], got {}", self.temperature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT_SECS);
        assert!((cfg.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn overrides_are_read_and_trailing_slash_dropped() {
        let cfg = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:9999/v1/"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("OPENAI_TIMEOUT_SECS", "5"),
            ("OPENAI_TEMPERATURE", "0"),
            ("SHOWGRID_LOG_DIR", "/tmp/showgrid"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.base_url, "http://localhost:9999/v1");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.timeout, 5);
        assert_eq!(cfg.log_dir, Some(PathBuf::from("/tmp/showgrid")));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "   ")])).unwrap();
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("OPENAI_TIMEOUT_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("OPENAI_TIMEOUT_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("OPENAI_TEMPERATURE", "3.5")])).is_err());
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let cfg = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
