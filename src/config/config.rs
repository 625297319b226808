// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::{SyncSettings, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};

const ENV_PREFIX: &str = "CARADS_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding `listings` and `api_logs`
    pub database_path: PathBuf,

    /// Provider classifieds endpoint, used for both GET and POST
    pub provider_api_url: String,

    /// Value for the `x-auth-identifier` header
    pub provider_auth_identifier: Option<String>,

    /// Value for the `x-auth-key` header
    pub provider_auth_key: Option<String>,

    /// Ids per targeted refresh request
    pub batch_size: usize,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Pause between batches in milliseconds
    pub inter_batch_delay_ms: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = path
            .or_else(|| std::env::var(format!("{ENV_PREFIX}CONFIG")).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config.toml"));

        let mut config: Config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CARADS_*` overrides using `lookup` to read variables
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(val) = var("DATABASE_PATH") {
            self.database_path = PathBuf::from(val);
        }
        if let Some(val) = var("PROVIDER_API_URL") {
            self.provider_api_url = val;
        }
        if let Some(val) = var("PROVIDER_AUTH_IDENTIFIER") {
            self.provider_auth_identifier = Some(val);
        }
        if let Some(val) = var("PROVIDER_AUTH_KEY") {
            self.provider_auth_key = Some(val);
        }
        if let Some(val) = var("BATCH_SIZE") {
            self.batch_size = val.parse().context("CARADS_BATCH_SIZE must be an integer")?;
        }
        if let Some(val) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = val
                .parse()
                .context("CARADS_REQUEST_TIMEOUT_SECS must be an integer")?;
        }
        if let Some(val) = var("INTER_BATCH_DELAY_MS") {
            self.inter_batch_delay_ms = val
                .parse()
                .context("CARADS_INTER_BATCH_DELAY_MS must be an integer")?;
        }
        if let Some(val) = var("LOG_LEVEL") {
            self.log_level = val;
        }
        if let Some(val) = var("LOG_FORMAT") {
            self.log_format = match val.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => anyhow::bail!("Unknown CARADS_LOG_FORMAT: {other}"),
            };
        }

        Ok(())
    }

    /// Check everything a sync run needs before any connection is opened
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(&self.provider_api_url)
            .with_context(|| format!("Invalid provider_api_url: {}", self.provider_api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("provider_api_url must use http or https, got {}", url.scheme());
        }

        if self.provider_auth_identifier.as_deref().is_none_or(str::is_empty)
            || self.provider_auth_key.as_deref().is_none_or(str::is_empty)
        {
            anyhow::bail!("Provider credentials missing: set provider_auth_identifier and provider_auth_key");
        }

        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than zero");
        }
        if self.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!("batch_size must be at most {MAX_BATCH_SIZE}, got {}", self.batch_size);
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            batch_size: self.batch_size,
            inter_batch_delay: Duration::from_millis(self.inter_batch_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("listings.db"),
            provider_api_url: String::from("https://api.car.info/v3/app/oozmarketing/classifieds"),
            provider_auth_identifier: None,
            provider_auth_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: 90,
            inter_batch_delay_ms: 1000,
            log_level: String::from("info"),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::NamedTempFile;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn valid_config() -> Config {
        Config {
            provider_auth_identifier: Some("ident".to_string()),
            provider_auth_key: Some("secret".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("listings.db"));
        assert_eq!(
            config.provider_api_url,
            "https://api.car.info/v3/app/oozmarketing/classifieds"
        );
        assert_eq!(config.provider_auth_identifier, None);
        assert_eq!(config.provider_auth_key, None);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.request_timeout_secs, 90);
        assert_eq!(config.inter_batch_delay_ms, 1000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_missing_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.batch_size, 1000);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
database_path = "/var/lib/car-ads/listings.db"
provider_api_url = "https://provider.example.com/classifieds"
provider_auth_identifier = "ident-123"
provider_auth_key = "key-456"
batch_size = 250
request_timeout_secs = 30
inter_batch_delay_ms = 0
log_level = "debug"
log_format = "json"
"#;
        fs::write(temp_file.path(), config_content).unwrap();

        let mut config: Config = toml::from_str(&fs::read_to_string(temp_file.path()).unwrap()).unwrap();
        config.apply_env_overrides(env(&[])).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/car-ads/listings.db"));
        assert_eq!(config.provider_api_url, "https://provider.example.com/classifieds");
        assert_eq!(config.provider_auth_identifier, Some("ident-123".to_string()));
        assert_eq!(config.provider_auth_key, Some("key-456".to_string()));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.sync_settings().inter_batch_delay, Duration::ZERO);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(r#"batch_size = 50"#).unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.request_timeout_secs, 90);
        assert_eq!(config.database_path, PathBuf::from("listings.db"));
    }

    #[test]
    fn test_env_var_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("CARADS_DATABASE_PATH", "/env/listings.db"),
                ("CARADS_PROVIDER_API_URL", "http://env.example.com/api"),
                ("CARADS_PROVIDER_AUTH_IDENTIFIER", "env-ident"),
                ("CARADS_PROVIDER_AUTH_KEY", "env-key"),
                ("CARADS_BATCH_SIZE", "200"),
                ("CARADS_REQUEST_TIMEOUT_SECS", "15"),
                ("CARADS_INTER_BATCH_DELAY_MS", "250"),
                ("CARADS_LOG_LEVEL", "trace"),
                ("CARADS_LOG_FORMAT", "JSON"),
            ]))
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/env/listings.db"));
        assert_eq!(config.provider_api_url, "http://env.example.com/api");
        assert_eq!(config.provider_auth_identifier, Some("env-ident".to_string()));
        assert_eq!(config.provider_auth_key, Some("env-key".to_string()));
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.inter_batch_delay_ms, 250);
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_env_var_override_rejects_bad_numbers() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(env(&[("CARADS_BATCH_SIZE", "lots")]));
        assert!(result.is_err());

        let result = config.apply_env_overrides(env(&[("CARADS_LOG_FORMAT", "xml")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("credentials"));

        let config = Config {
            provider_auth_key: Some(String::new()),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url_and_batch_size() {
        let config = Config {
            provider_api_url: "not a url".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            provider_api_url: "ftp://provider.example.com".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            batch_size: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_caps_batch_size_at_bind_limit() {
        let config = Config {
            batch_size: MAX_BATCH_SIZE,
            ..valid_config()
        };
        assert!(config.validate().is_ok());

        let config = Config {
            batch_size: MAX_BATCH_SIZE + 1,
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at most"));
    }
}
