use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;
use url::Url;
use wimc_engine::RetryPolicy;

/// Daemon configuration, loaded from TOML. Every field except the provider
/// list has a working default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    #[serde(default)]
    pub providers: Vec<Url>,
    /// Default hub, consulted only when no provider yields a candidate.
    #[serde(default)]
    pub hub_url: Option<Url>,
    #[serde(default = "default_max_retry_cycles")]
    pub max_retry_cycles: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_storage_root() -> PathBuf {
    home::home_dir()
        .map(|home| home.join(".wimc"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/wimc"))
}

fn default_max_retry_cycles() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_ceiling_ms() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    4
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() && self.hub_url.is_none() {
            bail!("config needs at least one provider or a hub_url");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.max_retry_cycles == 0 {
            bail!("max_retry_cycles must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retry_cycles: self.max_retry_cycles,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_ceiling: Duration::from_millis(self.backoff_ceiling_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let file = write_config(r#"providers = ["http://provider-a/v1"]"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.max_retry_cycles, 3);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.retry_policy().backoff_ceiling,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn full_config_round_trips() {
        let file = write_config(
            r#"
storage_root = "/var/lib/wimc"
providers = ["http://provider-a/v1", "http://provider-b/v1"]
hub_url = "http://hub/v1"
max_retry_cycles = 5
backoff_base_ms = 100
backoff_ceiling_ms = 2000
concurrency = 2
request_timeout_ms = 5000
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/var/lib/wimc"));
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.hub_url.unwrap().as_str(), "http://hub/v1");
        assert_eq!(config.max_retry_cycles, 5);
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn rejects_empty_provider_set_without_hub() {
        let file = write_config("");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn hub_url_alone_is_enough() {
        let file = write_config(r#"hub_url = "http://hub/v1""#);
        assert!(Config::load(file.path()).is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let file = write_config(
            r#"
providers = ["http://provider-a/v1"]
concurrency = 0
"#,
        );
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_zero_retry_cycles() {
        let file = write_config(
            r#"
providers = ["http://provider-a/v1"]
max_retry_cycles = 0
"#,
        );
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_unparseable_urls() {
        let file = write_config(r#"providers = ["not a url"]"#);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        let file = write_config(
            r#"
providers = ["http://provider-a/v1"]
retries = 7
"#,
        );
        assert!(Config::load(file.path()).is_err());
    }
}
