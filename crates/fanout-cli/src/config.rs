use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stupid_fanout::PoolSettings;
use tracing::debug;

/// Largest integer the demo generates by default (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// CLI configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Worker pool settings (`[pool]` table).
    #[serde(default)]
    pub pool: PoolSettings,

    /// Default number of values for `fanout primes`
    #[serde(default = "default_count")]
    pub count: usize,

    /// Default exclusive upper bound for generated values
    #[serde(default = "default_max_value")]
    pub max_value: u64,
}

fn default_count() -> usize {
    5000
}

fn default_max_value() -> u64 {
    MAX_SAFE_INTEGER
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            pool: PoolSettings::default(),
            count: default_count(),
            max_value: default_max_value(),
        }
    }
}

impl CliConfig {
    /// Return the default config file path: ~/.config/stupid-fanout/config.toml
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("stupid-fanout");
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Returns default config (with env overrides) if the file does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))
        } else {
            debug!(?config_path, "Config file not found, using environment and defaults");
            Ok(Self {
                pool: PoolSettings::from_env(),
                ..Self::default()
            })
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Pool settings with a command-line override applied.
    /// Priority: cli_override (or its env var) > config file > default.
    pub fn resolve_pool(&self, cli_concurrency: Option<usize>) -> PoolSettings {
        let mut pool = self.pool.clone();
        if cli_concurrency.is_some() {
            pool.concurrency = cli_concurrency;
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.count, 5000);
        assert_eq!(config.max_value, MAX_SAFE_INTEGER);
        assert_eq!(config.pool.concurrency, None);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = CliConfig::parse(
            r#"
            count = 10

            [pool]
            concurrency = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.count, 10);
        assert_eq!(config.max_value, MAX_SAFE_INTEGER);
        assert_eq!(config.pool.concurrency, Some(3));
        assert_eq!(config.pool.worker_name, "fanout-worker");
    }

    #[test]
    fn test_resolve_pool_override() {
        let config = CliConfig::parse("[pool]\nconcurrency = 3\n").unwrap();
        assert_eq!(config.resolve_pool(None).concurrency, Some(3));
        assert_eq!(config.resolve_pool(Some(8)).concurrency, Some(8));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = CliConfig::load(Some("/nonexistent/fanout/config.toml")).unwrap();
        assert_eq!(config.count, 5000);
    }
}
