use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::net;
use crate::readstate;

const DEFAULT_ENV_PREFIX: &str = "RHN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub hn: HnConfig,
    #[serde(default)]
    pub read_state: ReadStateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HnConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_site_base")]
    pub site_base: String,
}

impl Default for HnConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            api_base: default_api_base(),
            site_base: default_site_base(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "refined-hn/{} (+https://github.com/plibither8/refined-hn)",
        crate::VERSION
    )
}

fn default_api_base() -> String {
    net::HN_API_BASE.to_string()
}

fn default_site_base() -> String {
    net::HN_SITE_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadStateConfig {
    /// How long a tree root's seen-comment record lives after first visit.
    #[serde(default = "default_read_ttl", with = "humantime_serde")]
    pub ttl: Duration,
    #[serde(default = "default_db_path")]
    pub db_path: Option<PathBuf>,
}

impl Default for ReadStateConfig {
    fn default() -> Self {
        Self {
            ttl: default_read_ttl(),
            db_path: default_db_path(),
        }
    }
}

fn default_read_ttl() -> Duration {
    readstate::DEFAULT_TTL
}

fn default_db_path() -> Option<PathBuf> {
    crate::storage::default_path()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

// Every field has a non-empty default, so "was it set" means "does it
// differ from the default"; explicitly re-setting a default is a no-op.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if !other.hn.user_agent.is_empty() && other.hn.user_agent != defaults.hn.user_agent {
        base.hn.user_agent = other.hn.user_agent;
    }
    if !other.hn.api_base.is_empty() && other.hn.api_base != defaults.hn.api_base {
        base.hn.api_base = other.hn.api_base;
    }
    if !other.hn.site_base.is_empty() && other.hn.site_base != defaults.hn.site_base {
        base.hn.site_base = other.hn.site_base;
    }

    if other.read_state.ttl != Duration::ZERO && other.read_state.ttl != defaults.read_state.ttl {
        base.read_state.ttl = other.read_state.ttl;
    }
    if other.read_state.db_path.is_some() && other.read_state.db_path != defaults.read_state.db_path
    {
        base.read_state.db_path = other.read_state.db_path;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(Config::default());
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "hn.user_agent" => cfg.hn.user_agent = value,
        "hn.api_base" => cfg.hn.api_base = value,
        "hn.site_base" => cfg.hn.site_base = value,
        "read_state.ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.read_state.ttl = duration;
            }
        }
        "read_state.db_path" => cfg.read_state.db_path = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("refined-hn").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            env_prefix: Some("RHN_TEST_NONE".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(cfg.hn.api_base, net::HN_API_BASE);
        assert_eq!(cfg.read_state.ttl, readstate::DEFAULT_TTL);
        assert!(cfg.hn.user_agent.starts_with("refined-hn/"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "hn:\n  user_agent: custom/1.0\nread_state:\n  ttl: 1day\n",
        )
        .unwrap();

        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("RHN_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.hn.user_agent, "custom/1.0");
        assert_eq!(cfg.read_state.ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(cfg.hn.site_base, net::HN_SITE_BASE);
    }

    #[test]
    fn env_overrides() {
        env::set_var("RHN_HN__SITE_BASE", "https://example.test");
        let cfg = load(LoadOptions::default()).unwrap();
        assert_eq!(cfg.hn.site_base, "https://example.test");
        env::remove_var("RHN_HN__SITE_BASE");
    }
}
