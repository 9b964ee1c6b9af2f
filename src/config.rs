use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compose;

const DEFAULT_ENV_PREFIX: &str = "FEEDR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!(
        "feedr/{} (+https://github.com/feedr-tui/feedr)",
        crate::VERSION
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertConfig {
    #[serde(default = "default_alert_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            ttl: default_alert_ttl(),
        }
    }
}

fn default_alert_ttl() -> Duration {
    crate::alert::DEFAULT_TTL
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_avatar_url")]
    pub avatar_url: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            avatar_url: default_avatar_url(),
        }
    }
}

fn default_username() -> String {
    compose::DEFAULT_USERNAME.into()
}

fn default_avatar_url() -> String {
    compose::DEFAULT_AVATAR_URL.into()
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

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() && other.api.base_url != default_base_url() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.is_empty() && other.api.user_agent != default_user_agent() {
        base.api.user_agent = other.api.user_agent;
    }

    if !other.ui.theme.is_empty() && other.ui.theme != default_theme() {
        base.ui.theme = other.ui.theme;
    }

    if other.alerts.ttl != default_alert_ttl() {
        base.alerts.ttl = other.alerts.ttl;
    }

    if !other.profile.username.is_empty() && other.profile.username != default_username() {
        base.profile.username = other.profile.username;
    }
    if !other.profile.avatar_url.is_empty() && other.profile.avatar_url != default_avatar_url() {
        base.profile.avatar_url = other.profile.avatar_url;
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
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "ui.theme" => cfg.ui.theme = value,
        "alerts.ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.alerts.ttl = duration;
            }
        }
        "profile.username" => cfg.profile.username = value,
        "profile.avatar_url" => cfg.profile.avatar_url = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("feedr").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/feedr.yaml")),
            env_prefix: Some("FEEDR_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.api.base_url, default_base_url());
        assert_eq!(cfg.alerts.ttl, Duration::from_secs(5));
        assert_eq!(cfg.profile.username, "Anonymous");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  base_url: https://feed.example.test/\nalerts:\n  ttl: 8s\nprofile:\n  username: zoro\n",
        )
        .unwrap();

        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("FEEDR_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://feed.example.test/");
        assert_eq!(cfg.alerts.ttl, Duration::from_secs(8));
        assert_eq!(cfg.profile.username, "zoro");
        // Untouched sections keep their defaults.
        assert_eq!(cfg.ui.theme, "default");
    }

    #[test]
    fn env_overrides() {
        env::set_var("FEEDR_TEST_ENV_UI__THEME", "plain");
        env::set_var("FEEDR_TEST_ENV_API__BASE_URL", "https://env.example.test/");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/feedr.yaml")),
            env_prefix: Some("FEEDR_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "plain");
        assert_eq!(cfg.api.base_url, "https://env.example.test/");
        env::remove_var("FEEDR_TEST_ENV_UI__THEME");
        env::remove_var("FEEDR_TEST_ENV_API__BASE_URL");
    }

    #[test]
    fn env_ttl_parses_humantime() {
        env::set_var("FEEDR_TEST_TTL_ALERTS__TTL", "2s 500ms");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/feedr.yaml")),
            env_prefix: Some("FEEDR_TEST_TTL".into()),
        })
        .unwrap();
        assert_eq!(cfg.alerts.ttl, Duration::from_millis(2500));
        env::remove_var("FEEDR_TEST_TTL_ALERTS__TTL");
    }
}
