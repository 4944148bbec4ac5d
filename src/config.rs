use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::feed::{FeedOptions, SettingsChangePolicy};
use crate::filler::DEFAULT_MAX_ATTEMPTS;
use crate::query::DEFAULT_DEBOUNCE;
use crate::reddit::{SortOption, DEFAULT_BASE_URL};
use crate::settings::{sort_option_from_key, Settings, SettingsError};

const DEFAULT_ENV_PREFIX: &str = "GIF_SCROLL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedditConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            base_url: default_base_url(),
        }
    }
}

fn default_user_agent() -> String {
    format!("gif-scroll/{}", crate::VERSION)
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_term")]
    pub default_term: String,
    #[serde(default)]
    pub sort: SortOption,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
    #[serde(default)]
    pub request_limit: Option<u32>,
    #[serde(default)]
    pub on_settings_change: SettingsChangePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_term: default_term(),
            sort: SortOption::default(),
            per_page: default_per_page(),
            max_attempts: default_max_attempts(),
            debounce: default_debounce(),
            request_limit: None,
            on_settings_change: SettingsChangePolicy::default(),
        }
    }
}

impl FeedConfig {
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        Settings::new(self.sort, self.per_page)
    }

    pub fn options(&self) -> FeedOptions {
        FeedOptions {
            debounce: self.debounce,
            max_attempts: self.max_attempts,
            on_settings_change: self.on_settings_change,
        }
    }
}

fn default_term() -> String {
    "gifs".into()
}

fn default_per_page() -> usize {
    10
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_debounce() -> Duration {
    DEFAULT_DEBOUNCE
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
    apply_env(&mut cfg, prefix);

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
    if !other.reddit.user_agent.is_empty() {
        base.reddit.user_agent = other.reddit.user_agent;
    }
    if !other.reddit.base_url.is_empty() {
        base.reddit.base_url = other.reddit.base_url;
    }

    if !other.feed.default_term.is_empty() {
        base.feed.default_term = other.feed.default_term;
    }
    base.feed.sort = other.feed.sort;
    base.feed.per_page = other.feed.per_page;
    base.feed.max_attempts = other.feed.max_attempts;
    base.feed.debounce = other.feed.debounce;
    if other.feed.request_limit.is_some() {
        base.feed.request_limit = other.feed.request_limit;
    }
    base.feed.on_settings_change = other.feed.on_settings_change;

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "reddit.user_agent" => cfg.reddit.user_agent = value,
        "reddit.base_url" => cfg.reddit.base_url = value,
        "feed.default_term" => cfg.feed.default_term = value,
        "feed.sort" => {
            if let Ok(sort) = sort_option_from_key(&value) {
                cfg.feed.sort = sort;
            }
        }
        "feed.per_page" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.per_page = parsed;
            }
        }
        "feed.max_attempts" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.max_attempts = parsed;
            }
        }
        "feed.debounce" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.debounce = duration;
            }
        }
        "feed.request_limit" => {
            cfg.feed.request_limit = value.parse::<u32>().ok();
        }
        "feed.on_settings_change" => match value.trim().to_ascii_lowercase().as_str() {
            "reset" => cfg.feed.on_settings_change = SettingsChangePolicy::Reset,
            "live" => cfg.feed.on_settings_change = SettingsChangePolicy::Live,
            _ => {}
        },
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gif-scroll").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(path: PathBuf, prefix: &str) -> LoadOptions {
        LoadOptions {
            config_file: Some(path),
            env_prefix: Some(prefix.to_string()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let dir = tempdir().unwrap();
        let cfg = load(isolated(dir.path().join("missing.yaml"), "GIF_SCROLL_TEST_DEFAULTS")).unwrap();
        assert_eq!(cfg.feed.default_term, "gifs");
        assert_eq!(cfg.feed.per_page, 10);
        assert_eq!(cfg.feed.max_attempts, 10);
        assert_eq!(cfg.feed.debounce, Duration::from_millis(300));
        assert_eq!(cfg.feed.on_settings_change, SettingsChangePolicy::Reset);
        assert_eq!(cfg.reddit.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "feed:\n  default_term: aww\n  sort: top\n  per_page: 25\n  debounce: 1s\n  request_limit: 100\n  on_settings_change: live\n",
        )
        .unwrap();

        let cfg = load(isolated(path, "GIF_SCROLL_TEST_FILE")).unwrap();
        assert_eq!(cfg.feed.default_term, "aww");
        assert_eq!(cfg.feed.sort, SortOption::Top);
        assert_eq!(cfg.feed.per_page, 25);
        assert_eq!(cfg.feed.debounce, Duration::from_secs(1));
        assert_eq!(cfg.feed.request_limit, Some(100));
        assert_eq!(cfg.feed.on_settings_change, SettingsChangePolicy::Live);
        assert!(cfg.reddit.user_agent.starts_with("gif-scroll/"));
    }

    #[test]
    fn bad_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "feed: [not, a, map]\n").unwrap();
        assert!(load(isolated(path, "GIF_SCROLL_TEST_BAD")).is_err());
    }

    #[test]
    fn env_overrides() {
        let dir = tempdir().unwrap();
        env::set_var("GIF_SCROLL_TEST_ENV_FEED__PER_PAGE", "4");
        env::set_var("GIF_SCROLL_TEST_ENV_FEED__SORT", "new");
        env::set_var("GIF_SCROLL_TEST_ENV_FEED__ON_SETTINGS_CHANGE", "live");
        let cfg = load(isolated(dir.path().join("none.yaml"), "GIF_SCROLL_TEST_ENV")).unwrap();
        assert_eq!(cfg.feed.per_page, 4);
        assert_eq!(cfg.feed.sort, SortOption::New);
        assert_eq!(cfg.feed.on_settings_change, SettingsChangePolicy::Live);
        env::remove_var("GIF_SCROLL_TEST_ENV_FEED__PER_PAGE");
        env::remove_var("GIF_SCROLL_TEST_ENV_FEED__SORT");
        env::remove_var("GIF_SCROLL_TEST_ENV_FEED__ON_SETTINGS_CHANGE");
    }

    #[test]
    fn zero_page_size_from_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "feed:\n  per_page: 0\n").unwrap();

        let cfg = load(isolated(path, "GIF_SCROLL_TEST_ZERO_FILE")).unwrap();
        assert_eq!(cfg.feed.per_page, 0);
        assert_eq!(cfg.feed.settings(), Err(SettingsError::InvalidPageSize));
    }

    #[test]
    fn zero_page_size_from_env_is_rejected() {
        let dir = tempdir().unwrap();
        env::set_var("GIF_SCROLL_TEST_ZERO_ENV_FEED__PER_PAGE", "0");
        let cfg = load(isolated(dir.path().join("none.yaml"), "GIF_SCROLL_TEST_ZERO_ENV")).unwrap();
        env::remove_var("GIF_SCROLL_TEST_ZERO_ENV_FEED__PER_PAGE");
        assert_eq!(cfg.feed.settings(), Err(SettingsError::InvalidPageSize));
    }

    #[test]
    fn feed_config_builds_settings() {
        let mut feed = FeedConfig::default();
        assert_eq!(feed.settings().unwrap().per_page(), 10);
        feed.per_page = 0;
        assert_eq!(feed.settings(), Err(SettingsError::InvalidPageSize));
    }
}
