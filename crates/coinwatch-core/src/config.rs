use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

pub const DEFAULT_URL: &str = "https://coinmarketcap.com/";
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

const DEFAULT_NAME_PATTERN: &str = r#"<p class="sc-65e7f566-0 iPbTJf coin-item-name">(.+?)</p>"#;
const DEFAULT_PRICE_PATTERN: &str = r#"<div class="sc-b3fc6b7-0 dzgUIj"><span>(.+?)</span>"#;
const DEFAULT_MARKET_CAP_PATTERN: &str =
    r#"<span data-nosnippet="true" class="sc-11478e5d-1 jfwGHx">(.+?)</span>"#;

/// The three field patterns, each with exactly one capturing group.
///
/// Defaults target the coinmarketcap.com listing markup at the time of
/// writing; override them from JSON or the environment when the page
/// layout changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet {
    #[serde(default = "PatternSet::default_name")]
    pub name: String,
    #[serde(default = "PatternSet::default_price")]
    pub price: String,
    #[serde(default = "PatternSet::default_market_cap")]
    pub market_cap: String,
}

impl PatternSet {
    pub fn new(
        name: impl Into<String>,
        price: impl Into<String>,
        market_cap: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            market_cap: market_cap.into(),
        }
    }

    fn default_name() -> String {
        DEFAULT_NAME_PATTERN.to_string()
    }

    fn default_price() -> String {
        DEFAULT_PRICE_PATTERN.to_string()
    }

    fn default_market_cap() -> String {
        DEFAULT_MARKET_CAP_PATTERN.to_string()
    }

    /// Load patterns from a JSON file. Missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read pattern file {}: {e}",
                path.display()
            ))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            price: Self::default_price(),
            market_cap: Self::default_market_cap(),
        }
    }
}

/// What the worker does with a trigger while an earlier cycle is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Start the new cycle anyway; cycles may run concurrently.
    #[default]
    Allow,
    /// Drop the trigger; at most one cycle is in flight.
    Skip,
}

/// Configuration for a watcher.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub worker_id: String,
    pub url: String,
    pub interval: Duration,
    pub user_agent: String,
    pub patterns: PatternSet,
    pub overlap: OverlapPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("watcher-{}", &Uuid::new_v4().to_string()[..8]),
            url: DEFAULT_URL.to_string(),
            interval: DEFAULT_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            patterns: PatternSet::default(),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_patterns(mut self, patterns: PatternSet) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Read configuration from environment variables.
    ///
    /// - `COINWATCH_URL` (optional, defaults to the coinmarketcap listing)
    /// - `COINWATCH_INTERVAL_MS` (optional, defaults to 5000)
    /// - `COINWATCH_USER_AGENT` (optional)
    /// - `COINWATCH_NAME_PATTERN`, `COINWATCH_PRICE_PATTERN`,
    ///   `COINWATCH_MARKET_CAP_PATTERN` (optional, each overrides one field)
    /// - `COINWATCH_SKIP_OVERLAP` (optional, `true`/`false`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("COINWATCH_URL") {
            config.url = url;
        }

        if let Some(raw) = lookup("COINWATCH_INTERVAL_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid COINWATCH_INTERVAL_MS '{raw}': must be a positive integer"
                ))
            })?;
            config.interval = Duration::from_millis(ms);
        }

        if let Some(user_agent) = lookup("COINWATCH_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Some(pattern) = lookup("COINWATCH_NAME_PATTERN") {
            config.patterns.name = pattern;
        }
        if let Some(pattern) = lookup("COINWATCH_PRICE_PATTERN") {
            config.patterns.price = pattern;
        }
        if let Some(pattern) = lookup("COINWATCH_MARKET_CAP_PATTERN") {
            config.patterns.market_cap = pattern;
        }

        if let Some(raw) = lookup("COINWATCH_SKIP_OVERLAP") {
            config.overlap = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => OverlapPolicy::Skip,
                "0" | "false" | "no" => OverlapPolicy::Allow,
                _ => {
                    return Err(AppError::ConfigError(format!(
                        "Invalid COINWATCH_SKIP_OVERLAP '{raw}': expected true or false"
                    )));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the URL and interval.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_target_url(&self.url)?;
        self.validate_interval()
    }

    /// The trigger period must be non-zero.
    pub fn validate_interval(&self) -> Result<(), AppError> {
        if self.interval.is_zero() {
            return Err(AppError::ConfigError(
                "Interval must be at least 1 ms".into(),
            ));
        }
        Ok(())
    }
}

/// Require an absolute `http`/`https` URL with a host.
pub fn validate_target_url(url: &str) -> Result<Url, AppError> {
    let parsed =
        Url::parse(url).map_err(|e| AppError::ConfigError(format!("Invalid URL '{url}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::ConfigError(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(AppError::ConfigError(format!("URL '{url}' has no host")));
    }

    Ok(parsed)
}
