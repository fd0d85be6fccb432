// HTTP fetcher configuration (environment driven)

use exclusive_core::{AppError, Result};
use std::time::Duration;

/// Environment variable overriding the User-Agent header
pub const ENV_USER_AGENT: &str = "EXCLUSIVE_HTTP_USER_AGENT";

/// Environment variable overriding the TCP connect timeout (milliseconds)
pub const ENV_CONNECT_TIMEOUT_MS: &str = "EXCLUSIVE_HTTP_CONNECT_TIMEOUT_MS";

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("exclusive/", env!("CARGO_PKG_VERSION"));

/// Client settings for [`HttpFetcher`](crate::HttpFetcher)
///
/// `connect_timeout` bounds connection setup only. Units queued behind a
/// request wait for it however long it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFetcherConfig {
    pub user_agent: String,
    pub connect_timeout: Option<Duration>,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: None,
        }
    }
}

impl HttpFetcherConfig {
    /// Load from process environment, falling back to defaults
    ///
    /// # Errors
    /// - AppError::Config if a variable is set but malformed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(agent) = lookup(ENV_USER_AGENT).filter(|s| !s.trim().is_empty()) {
            config.user_agent = agent;
        }

        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                AppError::Config(format!(
                    "{} must be milliseconds, got {:?}",
                    ENV_CONNECT_TIMEOUT_MS, raw
                ))
            })?;
            config.connect_timeout = Some(Duration::from_millis(ms));
        }

        Ok(config)
    }
}
