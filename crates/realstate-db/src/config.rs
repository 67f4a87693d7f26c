//! Database configuration as read from the `[database]` section of the
//! application config file.

use std::time::Duration;

use realstate_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::descriptor::ConnectionDescriptor;
use crate::pool::PoolOptions;

/// Environment variable that replaces the configured descriptor.
pub const DATABASE_URL_ENV: &str = "REALSTATE_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection descriptor, e.g. `sqlite:///realstate.db`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Connections kept warm.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Extra connections allowed above `pool_size` under load.
    #[serde(default = "default_max_overflow")]
    pub max_overflow: u32,

    /// Seconds to wait for a free connection before giving up.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,

    /// Seconds an idle connection above `pool_size` is kept (0 = forever).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Check connections are alive before handing them out.
    #[serde(default = "default_true")]
    pub pre_ping: bool,

    /// Log every SQL statement.
    #[serde(default)]
    pub echo: bool,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_url() -> String {
    "sqlite:///realstate.db".to_string()
}
fn default_pool_size() -> u32 {
    10
}
fn default_max_overflow() -> u32 {
    20
}
fn default_pool_timeout() -> u64 {
    30
}
fn default_idle_timeout() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            pool_size: default_pool_size(),
            max_overflow: default_max_overflow(),
            pool_timeout_secs: default_pool_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            pre_ping: default_true(),
            echo: false,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Config pointing at `url` with every other setting defaulted.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Apply `REALSTATE_DATABASE_URL` if it is set.
    pub fn apply_env(&mut self) {
        self.override_url(std::env::var(DATABASE_URL_ENV).ok());
    }

    fn override_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!("database url taken from {DATABASE_URL_ENV}");
            self.url = url;
        }
    }

    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::parse(&self.url)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            pool_size: self.pool_size,
            max_overflow: self.max_overflow,
            timeout: Duration::from_secs(self.pool_timeout_secs),
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
            pre_ping: self.pre_ping,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    /// Check the descriptor parses, names a supported backend, and the
    /// pool settings are usable.
    pub fn validate(&self) -> Result<()> {
        self.descriptor()?.backend()?;
        self.pool_options().validate()?;
        if self.pool_timeout_secs == 0 {
            return Err(Error::config("pool_timeout_secs must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DatabaseConfig::default();
        assert_eq!(cfg.url, "sqlite:///realstate.db");
        assert!(!cfg.echo);
        let opts = cfg.pool_options();
        assert_eq!(opts.pool_size, 10);
        assert_eq!(opts.ceiling(), 30);
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert_eq!(opts.idle_timeout, Some(Duration::from_secs(300)));
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_section_fills_defaults() {
        let cfg: DatabaseConfig = serde_json::from_str(r#"{"url": "sqlite::memory:", "echo": true}"#).unwrap();
        assert_eq!(cfg.url, "sqlite::memory:");
        assert!(cfg.echo);
        assert_eq!(cfg.max_overflow, 20);
        assert!(cfg.pre_ping);
    }

    #[test]
    fn zero_idle_timeout_keeps_connections() {
        let cfg = DatabaseConfig {
            idle_timeout_secs: 0,
            ..DatabaseConfig::default()
        };
        assert_eq!(cfg.pool_options().idle_timeout, None);
    }

    #[test]
    fn env_override_replaces_url() {
        let mut cfg = DatabaseConfig::default();
        cfg.override_url(Some("sqlite:////tmp/other.db".into()));
        assert_eq!(cfg.url, "sqlite:////tmp/other.db");
        cfg.override_url(Some("  ".into()));
        assert_eq!(cfg.url, "sqlite:////tmp/other.db");
        cfg.override_url(None);
        assert_eq!(cfg.url, "sqlite:////tmp/other.db");
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let unsupported = DatabaseConfig::with_url("postgresql://u:p@localhost/db");
        assert!(matches!(unsupported.validate(), Err(Error::Config(_))));

        let no_wait = DatabaseConfig {
            pool_timeout_secs: 0,
            ..DatabaseConfig::default()
        };
        assert!(no_wait.validate().is_err());

        let empty = DatabaseConfig {
            pool_size: 0,
            max_overflow: 0,
            ..DatabaseConfig::default()
        };
        assert!(matches!(empty.validate(), Err(Error::Config(_))));

        assert!(DatabaseConfig::with_url("not a url").validate().is_err());
    }
}
