use realstate_db::DatabaseConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing` filter directives used when `RUST_LOG` is unset and
    /// `--verbose` is not given (e.g. `"realstate=info,realstate_db=debug"`).
    #[serde(default)]
    pub filter: Option<String>,
}
