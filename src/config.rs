//! Client configuration.
//!
//! ```toml
//! client = "postgres"
//! connection = "postgres://app@localhost/app"
//! debug = false
//!
//! [pool]
//! min = 2
//! max = 10
//! acquire_timeout_ms = 5000
//! ```

use serde::{Deserialize, Serialize};

use crate::compiler::Dialect;
use crate::error::{Error, Result};
use crate::pool::PoolConfig;

/// Everything needed to open a [`Client`](crate::Client) over sqlx.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// SQL dialect; `pg`, `sqlite3`, `mysql2` and other driver names are accepted.
    pub client: Dialect,
    /// Database URL handed to the backend.
    pub connection: Option<String>,
    /// Log every query at `info` instead of `debug`.
    pub debug: bool,
    pub pool: PoolConfig,
}

impl ClientConfig {
    pub fn new(client: Dialect) -> Self {
        Self {
            client,
            ..Self::default()
        }
    }

    pub fn connection(mut self, url: impl Into<String>) -> Self {
        self.connection = Some(url.into());
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Parse a TOML document. Unknown keys are rejected.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.pool.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&source)
    }
}
