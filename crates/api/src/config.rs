//! Process configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

use sahakari_observability::{LogFormat, ParseLogFormatError};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_ADDR is not a socket address: {0}")]
    InvalidBindAddr(String),

    #[error("{var} must be true or false (got '{value}')")]
    InvalidFlag { var: &'static str, value: String },

    #[error("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,

    #[error(transparent)]
    LogFormat(#[from] ParseLogFormatError),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// Refuse ledger writes while the society's subscription has lapsed.
    pub enforce_subscription: bool,
    pub log_format: LogFormat,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_raw.clone()))?;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(s) if !s.trim().is_empty() => s,
            _ => {
                warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let use_persistent_stores = flag(&lookup, "USE_PERSISTENT_STORES")?;
        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            use_persistent_stores,
            database_url,
            enforce_subscription: flag(&lookup, "ENFORCE_SUBSCRIPTION")?,
            log_format,
        })
    }

    /// In-memory stores, no subscription gate. Used by tests and local runs.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            jwt_secret: jwt_secret.into(),
            use_persistent_stores: false,
            database_url: None,
            enforce_subscription: false,
            log_format: LogFormat::default(),
        }
    }

    pub fn with_subscription_enforced(mut self, enforce: bool) -> Self {
        self.enforce_subscription = enforce;
        self
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<bool, ConfigError> {
    match lookup(var) {
        None => Ok(false),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" => Ok(false),
            "1" | "true" | "yes" => Ok(true),
            _ => Err(ConfigError::InvalidFlag { var, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.jwt_secret, "dev-secret");
        assert!(!cfg.use_persistent_stores);
        assert!(!cfg.enforce_subscription);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn reads_every_variable() {
        let cfg = load(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/sahakari"),
            ("ENFORCE_SUBSCRIPTION", "1"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert!(cfg.use_persistent_stores);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/sahakari"));
        assert!(cfg.enforce_subscription);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        let err = load(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            load(&[("BIND_ADDR", "not-an-addr")]).unwrap_err(),
            ConfigError::InvalidBindAddr(_)
        ));
        assert!(matches!(
            load(&[("ENFORCE_SUBSCRIPTION", "maybe")]).unwrap_err(),
            ConfigError::InvalidFlag { var: "ENFORCE_SUBSCRIPTION", .. }
        ));
        assert!(matches!(
            load(&[("LOG_FORMAT", "xml")]).unwrap_err(),
            ConfigError::LogFormat(_)
        ));
    }
}
