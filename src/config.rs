//! Connection settings loaded from environment variables.
//!
//! A `.env` file in the working directory is read first when present.

use std::time::Duration;

use crate::error::{PersistenceError, Result};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/postgres";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Settings used by [`Persistence::connect`](crate::Persistence::connect).
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceConfig {
    /// PostgreSQL connection string.
    pub database_url: String,

    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
}

impl PersistenceConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Loads `DATABASE_URL` and `DATABASE_CONNECT_TIMEOUT_SECS`, falling back
    /// to defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Config`] if the timeout is set but is not
    /// a whole number of seconds.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let connect_timeout_secs = match var("DATABASE_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                PersistenceError::Config(format!(
                    "DATABASE_CONNECT_TIMEOUT_SECS must be a number of seconds, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PersistenceConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, PersistenceConfig::default());
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_reads_variables() {
        let config = PersistenceConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgres://app:secret@db/app"),
            ("DATABASE_CONNECT_TIMEOUT_SECS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "postgres://app:secret@db/app");
        assert_eq!(config.connect_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let err = PersistenceConfig::from_vars(vars(&[("DATABASE_CONNECT_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Config(_)));
    }
}
