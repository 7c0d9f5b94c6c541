use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} env variable must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub app_url: SocketAddr,
    /// Postgres connection string; the in-memory store is used without one.
    pub database_url: Option<String>,
    pub pool_size: u32,
    /// Event bus endpoint; transitions are only logged without one.
    pub eventbus_url: Option<String>,
}

impl Config {
    /// Reads the process environment. Call `dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let app_url = non_empty("APP_URL").ok_or(ConfigError::Missing("APP_URL"))?;
        let app_url = app_url.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            var: "APP_URL",
            value: app_url.clone(),
        })?;

        let pool_size = match non_empty("DB_POOL_SIZE") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DB_POOL_SIZE",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_POOL_SIZE,
        };

        Ok(Config {
            app_url,
            database_url: non_empty("DATABASE_URL"),
            pool_size,
            eventbus_url: non_empty("EVENTBUS_URL"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn minimal_environment() {
        let config = Config::from_lookup(lookup(&[("APP_URL", "127.0.0.1:50051")])).unwrap();
        assert_eq!(config.app_url, "127.0.0.1:50051".parse().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.eventbus_url, None);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn full_environment() {
        let config = Config::from_lookup(lookup(&[
            ("APP_URL", "0.0.0.0:50051"),
            ("DATABASE_URL", "postgres://issues@localhost/issues"),
            ("DB_POOL_SIZE", "4"),
            ("EVENTBUS_URL", "http://127.0.0.1:50057"),
        ]))
        .unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://issues@localhost/issues")
        );
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.eventbus_url.as_deref(), Some("http://127.0.0.1:50057"));
    }

    #[test]
    fn missing_app_url() {
        assert_eq!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("APP_URL"))
        );
    }

    #[test]
    fn bad_values_are_reported() {
        assert_eq!(
            Config::from_lookup(lookup(&[("APP_URL", "localhost")])),
            Err(ConfigError::Invalid {
                var: "APP_URL",
                value: "localhost".into()
            })
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("APP_URL", "127.0.0.1:1"), ("DB_POOL_SIZE", "0")])),
            Err(ConfigError::Invalid {
                var: "DB_POOL_SIZE",
                value: "0".into()
            })
        );
    }

    #[test]
    fn blank_optional_values_count_as_unset() {
        let config = Config::from_lookup(lookup(&[
            ("APP_URL", "127.0.0.1:50051"),
            ("DATABASE_URL", "  "),
        ]))
        .unwrap();
        assert_eq!(config.database_url, None);
    }
}
