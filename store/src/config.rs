use thiserror::Error;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS: &str = "PRESENCE_DB_MAX_CONNECTIONS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got `{value}`")]
    InvalidNumber { var: &'static str, value: String },
}

/// Connection settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

    /// `Ok(None)` when `DATABASE_URL` is unset or blank.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(database_url) = lookup(DATABASE_URL).filter(|url| !url.trim().is_empty()) else {
            return Ok(None);
        };

        let max_connections = match lookup(MAX_CONNECTIONS) {
            None => Self::DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber {
                    var: MAX_CONNECTIONS,
                    value: raw,
                })?,
        };

        Ok(Some(Self {
            database_url,
            max_connections,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_url_means_no_database() {
        assert_eq!(StoreConfig::from_lookup(lookup(&[])), Ok(None));
        assert_eq!(StoreConfig::from_lookup(lookup(&[(DATABASE_URL, "  ")])), Ok(None));
    }

    #[test]
    fn max_connections_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[(DATABASE_URL, "postgres://localhost/presence")]))
            .unwrap()
            .unwrap();
        assert_eq!(config.max_connections, StoreConfig::DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.database_url, "postgres://localhost/presence");
    }

    #[test]
    fn max_connections_is_parsed() {
        let config = StoreConfig::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://localhost/presence"),
            (MAX_CONNECTIONS, " 5 "),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn invalid_max_connections_is_rejected() {
        for bad in ["0", "many", "-1"] {
            let err = StoreConfig::from_lookup(lookup(&[
                (DATABASE_URL, "postgres://localhost/presence"),
                (MAX_CONNECTIONS, bad),
            ]))
            .unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidNumber {
                    var: MAX_CONNECTIONS,
                    value: bad.to_string()
                }
            );
        }
    }
}
