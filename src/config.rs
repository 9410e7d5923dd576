use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Name of the connection string used for the full relational database.
pub const DEFAULT_CONNECTION: &str = "DefaultConnection";
/// Name of the connection string used for the embedded database.
pub const MOCK_DB_CONNECTION: &str = "MockDBConnection";

/// Errors raised while reading process configuration. All of them abort startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Connection string '{0}' not found.")]
    MissingConnectionString(&'static str),

    #[error("{key} must be {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Hosting environment, read from `APP_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Environment::Development => "Development",
            Environment::Staging => "Staging",
            Environment::Production => "Production",
        };
        f.write_str(name)
    }
}

/// The two named connection strings. Both must be present for startup to proceed,
/// whichever one the host platform ends up using.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStrings {
    pub default_connection: String,
    pub mock_db_connection: String,
}

impl ConnectionStrings {
    /// Environment variable holding a named connection string,
    /// e.g. `ConnectionStrings__DefaultConnection`.
    pub fn env_key(name: &str) -> String {
        format!("ConnectionStrings__{}", name)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| {
            lookup(&Self::env_key(name))
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingConnectionString(name))
        };

        Ok(Self {
            default_connection: get(DEFAULT_CONNECTION)?,
            mock_db_connection: get(MOCK_DB_CONNECTION)?,
        })
    }
}

pub struct Config {
    pub connection_strings: ConnectionStrings,
    pub environment: Environment,
    pub server_host: String,
    pub server_port: u16,
    /// Signing key for cookies and account tokens. When unset a per-process key is generated.
    pub jwt_secret: Option<String>,
    pub auto_migrate: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Connection strings are
    /// resolved first so a missing one is reported before anything else is read.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection_strings = ConnectionStrings::from_lookup(&lookup)?;

        let environment = match lookup("APP_ENVIRONMENT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "APP_ENVIRONMENT",
                expected: "Development, Staging or Production",
                value,
            })?,
            None => Environment::default(),
        };

        let server_port = match lookup("SERVER_PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "SERVER_PORT",
                expected: "a port number",
                value,
            })?,
            None => 8080,
        };

        let auto_migrate = match lookup("AUTO_MIGRATE") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                key: "AUTO_MIGRATE",
                expected: "true or false",
                value,
            })?,
            None => false,
        };

        Ok(Self {
            connection_strings,
            environment,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port,
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            auto_migrate,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BOTH: [(&str, &str); 2] = [
        ("ConnectionStrings__DefaultConnection", "postgres://app@localhost/app"),
        ("ConnectionStrings__MockDBConnection", "sqlite::memory:"),
    ];

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&BOTH)).unwrap();

        assert_eq!(
            config.connection_strings.default_connection,
            "postgres://app@localhost/app"
        );
        assert_eq!(config.connection_strings.mock_db_connection, "sqlite::memory:");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
        assert!(config.jwt_secret.is_none());
        assert!(!config.auto_migrate);
    }

    #[test]
    fn test_config_custom_values() {
        let mut pairs = BOTH.to_vec();
        pairs.extend([
            ("APP_ENVIRONMENT", "development"),
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("JWT_SECRET", "secret"),
            ("AUTO_MIGRATE", "true"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert!(config.environment.is_development());
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.jwt_secret.as_deref(), Some("secret"));
        assert!(config.auto_migrate);
    }

    #[test]
    fn test_missing_default_connection() {
        let lookup = lookup_from(&[("ConnectionStrings__MockDBConnection", "sqlite::memory:")]);
        let err = Config::from_lookup(lookup).err().unwrap();

        assert_eq!(err, ConfigError::MissingConnectionString(DEFAULT_CONNECTION));
        assert_eq!(
            err.to_string(),
            "Connection string 'DefaultConnection' not found."
        );
    }

    #[test]
    fn test_missing_mock_db_connection() {
        let lookup = lookup_from(&[(
            "ConnectionStrings__DefaultConnection",
            "postgres://app@localhost/app",
        )]);
        let err = Config::from_lookup(lookup).err().unwrap();

        assert_eq!(err, ConfigError::MissingConnectionString(MOCK_DB_CONNECTION));
        assert_eq!(
            err.to_string(),
            "Connection string 'MockDBConnection' not found."
        );
    }

    #[test]
    fn test_blank_connection_string_counts_as_missing() {
        let lookup = lookup_from(&[
            ("ConnectionStrings__DefaultConnection", "   "),
            ("ConnectionStrings__MockDBConnection", "sqlite::memory:"),
        ]);
        assert_eq!(
            Config::from_lookup(lookup).err(),
            Some(ConfigError::MissingConnectionString(DEFAULT_CONNECTION))
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut pairs = BOTH.to_vec();
        pairs.push(("SERVER_PORT", "eighty"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { key: "SERVER_PORT", .. })
        ));

        let mut pairs = BOTH.to_vec();
        pairs.push(("APP_ENVIRONMENT", "qa"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { key: "APP_ENVIRONMENT", .. })
        ));
    }
}
