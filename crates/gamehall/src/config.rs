//! Server configuration.
//!
//! Every field has a default. Environment variables prefixed `GAMEHALL_`
//! override them, with `__` separating nested keys:
//!
//! ```text
//! GAMEHALL_PORT=9000
//! GAMEHALL_FRONTEND_HOST=https://play.example.com
//! GAMEHALL_LOBBY__INBOUND_CAPACITY=128
//! ```

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use gamehall_lobby::LobbyConfig;
use serde::{Deserialize, Serialize};

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "GAMEHALL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub host: String,

    pub port: u16,

    /// Value of `Access-Control-Allow-Origin` on every HTTP response.
    pub frontend_host: String,

    /// Seconds between keepalive pings on a joined connection. 0 disables.
    pub keepalive_secs: u64,

    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,

    pub lobby: LobbyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            frontend_host: "*".to_string(),
            keepalive_secs: 30,
            outbound_capacity: 32,
            lobby: LobbyConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// `host:port`, as passed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Keepalive period, or `None` if disabled.
    pub fn keepalive(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_environment(
            Environment::with_prefix(ENV_PREFIX).source(Some(source)),
        )
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.keepalive(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_environment_overrides() {
        let config = load(&[
            ("GAMEHALL_PORT", "9000"),
            ("GAMEHALL_FRONTEND_HOST", "https://play.example.com"),
            ("GAMEHALL_KEEPALIVE_SECS", "0"),
            ("GAMEHALL_LOBBY__INBOUND_CAPACITY", "128"),
            ("OTHER_PORT", "1"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.frontend_host, "https://play.example.com");
        assert_eq!(config.keepalive(), None);
        assert_eq!(config.lobby.inbound_capacity, 128);
        assert_eq!(config.lobby.fanout_capacity, 64);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_bad_number_is_an_error() {
        assert!(load(&[("GAMEHALL_PORT", "eighty")]).is_err());
    }
}
