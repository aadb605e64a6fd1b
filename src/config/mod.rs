//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// Allowed client origins for CORS, comma-separated
    pub client_origin: String,
    /// Public base URL, used to build WebSocket URLs
    pub public_base_url: String,

    /// Upper bound on concurrently running sessions
    pub max_sessions: usize,
    /// Round wins needed to take a match
    pub rounds_to_win: u32,
    /// Seconds a session may sit without connections before it closes
    pub session_idle_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),

            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),

            max_sessions: parse_or(&lookup, "MAX_SESSIONS", 64)?,
            rounds_to_win: parse_or(&lookup, "ROUNDS_TO_WIN", 2)?,
            session_idle_secs: parse_or(&lookup, "SESSION_IDLE_SECS", 60)?,
        })
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// WebSocket URL a client uses to attach to a session
    pub fn session_ws_url(&self, session_id: &uuid::Uuid) -> String {
        let base = self
            .public_base_url
            .trim_end_matches('/')
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{}/sessions/{}/ws", base, session_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            client_origin: "http://localhost:5173".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            max_sessions: 64,
            rounds_to_win: 2,
            session_idle_secs: 60,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.max_sessions, 64);
        assert_eq!(config.rounds_to_win, 2);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = from_pairs(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:7000")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = from_pairs(&[("MAX_SESSIONS", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("MAX_SESSIONS")));
        assert!(matches!(
            from_pairs(&[("SERVER_ADDR", "nope")]),
            Err(ConfigError::InvalidAddress)
        ));
    }

    #[test]
    fn ws_url_swaps_scheme() {
        let id = uuid::Uuid::nil();
        let config = from_pairs(&[("PUBLIC_BASE_URL", "https://fight.example.com/")]).unwrap();
        assert_eq!(
            config.session_ws_url(&id),
            format!("wss://fight.example.com/sessions/{}/ws", id)
        );
    }
}
