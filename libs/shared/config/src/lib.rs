use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "http://localhost:8080/query";
pub const DEFAULT_TOKEN_STORE_PATH: &str = ".helpmeclean/session.json";
pub const DEFAULT_SIGN_IN_ROLE: &str = "CLIENT";
pub const DEFAULT_EMPTY_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_ERROR_RETRY_DELAY_MS: u64 = 2000;
pub const DEFAULT_GRAPHQL_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub graphql_endpoint: String,
    pub token_store_path: String,
    pub sign_in_role: String,
    pub empty_retry_delay_ms: u64,
    pub error_retry_delay_ms: u64,
    pub graphql_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            token_store_path: DEFAULT_TOKEN_STORE_PATH.to_string(),
            sign_in_role: DEFAULT_SIGN_IN_ROLE.to_string(),
            empty_retry_delay_ms: DEFAULT_EMPTY_RETRY_DELAY_MS,
            error_retry_delay_ms: DEFAULT_ERROR_RETRY_DELAY_MS,
            graphql_timeout_secs: DEFAULT_GRAPHQL_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            graphql_endpoint: env::var("GRAPHQL_ENDPOINT")
                .unwrap_or_else(|_| {
                    warn!("GRAPHQL_ENDPOINT not set, using default");
                    DEFAULT_GRAPHQL_ENDPOINT.to_string()
                }),
            token_store_path: env::var("TOKEN_STORE_PATH")
                .unwrap_or_else(|_| {
                    warn!("TOKEN_STORE_PATH not set, using default");
                    DEFAULT_TOKEN_STORE_PATH.to_string()
                }),
            sign_in_role: env::var("SIGN_IN_ROLE")
                .unwrap_or_else(|_| {
                    warn!("SIGN_IN_ROLE not set, signing in as {}", DEFAULT_SIGN_IN_ROLE);
                    DEFAULT_SIGN_IN_ROLE.to_string()
                }),
            empty_retry_delay_ms: u64_from_env(
                "SESSION_EMPTY_RETRY_DELAY_MS",
                DEFAULT_EMPTY_RETRY_DELAY_MS,
            ),
            error_retry_delay_ms: u64_from_env(
                "SESSION_ERROR_RETRY_DELAY_MS",
                DEFAULT_ERROR_RETRY_DELAY_MS,
            ),
            graphql_timeout_secs: u64_from_env(
                "GRAPHQL_TIMEOUT_SECS",
                DEFAULT_GRAPHQL_TIMEOUT_SECS,
            ),
        };

        if !config.is_configured() {
            warn!("Session client not fully configured - endpoint or token path is empty");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.graphql_endpoint.is_empty()
            && !self.token_store_path.is_empty()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            empty_retry_delay: Duration::from_millis(self.empty_retry_delay_ms),
            error_retry_delay: Duration::from_millis(self.error_retry_delay_ms),
        }
    }

    pub fn graphql_timeout(&self) -> Duration {
        Duration::from_secs(self.graphql_timeout_secs)
    }
}

/// Retry timing for the session fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay before re-asking `me` after an empty answer while a token is held.
    pub empty_retry_delay: Duration,
    /// Delay before re-asking `me` after a transient transport failure.
    pub error_retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            empty_retry_delay: Duration::from_millis(DEFAULT_EMPTY_RETRY_DELAY_MS),
            error_retry_delay: Duration::from_millis(DEFAULT_ERROR_RETRY_DELAY_MS),
        }
    }
}

fn u64_from_env(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} is not a number ({}), using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
