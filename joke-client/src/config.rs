use std::time::Duration;

use serde::Deserialize;

/// The public JokeAPI endpoint.
pub const DEFAULT_BASE_URL: &str = "https://v2.jokeapi.dev";
/// Time budget of a call that sets none of its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Sent as `User-Agent` with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("joke-client/", env!("CARGO_PKG_VERSION"));

/// Serializable client settings.
///
/// Every field has a default, so an empty document is a valid config:
///
/// ```rust
/// let config: joke_client::ClientConfig = serde_json::from_str("{}").unwrap();
/// assert_eq!(config.timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub admission: AdmissionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            admission: AdmissionConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How requests are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum AdmissionConfig {
    /// Admit immediately or fail with `AdmissionDenied`.
    FixedWindow {
        #[serde(default = "default_capacity")]
        capacity: usize,
        #[serde(default = "default_window_ms")]
        window_ms: u64,
    },
    /// Queue requests and run them one at a time as the reservoir allows.
    Scheduled {
        #[serde(default = "default_reservoir")]
        capacity: usize,
        #[serde(default = "default_window_ms")]
        window_ms: u64,
        #[serde(default = "default_min_spacing_ms")]
        min_spacing_ms: u64,
    },
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self::FixedWindow {
            capacity: default_capacity(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_capacity() -> usize {
    10
}

fn default_reservoir() -> usize {
    120
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_min_spacing_ms() -> u64 {
    100
}
