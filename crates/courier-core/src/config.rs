//! Configuration and settings management
//!
//! Loads settings from config files and environment variables, and defines
//! the protocol and pacing constants shared by the bot and the helper.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Build the layered configuration source used by every binary.
///
/// Order (later wins): `config/default`, `config/{RUN_MODE}`, `config/local`,
/// `APP__*` environment variables, plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Settings of the helper process (the account with read access to the source channel).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HelperSettings {
    /// MTProto application id.
    pub helper_api_id: i32,
    /// MTProto application hash.
    pub helper_api_hash: String,
    /// File holding the authorized session.
    #[serde(default = "default_session_file")]
    pub helper_session_file: String,
}

fn default_session_file() -> String {
    "helper.session".to_string()
}

impl HelperSettings {
    /// Load helper settings from files and environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if required keys are missing or malformed.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }
}

/// Sentinel identifier selecting the whole channel history.
pub const FETCH_EVERYTHING: &str = "__FETCH_EVERYTHING__";
/// Maximum number of results taken from a free-text search.
pub const SEARCH_RESULT_LIMIT: usize = 100;

/// Ids forwarded per call (transport limit is 100).
pub const FORWARD_BATCH_SIZE: usize = 95;
/// Delay between successive batches.
pub const DELAY_BETWEEN_BATCHES: Duration = Duration::from_secs(2);
/// Retries per batch after the first attempt.
pub const FORWARD_MAX_RETRIES: usize = 2;
/// Added on top of a server-specified flood wait.
pub const FLOOD_WAIT_MARGIN: Duration = Duration::from_secs(2);
/// Flood waits above this abandon the remaining batches.
pub const FLOOD_WAIT_GIVE_UP: Duration = Duration::from_secs(300);
/// Delay before retrying a batch after a non rate-limit error.
pub const TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Pause after START so the bot registers the task before content arrives.
pub const START_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Wall-clock limit for one helper run.
pub const HELPER_TIMEOUT_SECS: u64 = 600;
/// Delay after every relayed item.
pub const RELAY_PACING_MS: u64 = 1500;
/// Lifetime of a task before the reaper closes it.
pub const TASK_DEADLINE_SECS: u64 = 900;
/// Interval between reaper sweeps.
pub const REAPER_INTERVAL_SECS: u64 = 30;
/// Lifetime of a pending action label.
pub const PENDING_LABEL_TTL_SECS: u64 = 3600;

// Transport retry policy for outgoing notices
/// Initial backoff for transport retries, in milliseconds.
pub const TRANSPORT_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for transport retries, in milliseconds.
pub const TRANSPORT_MAX_BACKOFF_MS: u64 = 4000;
/// Number of retries after the first failed attempt.
pub const TRANSPORT_MAX_RETRIES: usize = 3;

/// Truncation applied to upstream error text echoed to users.
pub const ERROR_ECHO_LIMIT: usize = 200;
/// Truncation applied to raw subprocess output echoed to users.
pub const RAW_OUTPUT_ECHO_LIMIT: usize = 300;
