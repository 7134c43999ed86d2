//! Telegram transport settings.

use config::ConfigError;
use courier_core::config::{
    HELPER_TIMEOUT_SECS, PENDING_LABEL_TTL_SECS, REAPER_INTERVAL_SECS, RELAY_PACING_MS,
    TASK_DEADLINE_SECS,
};
use courier_core::menu::MenuConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// File name of the helper binary looked up next to the bot executable.
pub const HELPER_BINARY_NAME: &str = "courier-helper";

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Comma-separated list of allowed user IDs. Empty means everyone.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,
    /// User id of the helper account; its messages are helper traffic.
    pub helper_user_id: i64,
    /// Path of the menu/action YAML file.
    #[serde(default = "default_menu_config_path")]
    pub menu_config_path: String,
    /// Explicit helper binary path.
    pub helper_binary_path: Option<String>,
    /// Wall-clock limit of one helper run.
    #[serde(default = "default_helper_timeout_secs")]
    pub helper_timeout_secs: u64,
    /// Pause after every relayed item.
    #[serde(default = "default_relay_pacing_ms")]
    pub relay_pacing_ms: u64,
    /// Lifetime of a relay task.
    #[serde(default = "default_task_deadline_secs")]
    pub task_deadline_secs: u64,
    /// Period of the deadline sweep.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
    /// Lifetime of a pending action label.
    #[serde(default = "default_pending_label_ttl_secs")]
    pub pending_label_ttl_secs: u64,
}

fn default_menu_config_path() -> String {
    "menu_config.yaml".to_string()
}

const fn default_helper_timeout_secs() -> u64 {
    HELPER_TIMEOUT_SECS
}

const fn default_relay_pacing_ms() -> u64 {
    RELAY_PACING_MS
}

const fn default_task_deadline_secs() -> u64 {
    TASK_DEADLINE_SECS
}

const fn default_reaper_interval_secs() -> u64 {
    REAPER_INTERVAL_SECS
}

const fn default_pending_label_ttl_secs() -> u64 {
    PENDING_LABEL_TTL_SECS
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            allowed_users_str: None,
            helper_user_id: 0,
            menu_config_path: default_menu_config_path(),
            helper_binary_path: None,
            helper_timeout_secs: HELPER_TIMEOUT_SECS,
            relay_pacing_ms: RELAY_PACING_MS,
            task_deadline_secs: TASK_DEADLINE_SECS,
            reaper_interval_secs: REAPER_INTERVAL_SECS,
            pending_label_ttl_secs: PENDING_LABEL_TTL_SECS,
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        courier_core::config::build_config()?.try_deserialize()
    }

    /// Returns the set of allowed user IDs.
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `user_id` may use the menu. An empty allow-list admits everyone.
    #[must_use]
    pub fn is_allowed(&self, user_id: i64) -> bool {
        let allowed = self.allowed_users();
        allowed.is_empty() || allowed.contains(&user_id)
    }

    /// Helper binary to launch: the configured path, else `courier-helper`
    /// next to the running executable, else whatever `PATH` resolves.
    #[must_use]
    pub fn helper_binary(&self) -> PathBuf {
        if let Some(path) = self.helper_binary_path.as_deref().filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(HELPER_BINARY_NAME)))
            .unwrap_or_else(|| PathBuf::from(HELPER_BINARY_NAME))
    }

    /// Helper run limit.
    #[must_use]
    pub const fn helper_timeout(&self) -> Duration {
        Duration::from_secs(self.helper_timeout_secs)
    }

    /// Relay pacing.
    #[must_use]
    pub const fn relay_pacing(&self) -> Duration {
        Duration::from_millis(self.relay_pacing_ms)
    }

    /// Relay task lifetime.
    #[must_use]
    pub const fn task_deadline(&self) -> Duration {
        Duration::from_secs(self.task_deadline_secs)
    }

    /// Deadline sweep period.
    #[must_use]
    pub const fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
    /// Menus and actions offered to requesters.
    pub menu: Arc<MenuConfig>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(telegram: TelegramSettings, menu: MenuConfig) -> Self {
        Self {
            telegram: Arc::new(telegram),
            menu: Arc::new(menu),
        }
    }
}

/// Cooldown period (seconds) between "Access Denied" messages for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;
/// Capacity of the pending label store.
pub const PENDING_LABEL_MAX_SIZE: u64 = 10_000;

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    std::env::var("UNAUTHORIZED_COOLDOWN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    std::env::var("UNAUTHORIZED_CACHE_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(UNAUTHORIZED_CACHE_MAX_SIZE)
}
