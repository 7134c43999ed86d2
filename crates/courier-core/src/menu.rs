//! Declarative menu and action table.
//!
//! Loaded once at startup from a YAML file:
//!
//! ```yaml
//! menus:
//!   root:
//!     - label: "⚽ Highlights"
//!       callback: "action:highlights"
//!     - label: "More ▶"
//!       callback: "navigate:extras_submenu"
//! actions:
//!   highlights:
//!     button_label: "Highlights"
//!     private_channel_id: -1001234567890
//!     messages_identifier: "10 11 12"
//! ```

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Id of the menu rendered by `/start`.
pub const ROOT_MENU: &str = "root";
/// Telegram's limit on inline callback data, in bytes.
pub const CALLBACK_DATA_LIMIT: usize = 64;

/// Errors that make a menu file unusable.
#[derive(Error, Debug)]
pub enum MenuError {
    /// File could not be read
    #[error("Menu file error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML syntax or a required top-level section is missing
    #[error("Menu YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// No `root` menu
    #[error("Menu configuration has no '{ROOT_MENU}' menu")]
    MissingRoot,
    /// Callback outside the `navigate:`/`action:`/`noop` grammar
    #[error("Invalid callback '{0}'")]
    InvalidCallback(String),
    /// Callback longer than the transport allows
    #[error("Callback '{0}' exceeds {CALLBACK_DATA_LIMIT} bytes")]
    CallbackTooLong(String),
}

/// What pressing a menu button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCallback {
    /// Re-render the message with another menu.
    Navigate(String),
    /// Run an action from the action table.
    Action(String),
    /// Decorative button.
    Noop,
}

impl FromStr for MenuCallback {
    type Err = MenuError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        if data == "noop" {
            return Ok(Self::Noop);
        }
        match data.split_once(':') {
            Some(("navigate", key)) if !key.is_empty() => Ok(Self::Navigate(key.to_string())),
            Some(("action", key)) if !key.is_empty() => Ok(Self::Action(key.to_string())),
            _ => Err(MenuError::InvalidCallback(data.to_string())),
        }
    }
}

/// A button of a menu.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MenuEntry {
    /// Button text.
    pub label: String,
    /// Raw callback data (`navigate:<menu>`, `action:<key>` or `noop`).
    pub callback: String,
}

/// A fetch-and-relay action.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ActionConfig {
    /// Label used in status messages.
    #[serde(default = "default_button_label")]
    pub button_label: String,
    /// Source channel identifier handed to the helper.
    #[serde(deserialize_with = "string_or_number")]
    pub private_channel_id: String,
    /// Resolution identifier handed to the helper.
    #[serde(deserialize_with = "string_or_number")]
    pub messages_identifier: String,
}

fn default_button_label() -> String {
    "the requested content".to_string()
}

/// YAML turns `-100123` or `42` into numbers; both fields are opaque strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

/// The whole menu file.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuConfig {
    /// Menu id → ordered buttons.
    pub menus: HashMap<String, Vec<MenuEntry>>,
    /// Action key → action.
    pub actions: HashMap<String, ActionConfig>,
}

impl MenuConfig {
    /// Load and validate a menu file.
    ///
    /// # Errors
    ///
    /// Returns a `MenuError` if the file is missing, malformed or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MenuError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Parse and validate menu YAML.
    ///
    /// # Errors
    ///
    /// Returns a `MenuError` if the YAML is malformed or invalid.
    pub fn from_yaml_str(raw: &str) -> Result<Self, MenuError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MenuError> {
        if !self.menus.contains_key(ROOT_MENU) {
            return Err(MenuError::MissingRoot);
        }
        for (menu_id, entries) in &self.menus {
            for entry in entries {
                if entry.callback.len() > CALLBACK_DATA_LIMIT {
                    return Err(MenuError::CallbackTooLong(entry.callback.clone()));
                }
                match entry.callback.parse::<MenuCallback>()? {
                    MenuCallback::Navigate(target) if !self.menus.contains_key(&target) => {
                        warn!(menu = %menu_id, target = %target, "Menu button navigates to an unknown menu");
                    }
                    MenuCallback::Action(key) if !self.actions.contains_key(&key) => {
                        warn!(menu = %menu_id, action = %key, "Menu button points to an unconfigured action");
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Buttons of a menu.
    #[must_use]
    pub fn menu(&self, id: &str) -> Option<&[MenuEntry]> {
        self.menus.get(id).map(Vec::as_slice)
    }

    /// Action by key.
    #[must_use]
    pub fn action(&self, key: &str) -> Option<&ActionConfig> {
        self.actions.get(key)
    }
}

/// Human title of a menu id: `root` → "Main Menu", `top_clips_submenu` → "Top Clips".
#[must_use]
pub fn menu_title(id: &str) -> String {
    if id == ROOT_MENU {
        return "Main Menu".to_string();
    }
    id.replace("_submenu", "")
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
menus:
  root:
    - label: "Highlights"
      callback: "action:highlights"
    - label: "More"
      callback: "navigate:extras_submenu"
  extras_submenu:
    - label: "Everything"
      callback: "action:everything"
    - label: "-----"
      callback: "noop"
    - label: "Back"
      callback: "navigate:root"
actions:
  highlights:
    button_label: "Highlights"
    private_channel_id: -1001234567890
    messages_identifier: "10 11 12"
  everything:
    private_channel_id: "@archive"
    messages_identifier: 42
"#;

    #[test]
    fn test_load_sample() -> Result<(), MenuError> {
        let config = MenuConfig::from_yaml_str(SAMPLE)?;
        let root = config.menu(ROOT_MENU).unwrap_or_default();
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].label, "Highlights");

        let action = config.action("highlights");
        assert_eq!(
            action.map(|a| a.private_channel_id.as_str()),
            Some("-1001234567890")
        );
        let everything = config.action("everything");
        assert_eq!(
            everything.map(|a| (a.button_label.as_str(), a.messages_identifier.as_str())),
            Some(("the requested content", "42"))
        );
        Ok(())
    }

    #[test]
    fn test_missing_sections_are_fatal() {
        assert!(matches!(
            MenuConfig::from_yaml_str("menus:\n  root: []\n"),
            Err(MenuError::Yaml(_))
        ));
        assert!(matches!(
            MenuConfig::from_yaml_str("actions: {}\n"),
            Err(MenuError::Yaml(_))
        ));
        assert!(matches!(
            MenuConfig::from_yaml_str("menus:\n  other: []\nactions: {}\n"),
            Err(MenuError::MissingRoot)
        ));
    }

    #[test]
    fn test_invalid_callbacks_are_fatal() {
        let bad = "menus:\n  root:\n    - label: x\n      callback: \"jump:root\"\nactions: {}\n";
        assert!(matches!(
            MenuConfig::from_yaml_str(bad),
            Err(MenuError::InvalidCallback(_))
        ));

        let long = format!(
            "menus:\n  root:\n    - label: x\n      callback: \"action:{}\"\nactions: {{}}\n",
            "a".repeat(70)
        );
        assert!(matches!(
            MenuConfig::from_yaml_str(&long),
            Err(MenuError::CallbackTooLong(_))
        ));
    }

    #[test]
    fn test_callback_parsing() {
        assert_eq!(
            "navigate:root".parse::<MenuCallback>().ok(),
            Some(MenuCallback::Navigate("root".into()))
        );
        assert_eq!(
            "action:a:b".parse::<MenuCallback>().ok(),
            Some(MenuCallback::Action("a:b".into()))
        );
        assert_eq!("noop".parse::<MenuCallback>().ok(), Some(MenuCallback::Noop));
        assert!("action:".parse::<MenuCallback>().is_err());
        assert!("garbage".parse::<MenuCallback>().is_err());
    }

    #[test]
    fn test_menu_title() {
        assert_eq!(menu_title("root"), "Main Menu");
        assert_eq!(menu_title("top_clips_submenu"), "Top Clips");
        assert_eq!(menu_title("extras"), "Extras");
    }
}
