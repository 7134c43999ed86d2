//! Control protocol between the helper and the bot.
//!
//! Two kinds of messages cross the process boundary:
//! - control lines sent by the helper account into the bot's inbox
//!   (`CONTROL_TASK_START:<requester>:<expected>` / `CONTROL_TASK_END:<requester>:<forwarded>`);
//! - one JSON result line printed by the helper on stdout for the dispatcher.

// lazy_regex! relies on once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix shared by every control line.
pub const CONTROL_PREFIX: &str = "CONTROL_TASK_";

/// Full control line grammar.
static RE_CONTROL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"^CONTROL_TASK_(START|END):(-?[0-9]+):([0-9]+)$");

/// Errors raised while decoding a control line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The text does not carry the control prefix at all.
    #[error("not a control message")]
    NotControl,
    /// The text carries the control prefix but breaks the grammar.
    #[error("malformed control message: {0}")]
    Malformed(String),
}

/// A decoded control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// A task for `requester` opens with `expected` items.
    Start {
        /// Chat id of the requester.
        requester: i64,
        /// Number of items the helper is about to forward.
        expected: u64,
    },
    /// The helper finished forwarding for `requester`.
    End {
        /// Chat id of the requester.
        requester: i64,
        /// Number of items actually forwarded.
        forwarded: u64,
    },
}

impl ControlMessage {
    /// Requester this control line refers to.
    #[must_use]
    pub const fn requester(&self) -> i64 {
        match self {
            Self::Start { requester, .. } | Self::End { requester, .. } => *requester,
        }
    }

    /// Whether a text looks like it was meant to be a control line.
    #[must_use]
    pub fn has_control_prefix(text: &str) -> bool {
        text.trim_start().starts_with(CONTROL_PREFIX)
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start {
                requester,
                expected,
            } => write!(f, "{CONTROL_PREFIX}START:{requester}:{expected}"),
            Self::End {
                requester,
                forwarded,
            } => write!(f, "{CONTROL_PREFIX}END:{requester}:{forwarded}"),
        }
    }
}

impl FromStr for ControlMessage {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        if !Self::has_control_prefix(trimmed) {
            return Err(ProtocolError::NotControl);
        }

        let caps = RE_CONTROL
            .captures(trimmed)
            .ok_or_else(|| ProtocolError::Malformed(trimmed.to_string()))?;

        let malformed = || ProtocolError::Malformed(trimmed.to_string());
        let requester: i64 = caps[2].parse().map_err(|_| malformed())?;
        let count: u64 = caps[3].parse().map_err(|_| malformed())?;

        match &caps[1] {
            "START" => Ok(Self::Start {
                requester,
                expected: count,
            }),
            _ => Ok(Self::End {
                requester,
                forwarded: count,
            }),
        }
    }
}

/// Outcome field of the orchestrator result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// The run completed its handshake.
    Success,
    /// The run failed; `message` explains why.
    Error,
}

/// The single structured record printed by the helper on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorResult {
    /// Success or error.
    pub status: ResultStatus,
    /// Human readable summary.
    pub message: String,
    /// Items forwarded into the bot inbox.
    #[serde(default)]
    pub count_sent_to_bot: u64,
    /// Items the resolver selected.
    #[serde(default)]
    pub total_found: u64,
}

impl OrchestratorResult {
    /// Successful run.
    #[must_use]
    pub fn success(count_sent_to_bot: u64, total_found: u64) -> Self {
        Self {
            status: ResultStatus::Success,
            message: format!("Task initiated. Forwarded {count_sent_to_bot}/{total_found} items."),
            count_sent_to_bot,
            total_found,
        }
    }

    /// Failed run with whatever counts were accumulated.
    #[must_use]
    pub fn error(message: impl Into<String>, count_sent_to_bot: u64, total_found: u64) -> Self {
        Self {
            status: ResultStatus::Error,
            message: message.into(),
            count_sent_to_bot,
            total_found,
        }
    }

    /// Whether the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Serialize as one JSON line (no trailing newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"error","message":"result serialization failed: {e}"}}"#)
        })
    }

    /// Parse captured stdout. The last non-empty line is taken as the result.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if no line decodes into a result.
    pub fn from_stdout(stdout: &str) -> Result<Self, serde_json::Error> {
        let line = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .next_back()
            .unwrap_or_default();
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_and_end() {
        assert_eq!(
            "CONTROL_TASK_START:42:5".parse::<ControlMessage>(),
            Ok(ControlMessage::Start {
                requester: 42,
                expected: 5
            })
        );
        assert_eq!(
            "CONTROL_TASK_END:-1001:0\n".parse::<ControlMessage>(),
            Ok(ControlMessage::End {
                requester: -1001,
                forwarded: 0
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "CONTROL_TASK_START:42",
            "CONTROL_TASK_START:42:5:7",
            "CONTROL_TASK_START:abc:5",
            "CONTROL_TASK_END:42:-3",
            "CONTROL_TASK_PAUSE:42:5",
            "CONTROL_TASK_START:42:99999999999999999999999",
        ] {
            assert!(
                matches!(
                    text.parse::<ControlMessage>(),
                    Err(ProtocolError::Malformed(_))
                ),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_ignores_plain_text() {
        assert_eq!(
            "hello CONTROL_TASK_START:1:1".parse::<ControlMessage>(),
            Err(ProtocolError::NotControl)
        );
    }

    #[test]
    fn test_display_matches_wire_format() {
        let start = ControlMessage::Start {
            requester: 7,
            expected: 3,
        };
        assert_eq!(start.to_string(), "CONTROL_TASK_START:7:3");
        assert_eq!(start.to_string().parse::<ControlMessage>(), Ok(start));
        assert_eq!(start.requester(), 7);
    }

    #[test]
    fn test_result_json_shape() {
        let line = OrchestratorResult::success(3, 4).to_json_line();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap_or_default();
        assert_eq!(value["status"], "success");
        assert_eq!(value["count_sent_to_bot"], 3);
        assert_eq!(value["total_found"], 4);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_result_from_stdout_takes_last_line() {
        let stdout = "noise\n{\"status\":\"error\",\"message\":\"boom\"}\n\n";
        let result = OrchestratorResult::from_stdout(stdout);
        assert!(matches!(
            result,
            Ok(OrchestratorResult {
                status: ResultStatus::Error,
                count_sent_to_bot: 0,
                total_found: 0,
                ..
            })
        ));
        assert!(OrchestratorResult::from_stdout("").is_err());
        assert!(OrchestratorResult::from_stdout("Traceback ...").is_err());
    }
}
