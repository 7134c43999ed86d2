//! Helper dispatch
//!
//! Runs the helper binary for one menu action and turns whatever it printed
//! into the status line shown to the requester.

use courier_core::config::{ERROR_ECHO_LIMIT, RAW_OUTPUT_ECHO_LIMIT};
use courier_core::orchestrator::OrchestrationRequest;
use courier_core::protocol::{OrchestratorResult, ResultStatus};
use courier_core::utils::truncate_str;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Failure to obtain any output from the helper.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The binary could not be started or waited on.
    #[error("failed to run helper: {0}")]
    Spawn(#[from] std::io::Error),
    /// The wall-clock limit elapsed; the child was killed.
    #[error("helper timed out after {0:?}")]
    Timeout(Duration),
    /// The launcher is shutting down.
    #[error("helper slot closed")]
    Closed,
}

/// Captured result of a finished helper run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    /// Trimmed stdout.
    pub stdout: String,
    /// Trimmed stderr.
    pub stderr: String,
}

/// Spawns the helper binary, one run at a time.
#[derive(Debug)]
pub struct HelperLauncher {
    program: PathBuf,
    timeout: Duration,
    slot: Semaphore,
}

impl HelperLauncher {
    /// Launcher for the binary at `program` with a per-run wall-clock limit.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            slot: Semaphore::new(1),
        }
    }

    /// Path of the helper binary.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the helper for `request` and capture its output.
    ///
    /// Runs are serialized: a second call waits until the first one exits,
    /// so helper streams never interleave in the bot inbox.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Spawn`] if the binary cannot be run and
    /// [`LaunchError::Timeout`] if it outlives the limit.
    pub async fn launch(&self, request: &OrchestrationRequest) -> Result<HelperOutput, LaunchError> {
        let _permit = self.slot.acquire().await.map_err(|_| LaunchError::Closed)?;

        info!(
            program = %self.program.display(),
            source = %request.source_channel,
            identifier = %request.identifier,
            bot = %request.bot_handle,
            requester = request.requester,
            "Launching helper"
        );

        let mut cmd = Command::new(&self.program);
        cmd.arg(&request.source_channel)
            .arg(&request.identifier)
            .arg(&request.bot_handle)
            .arg(request.requester.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| LaunchError::Timeout(self.timeout))??;

        let result = HelperOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        info!(code = ?result.code, stdout = %result.stdout, "Helper finished");
        if !result.stderr.is_empty() {
            if result.code == Some(0) {
                debug!(stderr = %result.stderr, "Helper stderr");
            } else {
                error!(stderr = %result.stderr, "Helper stderr");
            }
        }
        Ok(result)
    }
}

/// Status text shown while the helper runs.
#[must_use]
pub fn requesting_text(label: &str) -> String {
    format!("⏳ Requesting: {label}...\nHelper account will process and send items.")
}

/// What to tell the requester once a helper run is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Edited into the menu message.
    Status {
        /// Text to show.
        text: String,
        /// Whether the run failed before any handshake.
        failed: bool,
    },
    /// Sent as a fresh message; the menu message may be too old to edit.
    Notice {
        /// Text to send.
        text: String,
    },
}

impl DispatchOutcome {
    /// Map a helper run to the requester-facing outcome.
    #[must_use]
    pub fn from_launch(result: &Result<HelperOutput, LaunchError>, label: &str) -> Self {
        match result {
            Ok(output) => Self::from_output(output, label),
            Err(LaunchError::Timeout(_)) => {
                error!(label = %label, "Helper timed out");
                Self::Notice {
                    text: format!("⏳ Helper script for '{label}' timed out."),
                }
            }
            Err(e) => {
                error!(label = %label, error = %e, "Helper could not be run");
                Self::Notice {
                    text: "🚨 Unexpected bot error.".to_string(),
                }
            }
        }
    }

    fn from_output(output: &HelperOutput, label: &str) -> Self {
        match OrchestratorResult::from_stdout(&output.stdout) {
            Ok(result) if result.status == ResultStatus::Error => Self::Status {
                text: format!("⚠️ Error: {}", truncate_str(&result.message, ERROR_ECHO_LIMIT)),
                failed: true,
            },
            Ok(result) if result.total_found == 0 => Self::Status {
                text: format!("ℹ️ No messages found for '{label}'."),
                failed: false,
            },
            Ok(result) => Self::Status {
                text: format!(
                    "Helper has initiated transfer of {} items. I will relay them shortly.",
                    result.total_found
                ),
                failed: false,
            },
            Err(e) => {
                warn!(
                    error = %e,
                    stdout = %output.stdout,
                    stderr = %output.stderr,
                    "Helper output is not a valid result"
                );
                Self::Status {
                    text: Self::raw_fallback(output, label),
                    failed: true,
                }
            }
        }
    }

    fn raw_fallback(output: &HelperOutput, label: &str) -> String {
        if output.code != Some(0) {
            let shown = [&output.stderr, &output.stdout]
                .into_iter()
                .find(|s| !s.is_empty())
                .map_or("Unknown error.", String::as_str);
            return format!(
                "⚠️ Error processing request: {}",
                truncate_str(shown, RAW_OUTPUT_ECHO_LIMIT)
            );
        }
        if output.stdout.is_empty() && output.stderr.is_empty() {
            return format!(
                "Helper script for '{label}' finished with no output. Please check logs."
            );
        }
        "Helper script finished, but status is unclear.".to_string()
    }

    /// Text to deliver.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Status { text, .. } | Self::Notice { text } => text,
        }
    }

    /// Whether no START will follow, so the pending label can go.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        match self {
            Self::Status { failed, .. } => *failed,
            Self::Notice { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: i32, stdout: &str, stderr: &str) -> Result<HelperOutput, LaunchError> {
        Ok(HelperOutput {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    fn text_for(result: &Result<HelperOutput, LaunchError>) -> String {
        DispatchOutcome::from_launch(result, "Highlights").text().to_string()
    }

    #[test]
    fn test_success_result() {
        let json = OrchestratorResult::success(3, 3).to_json_line();
        let outcome = DispatchOutcome::from_launch(&output(0, &json, ""), "Highlights");
        assert!(!outcome.is_failure());
        insta::assert_snapshot!(outcome.text(), @"Helper has initiated transfer of 3 items. I will relay them shortly.");
    }

    #[test]
    fn test_nothing_found() {
        let json = OrchestratorResult::success(0, 0).to_json_line();
        insta::assert_snapshot!(text_for(&output(0, &json, "")), @"ℹ️ No messages found for 'Highlights'.");
    }

    #[test]
    fn test_error_message_is_truncated() {
        let long = "x".repeat(500);
        let json = OrchestratorResult::error(long, 0, 0).to_json_line();
        let outcome = DispatchOutcome::from_launch(&output(1, &json, ""), "Highlights");
        assert!(outcome.is_failure());
        assert_eq!(
            outcome.text().chars().count(),
            "⚠️ Error: ".chars().count() + ERROR_ECHO_LIMIT
        );
    }

    #[test]
    fn test_unparseable_output_falls_back_to_raw_text() {
        insta::assert_snapshot!(
            text_for(&output(1, "", "Traceback: boom")),
            @"⚠️ Error processing request: Traceback: boom"
        );
        insta::assert_snapshot!(
            text_for(&output(2, "", "")),
            @"⚠️ Error processing request: Unknown error."
        );
        insta::assert_snapshot!(
            text_for(&output(0, "", "")),
            @"Helper script for 'Highlights' finished with no output. Please check logs."
        );
        insta::assert_snapshot!(
            text_for(&output(0, "done", "")),
            @"Helper script finished, but status is unclear."
        );
    }

    #[test]
    fn test_timeout_is_a_fresh_notice() {
        let outcome = DispatchOutcome::from_launch(
            &Err(LaunchError::Timeout(Duration::from_secs(600))),
            "Highlights",
        );
        assert!(matches!(outcome, DispatchOutcome::Notice { .. }));
        insta::assert_snapshot!(outcome.text(), @"⏳ Helper script for 'Highlights' timed out.");
    }

    #[test]
    fn test_requesting_text() {
        insta::assert_snapshot!(requesting_text("Goals"), @r"
        ⏳ Requesting: Goals...
        Helper account will process and send items.
        ");
    }

    #[cfg(unix)]
    mod process {
        use crate::dispatcher::{HelperLauncher, LaunchError};
        use courier_core::orchestrator::OrchestrationRequest;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use std::time::Duration;

        fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("helper.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))
                .unwrap_or_else(|e| panic!("write script: {e}"));
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .unwrap_or_else(|e| panic!("chmod script: {e}"));
            path
        }

        fn request() -> OrchestrationRequest {
            OrchestrationRequest {
                source_channel: "-1001".into(),
                identifier: "1 2 3".into(),
                bot_handle: "courier_bot".into(),
                requester: -5,
            }
        }

        #[tokio::test]
        async fn test_launch_passes_positional_args() -> Result<(), Box<dyn std::error::Error>> {
            let dir = tempfile::tempdir()?;
            let program = script(&dir, r#"echo "$1|$2|$3|$4"; echo "log line" >&2"#);
            let launcher = HelperLauncher::new(program, Duration::from_secs(10));

            let out = launcher.launch(&request()).await?;
            assert_eq!(out.code, Some(0));
            assert_eq!(out.stdout, "-1001|1 2 3|courier_bot|-5");
            assert_eq!(out.stderr, "log line");
            Ok(())
        }

        #[tokio::test]
        async fn test_launch_times_out() -> Result<(), Box<dyn std::error::Error>> {
            let dir = tempfile::tempdir()?;
            let program = script(&dir, "sleep 5");
            let launcher = HelperLauncher::new(program, Duration::from_millis(200));

            let result = launcher.launch(&request()).await;
            assert!(matches!(result, Err(LaunchError::Timeout(_))));
            Ok(())
        }

        #[tokio::test]
        async fn test_missing_binary_is_a_spawn_error() {
            let launcher = HelperLauncher::new("/nonexistent/courier-helper", Duration::from_secs(1));
            let result = launcher.launch(&request()).await;
            assert!(matches!(result, Err(LaunchError::Spawn(_))));
        }
    }
}
