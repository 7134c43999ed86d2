//! Relay engine
//!
//! Consumes everything the helper account posts into the bot inbox, keeps
//! the task registry in step with the control lines and relays content items
//! to the requester under the feed cursor.

use async_trait::async_trait;
use courier_core::config::{RELAY_PACING_MS, TASK_DEADLINE_SECS};
use courier_core::protocol::ControlMessage;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::pending_labels::PendingLabels;
use crate::task_registry::{RelayProgress, RequesterId, Task, TaskRegistry};

/// Label used when a START arrives with no pending label for the requester.
pub const DEFAULT_LABEL: &str = "your request";

/// A content item as received from the helper, ready to be re-sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    /// Video by file id.
    Video {
        /// Transport file id.
        file_id: String,
        /// Caption carried over.
        caption: Option<String>,
    },
    /// Generic document by file id.
    Document {
        /// Transport file id.
        file_id: String,
        /// Caption carried over.
        caption: Option<String>,
    },
    /// Photo (largest size) by file id.
    Photo {
        /// Transport file id.
        file_id: String,
        /// Caption carried over.
        caption: Option<String>,
    },
    /// Plain text.
    Text {
        /// Message body.
        text: String,
    },
    /// Anything the relay cannot re-send (stickers, audio, polls, ...).
    Unsupported {
        /// Short description of the item kind.
        kind: String,
    },
}

impl ContentItem {
    /// Short kind name used in logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Video { .. } => "video",
            Self::Document { .. } => "document",
            Self::Photo { .. } => "photo",
            Self::Text { .. } => "text",
            Self::Unsupported { kind } => kind,
        }
    }
}

/// Helper traffic, decoded once at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A well-formed control line.
    Control(ControlMessage),
    /// An item to relay.
    Content(ContentItem),
    /// Text carrying the control prefix that breaks the grammar.
    Malformed(String),
}

impl Inbound {
    /// Classify an item the helper identity posted directly.
    ///
    /// Only text matching the full control grammar becomes a control
    /// message; text that merely starts with the prefix is malformed and
    /// never relayed.
    #[must_use]
    pub fn from_helper(item: ContentItem) -> Self {
        match item {
            ContentItem::Text { text } if ControlMessage::has_control_prefix(&text) => {
                match text.parse::<ControlMessage>() {
                    Ok(control) => Self::Control(control),
                    Err(_) => Self::Malformed(text),
                }
            }
            other => Self::Content(other),
        }
    }

    /// Classify an item the helper forwarded from a channel.
    ///
    /// Forwarded posts are always content, whatever their text says.
    #[must_use]
    pub const fn from_forward(item: ContentItem) -> Self {
        Self::Content(item)
    }
}

/// Failure to deliver something to a requester.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The item kind cannot be re-sent.
    #[error("unsupported content: {0}")]
    Unsupported(String),
    /// The transport rejected the send.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound side of the relay: where items and notices go.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelaySink: Send + Sync {
    /// Re-send one content item to `requester`. Attempted once.
    async fn relay(&self, requester: RequesterId, item: &ContentItem) -> Result<(), SinkError>;

    /// Send a short text notice to `requester`.
    async fn notify(&self, requester: RequesterId, text: &str) -> Result<(), SinkError>;
}

/// Relay timings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Pause after every relay attempt.
    pub pacing: Duration,
    /// Idle time after START or the last relayed item before the reaper
    /// closes a task.
    pub task_deadline: Duration,
    /// Label for tasks with no pending label.
    pub default_label: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(RELAY_PACING_MS),
            task_deadline: Duration::from_secs(TASK_DEADLINE_SECS),
            default_label: DEFAULT_LABEL.to_string(),
        }
    }
}

/// What handling one inbound event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// START opened a task.
    Started {
        /// Task owner.
        requester: RequesterId,
        /// Announced item count.
        expected: u64,
        /// Whether an older task was overwritten.
        replaced: bool,
    },
    /// An item was delivered and more are expected.
    Relayed {
        /// Recipient.
        requester: RequesterId,
        /// Delivered so far.
        relayed: u64,
        /// Announced item count.
        expected: u64,
    },
    /// The task finished and the completion notice went out.
    Completed {
        /// Recipient.
        requester: RequesterId,
        /// Delivered items.
        relayed: u64,
    },
    /// END arrived before every announced item was delivered.
    Mismatch {
        /// Recipient.
        requester: RequesterId,
        /// Delivered items.
        relayed: u64,
        /// Announced item count.
        expected: u64,
    },
    /// END for a requester with no active task.
    AlreadyCleared {
        /// Requester named by END.
        requester: RequesterId,
    },
    /// An item could not be delivered; the task was closed.
    RelayFailed {
        /// Recipient.
        requester: RequesterId,
    },
    /// Content with no task to attribute it to, or whose task went away mid-send.
    Dropped,
    /// Malformed control text.
    Ignored,
}

/// Routes helper traffic to requesters.
pub struct RelayEngine<S> {
    sink: S,
    registry: Mutex<TaskRegistry>,
    labels: PendingLabels,
    config: RelayConfig,
}

impl<S: RelaySink> RelayEngine<S> {
    /// Create an engine delivering through `sink`.
    pub fn new(sink: S, labels: PendingLabels, config: RelayConfig) -> Self {
        Self {
            sink,
            registry: Mutex::new(TaskRegistry::new()),
            labels,
            config,
        }
    }

    /// Pending label store shared with the dispatcher.
    pub fn labels(&self) -> &PendingLabels {
        &self.labels
    }

    /// Outbound sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Number of active tasks.
    pub async fn active_tasks(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Copy of the active task of `requester`.
    pub async fn task(&self, requester: RequesterId) -> Option<Task> {
        self.registry.lock().await.get(requester).cloned()
    }

    /// Handle one decoded inbound event.
    pub async fn handle_inbound(&self, inbound: Inbound) -> RelayOutcome {
        match inbound {
            Inbound::Control(ControlMessage::Start {
                requester,
                expected,
            }) => self.on_start(RequesterId(requester), expected).await,
            Inbound::Control(ControlMessage::End {
                requester,
                forwarded,
            }) => self.on_end(RequesterId(requester), forwarded).await,
            Inbound::Content(item) => self.on_content(item).await,
            Inbound::Malformed(text) => {
                warn!(text = %text, "Dropping malformed control message");
                RelayOutcome::Ignored
            }
        }
    }

    async fn on_start(&self, requester: RequesterId, expected: u64) -> RelayOutcome {
        let label = self
            .labels
            .get(requester)
            .await
            .unwrap_or_else(|| self.config.default_label.clone());
        let deadline = Instant::now() + self.config.task_deadline;

        let replaced = self
            .registry
            .lock()
            .await
            .start(requester, expected, label.clone(), deadline);

        info!(requester = %requester, expected, label = %label, "Relay task started");
        RelayOutcome::Started {
            requester,
            expected,
            replaced: replaced.is_some(),
        }
    }

    async fn on_content(&self, item: ContentItem) -> RelayOutcome {
        let target = self.registry.lock().await.feed_target();
        let Some(target) = target else {
            warn!(kind = item.kind(), "No active task for inbound item, dropping");
            return RelayOutcome::Dropped;
        };

        let outcome = match self.sink.relay(target.requester, &item).await {
            Ok(()) => {
                let next_deadline = Instant::now() + self.config.task_deadline;
                let progress = self.registry.lock().await.record_relayed(
                    target.requester,
                    target.task_id,
                    next_deadline,
                );
                self.after_relay(target.requester, progress).await
            }
            Err(e) => {
                warn!(requester = %target.requester, kind = item.kind(), error = %e, "Relay failed");
                let removed = self
                    .registry
                    .lock()
                    .await
                    .remove(target.requester, target.task_id);
                if let Some(task) = removed {
                    self.labels.clear(task.requester).await;
                    self.notify(task.requester, &relay_failed_notice(&task.label))
                        .await;
                }
                RelayOutcome::RelayFailed {
                    requester: target.requester,
                }
            }
        };

        tokio::time::sleep(self.config.pacing).await;
        outcome
    }

    async fn after_relay(&self, requester: RequesterId, progress: RelayProgress) -> RelayOutcome {
        match progress {
            RelayProgress::InProgress { relayed, expected } => {
                debug!(requester = %requester, relayed, expected, "Item relayed");
                RelayOutcome::Relayed {
                    requester,
                    relayed,
                    expected,
                }
            }
            RelayProgress::Completed(task) => {
                info!(requester = %requester, relayed = task.relayed, "Relay task completed");
                self.labels.clear(requester).await;
                self.notify(requester, &completion_notice(task.relayed, &task.label))
                    .await;
                RelayOutcome::Completed {
                    requester,
                    relayed: task.relayed,
                }
            }
            RelayProgress::Stale => {
                warn!(requester = %requester, "Task replaced while relaying, item not counted");
                RelayOutcome::Dropped
            }
        }
    }

    async fn on_end(&self, requester: RequesterId, forwarded: u64) -> RelayOutcome {
        let task = self.registry.lock().await.end(requester);
        let Some(task) = task else {
            warn!(requester = %requester, forwarded, "END for a task that was already cleared");
            return RelayOutcome::AlreadyCleared { requester };
        };
        self.labels.clear(requester).await;

        if task.wants_more() {
            warn!(
                requester = %requester,
                relayed = task.relayed,
                expected = task.expected,
                forwarded,
                "Relay task ended short"
            );
            self.notify(
                requester,
                &mismatch_notice(task.relayed, task.expected, &task.label),
            )
            .await;
            return RelayOutcome::Mismatch {
                requester,
                relayed: task.relayed,
                expected: task.expected,
            };
        }

        if !task.completion_notified {
            self.notify(requester, &completion_notice(task.relayed, &task.label))
                .await;
        }
        info!(requester = %requester, relayed = task.relayed, "Relay task closed by END");
        RelayOutcome::Completed {
            requester,
            relayed: task.relayed,
        }
    }

    /// Close every task that has been idle past its deadline at `now`.
    pub async fn sweep_expired(&self, now: Instant) -> Vec<Task> {
        let expired = self.registry.lock().await.expire(now);
        for task in &expired {
            warn!(
                requester = %task.requester,
                relayed = task.relayed,
                expected = task.expected,
                "Relay task timed out"
            );
            self.labels.clear(task.requester).await;
            self.notify(
                task.requester,
                &timeout_notice(task.relayed, task.expected, &task.label),
            )
            .await;
        }
        expired
    }

    async fn notify(&self, requester: RequesterId, text: &str) {
        if let Err(e) = self.sink.notify(requester, text).await {
            warn!(requester = %requester, error = %e, "Failed to send notice");
        }
    }
}

/// Sent once every announced item was delivered.
#[must_use]
pub fn completion_notice(relayed: u64, label: &str) -> String {
    if relayed == 0 {
        format!("ℹ️ No items to deliver for '{label}'.")
    } else {
        format!("✅ All {relayed} items for '{label}' have been delivered.")
    }
}

/// Sent when END arrives before every announced item was delivered.
#[must_use]
pub fn mismatch_notice(relayed: u64, expected: u64, label: &str) -> String {
    format!("⚠️ Delivery of '{label}' ended early: received {relayed} of {expected} items.")
}

/// Sent when an item could not be re-sent.
#[must_use]
pub fn relay_failed_notice(label: &str) -> String {
    format!("⚠️ Could not deliver an item for '{label}'. The transfer was stopped.")
}

/// Sent by the reaper.
#[must_use]
pub fn timeout_notice(relayed: u64, expected: u64, label: &str) -> String {
    format!("⏳ Delivery of '{label}' timed out after {relayed} of {expected} items.")
}
