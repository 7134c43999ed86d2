#![deny(missing_docs)]
//! Channel Courier runtime.
//!
//! Transport-agnostic pieces that live inside the long-running bot process:
//! the task registry, the relay engine that feeds it, the deadline reaper and
//! the helper launcher used by the request dispatcher.

/// Helper subprocess launch and status mapping.
pub mod dispatcher;
/// Requester-keyed labels bridging dispatch time and task start.
pub mod pending_labels;
/// Background sweep closing overdue tasks.
pub mod reaper;
/// Inbound item routing and relaying.
pub mod relay;
/// In-flight relay task bookkeeping.
pub mod task_registry;

pub use dispatcher::{DispatchOutcome, HelperLauncher, HelperOutput, LaunchError};
pub use pending_labels::PendingLabels;
pub use reaper::spawn_task_reaper;
pub use relay::{ContentItem, Inbound, RelayConfig, RelayEngine, RelayOutcome, RelaySink, SinkError};
pub use task_registry::{RequesterId, Task, TaskId, TaskRegistry};
