#![deny(missing_docs)]
//! Channel Courier core library.
//!
//! Transport-agnostic logic shared by the bot and the helper process: message
//! identifier resolution, batched forwarding, the helper orchestration run and
//! the control protocol spoken between the two.

/// Channel client abstraction used by the helper.
pub mod channel;
/// Configuration management.
pub mod config;
/// Batched, rate-limit aware forwarding.
pub mod forwarder;
/// Redacting log setup for the binaries.
pub mod logging;
/// Declarative menu and action table.
pub mod menu;
/// Helper orchestration run (resolve, announce, forward, report).
pub mod orchestrator;
/// Control messages and the orchestrator result record.
pub mod protocol;
/// Message identifier resolution policy.
pub mod resolver;
/// Utility functions.
pub mod utils;
