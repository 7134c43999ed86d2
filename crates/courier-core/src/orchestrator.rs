//! One end-to-end helper run.
//!
//! authorize → resolve peers → resolve ids → START → settle → forward → END → result.
//!
//! The run never panics or returns an error: every failure is folded into an
//! [`OrchestratorResult`] carrying the counts accumulated so far.

use crate::channel::{ChannelClient, ChannelError};
use crate::config::START_SETTLE_DELAY;
use crate::forwarder::{forward_in_batches, ForwardPolicy};
use crate::protocol::{ControlMessage, OrchestratorResult};
use crate::resolver::resolve_message_ids;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Positional inputs of a helper run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationRequest {
    /// Source channel identifier (`-100...` id or `@username`).
    pub source_channel: String,
    /// Resolution identifier (sentinel, id list or search text).
    pub identifier: String,
    /// Public username of the bot that receives the items.
    pub bot_handle: String,
    /// Chat id of the requester the bot relays to.
    pub requester: i64,
}

impl OrchestrationRequest {
    /// Build a request from positional arguments (program name excluded).
    ///
    /// # Errors
    ///
    /// Returns a message suitable for an error result when the arguments are
    /// incomplete or the requester id is not an integer.
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let [source_channel, identifier, bot_handle, requester] = args else {
            return Err(format!(
                "Incorrect number of arguments: expected 4, got {}.",
                args.len()
            ));
        };
        let requester = requester
            .trim()
            .parse()
            .map_err(|_| format!("Invalid requester id: {requester}"))?;
        Ok(Self {
            source_channel: source_channel.clone(),
            identifier: identifier.clone(),
            bot_handle: bot_handle.clone(),
            requester,
        })
    }
}

/// Timing of a helper run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Forwarding policy.
    pub forward: ForwardPolicy,
    /// Pause between START and the first forwarded batch.
    pub settle_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            forward: ForwardPolicy::default(),
            settle_delay: START_SETTLE_DELAY,
        }
    }
}

#[derive(Error, Debug)]
enum RunError {
    #[error("helper session is not authorized")]
    Unauthorized,
    #[error("source channel '{0}' could not be resolved")]
    SourceNotFound(String),
    #[error("target bot '{0}' could not be resolved")]
    BotNotFound(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Default)]
struct Progress {
    found: u64,
    forwarded: u64,
}

/// Execute a full helper run and report its outcome.
pub async fn run_orchestration<C: ChannelClient + ?Sized>(
    client: &C,
    request: &OrchestrationRequest,
    config: &OrchestratorConfig,
) -> OrchestratorResult {
    let mut progress = Progress::default();
    match drive(client, request, config, &mut progress).await {
        Ok(()) => OrchestratorResult::success(progress.forwarded, progress.found),
        Err(e) => {
            error!(requester = request.requester, error = %e, "Helper run failed");
            OrchestratorResult::error(
                format!("Forwarder script failed: {e}"),
                progress.forwarded,
                progress.found,
            )
        }
    }
}

async fn drive<C: ChannelClient + ?Sized>(
    client: &C,
    request: &OrchestrationRequest,
    config: &OrchestratorConfig,
    progress: &mut Progress,
) -> Result<(), RunError> {
    if !client.is_authorized().await? {
        return Err(RunError::Unauthorized);
    }
    info!("Helper client connected and authorized.");

    let bot = client
        .resolve_peer(&request.bot_handle)
        .await?
        .ok_or_else(|| RunError::BotNotFound(request.bot_handle.clone()))?;
    let source = client
        .resolve_peer(&request.source_channel)
        .await?
        .ok_or_else(|| RunError::SourceNotFound(request.source_channel.clone()))?;

    let ids = resolve_message_ids(client, &source, &request.identifier).await?;
    progress.found = ids.len() as u64;

    let start = ControlMessage::Start {
        requester: request.requester,
        expected: progress.found,
    };
    client.send_text(&bot, &start.to_string()).await?;

    if ids.is_empty() {
        info!(requester = request.requester, "Nothing resolved, closing handshake");
    } else {
        tokio::time::sleep(config.settle_delay).await;
        let report = forward_in_batches(client, &ids, &source, &bot, &config.forward).await;
        progress.forwarded = report.forwarded as u64;
        if report.forwarded < ids.len() {
            warn!(
                requester = request.requester,
                forwarded = report.forwarded,
                expected = ids.len(),
                "Partial forward"
            );
        }
    }

    let end = ControlMessage::End {
        requester: request.requester,
        forwarded: progress.forwarded,
    };
    client.send_text(&bot, &end.to_string()).await?;
    Ok(())
}
