//! Batched forwarding from the source channel into the bot inbox.
//!
//! Ids are forwarded in fixed-size batches with a pause between batches.
//! Rate-limit signals are honoured with the server-specified wait plus a
//! margin; waits above a give-up threshold end the run with a partial count.
//! A batch that keeps failing is skipped without aborting the run.

use crate::channel::{ChannelClient, ChannelError, MessageId};
use crate::config::{
    DELAY_BETWEEN_BATCHES, FLOOD_WAIT_GIVE_UP, FLOOD_WAIT_MARGIN, FORWARD_BATCH_SIZE,
    FORWARD_MAX_RETRIES, TRANSIENT_RETRY_DELAY,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Batching and retry knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardPolicy {
    /// Ids per forward call.
    pub batch_size: usize,
    /// Pause between successive batches.
    pub delay_between_batches: Duration,
    /// Retries per batch after the first attempt.
    pub max_retries: usize,
    /// Added to server-specified flood waits.
    pub flood_wait_margin: Duration,
    /// Flood waits above this abandon the run.
    pub flood_wait_give_up: Duration,
    /// Pause before retrying after a non rate-limit error.
    pub transient_retry_delay: Duration,
}

impl Default for ForwardPolicy {
    fn default() -> Self {
        Self {
            batch_size: FORWARD_BATCH_SIZE,
            delay_between_batches: DELAY_BETWEEN_BATCHES,
            max_retries: FORWARD_MAX_RETRIES,
            flood_wait_margin: FLOOD_WAIT_MARGIN,
            flood_wait_give_up: FLOOD_WAIT_GIVE_UP,
            transient_retry_delay: TRANSIENT_RETRY_DELAY,
        }
    }
}

/// Summary of a forwarding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardReport {
    /// Ids forwarded successfully.
    pub forwarded: usize,
    /// Batches skipped after exhausting retries.
    pub skipped_batches: usize,
    /// Whether the run stopped early on an excessive flood wait.
    pub abandoned: bool,
}

enum BatchOutcome {
    Sent,
    Skipped,
    Abandon,
}

/// Forward `ids` from `source` to `destination`.
///
/// Never fails: errors are retried, skipped or end the run early, and the
/// report carries what was achieved.
pub async fn forward_in_batches<C: ChannelClient + ?Sized>(
    client: &C,
    ids: &[MessageId],
    source: &C::Peer,
    destination: &C::Peer,
    policy: &ForwardPolicy,
) -> ForwardReport {
    let mut report = ForwardReport::default();
    let batch_size = policy.batch_size.max(1);
    let total_batches = ids.len().div_ceil(batch_size);

    for (index, batch) in ids.chunks(batch_size).enumerate() {
        match forward_batch(client, batch, source, destination, policy, index).await {
            BatchOutcome::Sent => report.forwarded += batch.len(),
            BatchOutcome::Skipped => report.skipped_batches += 1,
            BatchOutcome::Abandon => {
                report.abandoned = true;
                break;
            }
        }

        if index + 1 < total_batches {
            sleep(policy.delay_between_batches).await;
        }
    }

    info!(
        forwarded = report.forwarded,
        requested = ids.len(),
        skipped_batches = report.skipped_batches,
        abandoned = report.abandoned,
        "Forwarding finished"
    );
    report
}

async fn forward_batch<C: ChannelClient + ?Sized>(
    client: &C,
    batch: &[MessageId],
    source: &C::Peer,
    destination: &C::Peer,
    policy: &ForwardPolicy,
    index: usize,
) -> BatchOutcome {
    let mut attempt = 0;
    loop {
        let err = match client.forward(source, destination, batch).await {
            Ok(()) => return BatchOutcome::Sent,
            Err(e) => e,
        };

        if let ChannelError::FloodWait { seconds } = err {
            let wait = Duration::from_secs(seconds);
            if wait > policy.flood_wait_give_up {
                warn!(
                    batch = index,
                    wait_secs = seconds,
                    "Flood wait exceeds give-up threshold, abandoning remaining batches"
                );
                sleep(wait).await;
                return BatchOutcome::Abandon;
            }
            if attempt >= policy.max_retries {
                error!(batch = index, size = batch.len(), "Rate limited on every attempt, skipping batch");
                return BatchOutcome::Skipped;
            }
            warn!(batch = index, wait_secs = seconds, attempt, "Rate limited, waiting");
            sleep(wait + policy.flood_wait_margin).await;
        } else {
            if attempt >= policy.max_retries {
                error!(batch = index, size = batch.len(), error = %err, "Batch failed after retries, skipping");
                return BatchOutcome::Skipped;
            }
            warn!(batch = index, attempt, error = %err, "Batch forward failed, retrying");
            sleep(policy.transient_retry_delay).await;
        }
        attempt += 1;
    }
}
