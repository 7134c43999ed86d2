use async_trait::async_trait;
use courier_core::protocol::ControlMessage;
use courier_runtime::{
    spawn_task_reaper, ContentItem, Inbound, PendingLabels, RelayConfig, RelayEngine,
    RelayOutcome, RelaySink, RequesterId, SinkError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const R: RequesterId = RequesterId(555);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Item(RequesterId, ContentItem, Instant),
    Notice(RequesterId, String),
}

/// Records everything the engine sends.
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSink {
    fn push(&self, entry: Sent) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(entry);
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn notices(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Notice(_, text) => Some(text),
                Sent::Item(..) => None,
            })
            .collect()
    }

    fn item_times(&self) -> Vec<Instant> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Item(_, _, at) => Some(at),
                Sent::Notice(..) => None,
            })
            .collect()
    }
}

#[async_trait]
impl RelaySink for RecordingSink {
    async fn relay(&self, requester: RequesterId, item: &ContentItem) -> Result<(), SinkError> {
        self.push(Sent::Item(requester, item.clone(), Instant::now()));
        Ok(())
    }

    async fn notify(&self, requester: RequesterId, text: &str) -> Result<(), SinkError> {
        self.push(Sent::Notice(requester, text.to_string()));
        Ok(())
    }
}

fn engine(pacing: Duration) -> RelayEngine<RecordingSink> {
    let config = RelayConfig {
        pacing,
        ..RelayConfig::default()
    };
    RelayEngine::new(RecordingSink::default(), PendingLabels::new(60, 100), config)
}

fn start(expected: u64) -> Inbound {
    Inbound::Control(ControlMessage::Start {
        requester: R.0,
        expected,
    })
}

fn end(forwarded: u64) -> Inbound {
    Inbound::Control(ControlMessage::End {
        requester: R.0,
        forwarded,
    })
}

fn document(n: u32) -> Inbound {
    Inbound::Content(ContentItem::Document {
        file_id: format!("doc-{n}"),
        caption: Some(format!("part {n}")),
    })
}

#[tokio::test]
async fn five_relays_complete_once_and_sixth_is_dropped() {
    let engine = engine(Duration::ZERO);
    engine.handle_inbound(start(5)).await;
    for n in 1..=5 {
        engine.handle_inbound(document(n)).await;
    }
    assert_eq!(engine.active_tasks().await, 0);
    assert_eq!(engine.handle_inbound(document(6)).await, RelayOutcome::Dropped);

    let notices = engine.sink().notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("All 5 items"));
}

#[tokio::test]
async fn early_end_sends_one_mismatch_notice() {
    let engine = engine(Duration::ZERO);
    engine.handle_inbound(start(5)).await;
    for n in 1..=3 {
        engine.handle_inbound(document(n)).await;
    }
    let outcome = engine.handle_inbound(end(3)).await;

    assert_eq!(
        outcome,
        RelayOutcome::Mismatch {
            requester: R,
            relayed: 3,
            expected: 5
        }
    );
    assert_eq!(engine.active_tasks().await, 0);
    let notices = engine.sink().notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("3 of 5"));
}

#[tokio::test]
async fn zero_item_handshake_completes_without_residue() {
    let engine = engine(Duration::ZERO);
    engine.labels().set(R, "Empty").await;
    engine.handle_inbound(start(0)).await;
    let outcome = engine.handle_inbound(end(0)).await;

    assert_eq!(
        outcome,
        RelayOutcome::Completed {
            requester: R,
            relayed: 0
        }
    );
    assert_eq!(engine.active_tasks().await, 0);
    assert_eq!(engine.labels().get(R).await, None);
    assert_eq!(
        engine.sink().notices(),
        vec!["ℹ️ No items to deliver for 'Empty'.".to_string()]
    );
}

#[tokio::test]
async fn newer_start_takes_over_the_stream() {
    let engine = engine(Duration::ZERO);
    engine.handle_inbound(start(4)).await;
    engine.handle_inbound(document(1)).await;
    let outcome = engine.handle_inbound(start(2)).await;
    assert_eq!(
        outcome,
        RelayOutcome::Started {
            requester: R,
            expected: 2,
            replaced: true
        }
    );

    engine.handle_inbound(document(2)).await;
    let outcome = engine.handle_inbound(document(3)).await;
    assert_eq!(
        outcome,
        RelayOutcome::Completed {
            requester: R,
            relayed: 2
        }
    );
}

#[tokio::test(start_paused = true)]
async fn highlights_scenario_end_to_end() {
    let pacing = Duration::from_millis(1500);
    let engine = engine(pacing);
    engine.labels().set(R, "Highlights").await;

    // Helper output for identifier "101 102 103": START, three forwards, END.
    let inbox = vec![
        Inbound::from_helper(ContentItem::Text {
            text: "CONTROL_TASK_START:555:3".into(),
        }),
        Inbound::from_forward(ContentItem::Video {
            file_id: "v101".into(),
            caption: Some("Goal 1".into()),
        }),
        Inbound::from_forward(ContentItem::Video {
            file_id: "v102".into(),
            caption: None,
        }),
        Inbound::from_forward(ContentItem::Photo {
            file_id: "p103".into(),
            caption: None,
        }),
        Inbound::from_helper(ContentItem::Text {
            text: "CONTROL_TASK_END:555:3".into(),
        }),
    ];

    let mut outcomes = Vec::new();
    for inbound in inbox {
        outcomes.push(engine.handle_inbound(inbound).await);
    }

    assert!(matches!(outcomes[1], RelayOutcome::Relayed { relayed: 1, .. }));
    assert!(matches!(outcomes[2], RelayOutcome::Relayed { relayed: 2, .. }));
    assert_eq!(
        outcomes[3],
        RelayOutcome::Completed {
            requester: R,
            relayed: 3
        }
    );
    assert_eq!(outcomes[4], RelayOutcome::AlreadyCleared { requester: R });

    let times = engine.sink().item_times();
    assert_eq!(times.len(), 3);
    assert!(times.windows(2).all(|w| w[1] - w[0] >= pacing));

    assert_eq!(
        engine.sink().notices(),
        vec!["✅ All 3 items for 'Highlights' have been delivered.".to_string()]
    );
    assert_eq!(engine.labels().get(R).await, None);
}

#[tokio::test]
async fn malformed_control_text_is_never_relayed() {
    let engine = engine(Duration::ZERO);
    engine.handle_inbound(start(1)).await;
    let outcome = engine
        .handle_inbound(Inbound::from_helper(ContentItem::Text {
            text: "CONTROL_TASK_END:555".into(),
        }))
        .await;

    assert_eq!(outcome, RelayOutcome::Ignored);
    assert!(engine.sink().sent().is_empty());
    assert_eq!(engine.active_tasks().await, 1);
}

#[tokio::test(start_paused = true)]
async fn long_transfer_outlives_the_idle_deadline() {
    // 700 items at 1.5s each take well over the 15 minute idle deadline
    let engine = Arc::new(engine(Duration::from_millis(1500)));
    let shutdown = CancellationToken::new();
    let reaper = spawn_task_reaper(engine.clone(), Duration::from_secs(30), shutdown.clone());

    engine.handle_inbound(start(700)).await;
    let mut last = RelayOutcome::Ignored;
    for n in 1..=700 {
        last = engine.handle_inbound(document(n)).await;
        if !matches!(last, RelayOutcome::Relayed { .. }) {
            break;
        }
    }

    shutdown.cancel();
    assert!(reaper.await.is_ok());

    assert_eq!(
        last,
        RelayOutcome::Completed {
            requester: R,
            relayed: 700
        }
    );
    assert_eq!(
        engine.sink().notices(),
        vec!["✅ All 700 items for 'your request' have been delivered.".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_transfer_is_reaped_after_idle_deadline() {
    let engine = Arc::new(engine(Duration::ZERO));
    let shutdown = CancellationToken::new();
    let reaper = spawn_task_reaper(engine.clone(), Duration::from_secs(30), shutdown.clone());

    engine.handle_inbound(start(3)).await;
    engine.handle_inbound(document(1)).await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    engine.handle_inbound(document(2)).await;

    // 600s after the last item the task is still alive
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(engine.active_tasks().await, 1);

    tokio::time::sleep(Duration::from_secs(400)).await;
    assert_eq!(engine.active_tasks().await, 0);

    shutdown.cancel();
    assert!(reaper.await.is_ok());
    assert_eq!(
        engine.sink().notices(),
        vec!["⏳ Delivery of 'your request' timed out after 2 of 3 items.".to_string()]
    );
}
