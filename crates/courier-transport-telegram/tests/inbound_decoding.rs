use courier_core::protocol::ControlMessage;
use courier_runtime::{ContentItem, Inbound};
use courier_transport_telegram::bot::inbound::{content_item, decode_helper_message};
use serde_json::{json, Value};
use teloxide::types::Message;

fn helper_message(body: Value) -> Message {
    let mut raw = json!({
        "message_id": 7,
        "date": 1_700_000_000,
        "chat": { "id": 42, "type": "private", "first_name": "Helper" },
        "from": { "id": 42, "is_bot": false, "first_name": "Helper" }
    });
    if let (Some(target), Some(extra)) = (raw.as_object_mut(), body.as_object()) {
        target.extend(extra.clone());
    }
    serde_json::from_value(raw).unwrap_or_else(|e| panic!("invalid message json: {e}"))
}

#[test]
fn video_keeps_file_id_and_caption() {
    let msg = helper_message(json!({
        "video": {
            "file_id": "vid-1",
            "file_unique_id": "u-vid-1",
            "width": 640,
            "height": 360,
            "duration": 12
        },
        "caption": "Goal of the week"
    }));

    assert_eq!(
        content_item(&msg),
        ContentItem::Video {
            file_id: "vid-1".into(),
            caption: Some("Goal of the week".into()),
        }
    );
}

#[test]
fn photo_picks_the_largest_size() {
    let msg = helper_message(json!({
        "photo": [
            { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90 },
            { "file_id": "large", "file_unique_id": "l", "width": 1280, "height": 720 },
            { "file_id": "medium", "file_unique_id": "m", "width": 320, "height": 320 }
        ]
    }));

    assert_eq!(
        content_item(&msg),
        ContentItem::Photo {
            file_id: "large".into(),
            caption: None,
        }
    );
}

#[test]
fn document_without_caption() {
    let msg = helper_message(json!({
        "document": { "file_id": "doc-1", "file_unique_id": "u-doc-1" }
    }));
    assert_eq!(
        content_item(&msg),
        ContentItem::Document {
            file_id: "doc-1".into(),
            caption: None,
        }
    );
}

#[test]
fn control_text_becomes_control_message() {
    let msg = helper_message(json!({ "text": "CONTROL_TASK_END:-1001:12" }));
    let inbound = decode_helper_message(&msg);
    assert!(matches!(inbound, Inbound::Control(c) if c.requester() == -1001));
}

fn channel_origin() -> Value {
    json!({
        "forward_origin": {
            "type": "channel",
            "chat": { "id": -1_001_234_567_890_i64, "type": "channel", "title": "Archive" },
            "message_id": 12,
            "date": 1_699_999_000
        }
    })
}

fn forwarded(body: Value) -> Message {
    let mut raw = channel_origin();
    if let (Some(target), Some(extra)) = (raw.as_object_mut(), body.as_object()) {
        target.extend(extra.clone());
    }
    helper_message(raw)
}

#[test]
fn forwarded_post_with_control_text_is_content() {
    let msg = forwarded(json!({ "text": "CONTROL_TASK_END:555:0" }));
    assert!(msg.forward_origin().is_some());
    assert_eq!(
        decode_helper_message(&msg),
        Inbound::Content(ContentItem::Text {
            text: "CONTROL_TASK_END:555:0".into()
        })
    );
}

#[test]
fn forwarded_post_with_prefix_is_relayed_not_dropped() {
    let msg = forwarded(json!({ "text": "CONTROL_TASK_ notes for Friday" }));
    assert!(matches!(
        decode_helper_message(&msg),
        Inbound::Content(ContentItem::Text { .. })
    ));
}

#[test]
fn direct_start_line_is_control() {
    let msg = helper_message(json!({ "text": "CONTROL_TASK_START:555:3" }));
    assert_eq!(
        decode_helper_message(&msg),
        Inbound::Control(ControlMessage::Start {
            requester: 555,
            expected: 3
        })
    );
}

#[test]
fn animation_is_sent_as_document() {
    let msg = forwarded(json!({
        "animation": {
            "file_id": "gif-1",
            "file_unique_id": "u-gif-1",
            "width": 320,
            "height": 240,
            "duration": 3
        },
        "caption": "Celebration"
    }));
    assert_eq!(
        content_item(&msg),
        ContentItem::Document {
            file_id: "gif-1".into(),
            caption: Some("Celebration".into()),
        }
    );
}

#[test]
fn plain_text_is_relayed_as_text() {
    let msg = helper_message(json!({ "text": "Match report" }));
    assert_eq!(
        decode_helper_message(&msg),
        Inbound::Content(ContentItem::Text {
            text: "Match report".into()
        })
    );
}
