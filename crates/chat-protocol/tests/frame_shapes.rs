//! Wire-shape tests: every frame is `{"type": ..., "payload": {...}}` and
//! the enum spellings match what clients actually send.

use chat_protocol::*;
use uuid::Uuid;

#[test]
fn send_message_frame_parses_from_client_json() {
    let to = Uuid::new_v4();
    let text = format!(
        r#"{{"type":"send_message","payload":{{"to_user_id":"{to}","content":"hi"}}}}"#
    );
    match serde_json::from_str::<ClientFrame>(&text).expect("frame should parse") {
        ClientFrame::SendMessage(p) => {
            assert_eq!(p.to_user_id, Some(to));
            assert_eq!(p.group_id, None);
            assert_eq!(p.content, "hi");
        }
        other => panic!("expected send_message, got {other:?}"),
    }
}

#[test]
fn set_active_conversation_null_target_clears() {
    let text = r#"{"type":"set_active_conversation","payload":{"conversation_type":"DM","target_id":null}}"#;
    match serde_json::from_str::<ClientFrame>(text).expect("frame should parse") {
        ClientFrame::SetActiveConversation(p) => {
            assert_eq!(p.conversation_type, ConversationType::Dm);
            assert_eq!(p.target_id, None);
        }
        other => panic!("expected set_active_conversation, got {other:?}"),
    }
}

#[test]
fn server_frames_carry_type_and_payload_keys() {
    let frame = ServerFrame::UserOnline(PresenceEvent {
        user_id: Uuid::new_v4(),
    });
    let value: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
    assert_eq!(value["type"], "user_online");
    assert!(value["payload"]["user_id"].is_string());
}

#[test]
fn typing_stop_event_has_no_username_field() {
    let frame = ServerFrame::UserStoppedTyping(TypingStoppedEvent {
        user_id: Uuid::new_v4(),
        conversation_type: ConversationType::Group,
        target_id: Uuid::new_v4(),
    });
    let value: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
    assert_eq!(value["type"], "user_stopped_typing");
    assert_eq!(value["payload"]["conversation_type"], "GROUP");
    assert!(value["payload"].get("username").is_none());
}

#[test]
fn receipt_status_ordering_matches_lifecycle() {
    assert!(ReceiptStatus::Sent < ReceiptStatus::Delivered);
    assert!(ReceiptStatus::Delivered < ReceiptStatus::Read);
    assert_eq!(ReceiptStatus::parse("DELIVERED"), Some(ReceiptStatus::Delivered));
    assert_eq!(ReceiptStatus::parse("delivered"), None);
    assert_eq!(ReceiptStatus::Read.rank(), 3);
}

#[test]
fn unknown_frame_type_is_a_parse_error() {
    let text = r#"{"type":"shrug","payload":{}}"#;
    assert!(serde_json::from_str::<ClientFrame>(text).is_err());
}

#[test]
fn message_event_omits_absent_optionals() {
    let event = MessageEvent {
        id: Uuid::new_v4(),
        sender_id: Uuid::new_v4(),
        sender_username: None,
        receiver_id: Some(Uuid::new_v4()),
        group_id: None,
        content: "x".to_owned(),
        msg_type: ConversationType::Dm,
        created_at: chrono::Utc::now(),
    };
    let value: serde_json::Value = serde_json::from_str(
        &serde_json::to_string(&ServerFrame::NewMessage(event)).unwrap(),
    )
    .unwrap();
    assert_eq!(value["type"], "new_message");
    assert_eq!(value["payload"]["msg_type"], "DM");
    assert!(value["payload"].get("group_id").is_none());
    assert!(value["payload"].get("sender_username").is_none());
}
