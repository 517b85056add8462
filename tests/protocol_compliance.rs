use pulso::protocol::messages::{MessageData, PresenceData, PusherMessage};
use serde_json::{Value, json};
use std::collections::HashMap;

// Helper function to serialize message and parse as JSON for testing
fn message_to_json(message: &PusherMessage) -> Value {
    serde_json::to_value(message).expect("Failed to serialize message")
}

#[test]
fn test_connection_established_format() {
    // data travels as a JSON-encoded string per the Pusher spec
    let message = PusherMessage::connection_established("test-socket-123".to_string());
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher:connection_established");
    assert!(
        json["data"].is_string(),
        "Data field should be a String (JSON-encoded)"
    );

    let data_str = json["data"].as_str().expect("Data should be a string");
    let parsed_data: Value =
        serde_json::from_str(data_str).expect("Data string should contain valid JSON");

    assert_eq!(parsed_data["socket_id"], "test-socket-123");
    assert_eq!(parsed_data["activity_timeout"], 120);
}

#[test]
fn test_error_format() {
    // pusher:error data is an object with message and code
    let message = PusherMessage::error(4001, "Application does not exist".to_string(), None);
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher:error");
    assert!(json["data"].is_object(), "Data field should be an Object");
    assert_eq!(json["data"]["code"], 4001);
    assert_eq!(json["data"]["message"], "Application does not exist");
    assert!(
        json.get("channel").is_none(),
        "channel should be omitted when not set"
    );
}

#[test]
fn test_pong_format() {
    let message = PusherMessage::pong();
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher:pong");
    assert_eq!(json["data"], "{}");
}

#[test]
fn test_subscription_succeeded_presence_format() {
    let mut hash = HashMap::new();
    hash.insert("user1".to_string(), Some(json!({"name": "Alice"})));
    hash.insert("user2".to_string(), Some(json!({"name": "Bob"})));

    let presence_data = PresenceData {
        ids: vec!["user1".to_string(), "user2".to_string()],
        hash,
        count: 2,
    };

    let message =
        PusherMessage::subscription_succeeded("presence-room".to_string(), Some(presence_data));
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher_internal:subscription_succeeded");
    assert_eq!(json["channel"], "presence-room");
    assert!(
        json["data"].is_string(),
        "Data field should be a String (JSON-encoded)"
    );

    let data_str = json["data"].as_str().expect("Data should be a string");
    let parsed_data: Value =
        serde_json::from_str(data_str).expect("Data string should contain valid JSON");

    let presence = &parsed_data["presence"];
    assert_eq!(presence["count"], 2);
    assert_eq!(presence["ids"], json!(["user1", "user2"]));
    assert_eq!(presence["hash"]["user1"], json!({"name": "Alice"}));
    assert_eq!(presence["hash"]["user2"], json!({"name": "Bob"}));
}

#[test]
fn test_subscription_succeeded_non_presence_format() {
    // public/private channels carry an empty object as a string
    let message = PusherMessage::subscription_succeeded("private-channel".to_string(), None);
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher_internal:subscription_succeeded");
    assert_eq!(json["channel"], "private-channel");
    assert_eq!(json["data"], "{}");
}

#[test]
fn test_subscription_error_format() {
    let message = PusherMessage::subscription_error(
        "private-x".to_string(),
        4009,
        "signature does not match".to_string(),
    );
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher:subscription_error");
    assert_eq!(json["channel"], "private-x");
    assert!(json["data"].is_object(), "Data field should be an Object");
    assert_eq!(json["data"]["code"], 4009);
    assert_eq!(json["data"]["message"], "signature does not match");
}

#[test]
fn test_member_added_format() {
    let user_info = json!({"name": "Alice", "email": "alice@example.com"});

    let message = PusherMessage::member_added(
        "presence-room".to_string(),
        "user123".to_string(),
        Some(user_info.clone()),
    );
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher_internal:member_added");
    assert_eq!(json["channel"], "presence-room");
    assert!(
        json["data"].is_string(),
        "Data field should be a String (JSON-encoded)"
    );

    let data_str = json["data"].as_str().expect("Data should be a string");
    let parsed_data: Value =
        serde_json::from_str(data_str).expect("Data string should contain valid JSON");

    assert_eq!(parsed_data["user_id"], "user123");
    assert_eq!(parsed_data["user_info"], user_info);
}

#[test]
fn test_member_added_without_info_defaults_to_empty_object() {
    let message =
        PusherMessage::member_added("presence-room".to_string(), "user123".to_string(), None);
    let json = message_to_json(&message);

    let data_str = json["data"].as_str().expect("Data should be a string");
    let parsed_data: Value = serde_json::from_str(data_str).unwrap();
    assert_eq!(parsed_data["user_info"], json!({}));
}

#[test]
fn test_member_removed_format() {
    let message = PusherMessage::member_removed("presence-room".to_string(), "user123".to_string());
    let json = message_to_json(&message);

    assert_eq!(json["event"], "pusher_internal:member_removed");
    assert_eq!(json["channel"], "presence-room");
    assert!(
        json["data"].is_string(),
        "Data field should be a String (JSON-encoded)"
    );

    let data_str = json["data"].as_str().expect("Data should be a string");
    let parsed_data: Value =
        serde_json::from_str(data_str).expect("Data string should contain valid JSON");

    assert_eq!(parsed_data["user_id"], "user123");
    assert!(
        parsed_data.get("user_info").is_none(),
        "Should not have user_info"
    );
}

#[test]
fn test_channel_event_format() {
    let event_data = json!({"message": "Hello", "timestamp": 1234567890});

    let message = PusherMessage::channel_event("my-event", "my-channel", event_data.clone());
    let json = message_to_json(&message);

    assert_eq!(json["event"], "my-event");
    assert_eq!(json["channel"], "my-channel");
    assert!(json["data"].is_string(), "Data field should be a String");

    let data_str = json["data"].as_str().expect("Data should be a string");
    let parsed_data: Value =
        serde_json::from_str(data_str).expect("Data string should contain valid JSON");
    assert_eq!(parsed_data, event_data);
}

#[test]
fn test_channel_event_string_data_passes_through() {
    // a publisher that already JSON-encoded its payload keeps it verbatim
    let message = PusherMessage::channel_event(
        "update",
        "c1",
        Value::String(r#"{"already":"encoded"}"#.to_string()),
    );
    let json = message_to_json(&message);

    assert_eq!(json["data"], r#"{"already":"encoded"}"#);
}

#[test]
fn test_client_event_accepts_string() {
    let message = PusherMessage {
        channel: Some("private-channel".to_string()),
        event: Some("client-typing".to_string()),
        data: Some(MessageData::String("user is typing...".to_string())),
        ..Default::default()
    };

    let json = message_to_json(&message);

    assert_eq!(json["event"], "client-typing");
    assert_eq!(json["channel"], "private-channel");
    assert_eq!(json["data"], "user is typing...");
}

#[test]
fn test_client_event_accepts_json() {
    let message = PusherMessage {
        channel: Some("private-channel".to_string()),
        event: Some("client-typing".to_string()),
        data: Some(MessageData::Json(
            json!({"user": "alice", "status": "typing"}),
        )),
        ..Default::default()
    };

    let json = message_to_json(&message);

    assert_eq!(json["event"], "client-typing");
    assert!(json["data"].is_object(), "Data should be an object");
    assert_eq!(json["data"]["user"], "alice");
    assert_eq!(json["data"]["status"], "typing");
}

#[test]
fn test_inbound_subscribe_frame_parses() {
    let raw = r#"{"event":"pusher:subscribe","data":{"channel":"news"}}"#;
    let message: PusherMessage = serde_json::from_str(raw).unwrap();

    assert_eq!(message.event.as_deref(), Some("pusher:subscribe"));
    let data = message.data.unwrap().as_value().unwrap();
    assert_eq!(data["channel"], "news");
}

#[test]
fn test_inbound_client_event_with_string_data_parses() {
    let raw = r#"{"event":"client-move","channel":"private-game","data":"{\"x\":1}"}"#;
    let message: PusherMessage = serde_json::from_str(raw).unwrap();

    assert_eq!(message.event.as_deref(), Some("client-move"));
    assert_eq!(message.channel.as_deref(), Some("private-game"));
    let data = message.data.unwrap().as_value().unwrap();
    assert_eq!(data["x"], 1);
}
