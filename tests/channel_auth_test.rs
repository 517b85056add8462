use hmac::{Hmac, Mac};
use pulso::app::config::App;
use pulso::channel::ChannelManager;
use pulso::error::Error;
use pulso::websocket::SocketId;
use sha2::Sha256;

fn test_app() -> App {
    App {
        id: "app1".to_string(),
        key: "k".to_string(),
        secret: "s".to_string(),
        ..Default::default()
    }
}

fn hmac_hex(secret: &str, data: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn private_channel_data_to_sign() {
    let socket_id = SocketId("1.1".to_string());
    assert_eq!(
        ChannelManager::get_data_to_sign(&socket_id, "private-x", None),
        "1.1:private-x"
    );
}

#[test]
fn presence_channel_data_to_sign_includes_channel_data() {
    let socket_id = SocketId("123.456".to_string());
    let channel_data = r#"{"user_id":"u1"}"#;
    assert_eq!(
        ChannelManager::get_data_to_sign(&socket_id, "presence-room", Some(channel_data)),
        format!("123.456:presence-room:{channel_data}")
    );
    // empty channel_data signs like its absence
    assert_eq!(
        ChannelManager::get_data_to_sign(&socket_id, "presence-room", Some("")),
        "123.456:presence-room"
    );
}

#[test]
fn valid_signature_is_accepted() {
    let app = test_app();
    let socket_id = SocketId("1.1".to_string());
    let auth = format!("k:{}", hmac_hex("s", "1.1:private-x"));

    ChannelManager::validate_signature(&app, &socket_id, "private-x", None, &auth)
        .expect("valid signature must verify");
}

#[test]
fn tampered_signature_is_rejected() {
    let app = test_app();
    let socket_id = SocketId("1.1".to_string());
    let mut signature = hmac_hex("s", "1.1:private-x");
    // flip one hex digit
    let last = signature.pop().unwrap();
    signature.push(if last == '0' { '1' } else { '0' });
    let auth = format!("k:{signature}");

    let err = ChannelManager::validate_signature(&app, &socket_id, "private-x", None, &auth)
        .unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(err.message(), "signature does not match");
    assert_eq!(err.close_code(), 4009);
}

#[test]
fn malformed_hex_is_rejected() {
    let app = test_app();
    let socket_id = SocketId("1.1".to_string());

    let err =
        ChannelManager::validate_signature(&app, &socket_id, "private-x", None, "k:not-hex!")
            .unwrap_err();
    assert_eq!(err.message(), "invalid signature string provided");

    let err = ChannelManager::validate_signature(&app, &socket_id, "private-x", None, "nocolon")
        .unwrap_err();
    assert_eq!(err.message(), "invalid signature string provided");
}

#[test]
fn signature_for_wrong_channel_is_rejected() {
    let app = test_app();
    let socket_id = SocketId("1.1".to_string());
    let auth = format!("k:{}", hmac_hex("s", "1.1:private-x"));

    let err = ChannelManager::validate_signature(&app, &socket_id, "private-y", None, &auth)
        .unwrap_err();
    assert_eq!(err.message(), "signature does not match");
}

#[test]
fn expected_signature_matches_independent_hmac() {
    let app = test_app();
    let socket_id = SocketId("7.7".to_string());
    let channel_data = r#"{"user_id":"alice","user_info":{"name":"Alice"}}"#;

    let expected = ChannelManager::get_expected_signature(
        &app,
        &socket_id,
        "presence-room",
        Some(channel_data),
    );
    assert_eq!(
        expected,
        format!(
            "k:{}",
            hmac_hex("s", &format!("7.7:presence-room:{channel_data}"))
        )
    );

    // deterministic: same inputs, same signature
    assert_eq!(
        expected,
        ChannelManager::get_expected_signature(
            &app,
            &socket_id,
            "presence-room",
            Some(channel_data)
        )
    );
}
