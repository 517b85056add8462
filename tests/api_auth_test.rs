use hmac::{Hmac, Mac};
use pulso::app::auth::AuthValidator;
use pulso::app::config::App;
use sha2::Sha256;
use std::collections::BTreeMap;

fn test_app() -> App {
    App {
        id: "app1".to_string(),
        key: "api-key".to_string(),
        secret: "api-secret".to_string(),
        ..Default::default()
    }
}

fn hmac_hex(secret: &str, data: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn sample_params() -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("auth_key".to_string(), "api-key".to_string());
    params.insert("auth_timestamp".to_string(), "1353088179".to_string());
    params.insert("auth_version".to_string(), "1.0".to_string());
    params
}

#[test]
fn string_to_sign_is_method_path_and_sorted_query() {
    let params = sample_params();
    let string_to_sign = AuthValidator::string_to_sign("POST", "/apps/app1/events", &params);

    assert_eq!(
        string_to_sign,
        "POST\n/apps/app1/events\nauth_key=api-key&auth_timestamp=1353088179&auth_version=1.0"
    );
}

#[test]
fn string_to_sign_with_no_params() {
    let params = BTreeMap::new();
    assert_eq!(
        AuthValidator::string_to_sign("GET", "/apps/app1/channels", &params),
        "GET\n/apps/app1/channels\n"
    );
}

#[test]
fn keys_sort_ascending_regardless_of_insertion_order() {
    let mut params = BTreeMap::new();
    params.insert("zebra".to_string(), "1".to_string());
    params.insert("alpha".to_string(), "2".to_string());

    assert_eq!(
        AuthValidator::string_to_sign("GET", "/", &params),
        "GET\n/\nalpha=2&zebra=1"
    );
}

#[test]
fn valid_request_signature_is_accepted() {
    let app = test_app();
    let params = sample_params();
    let signature = hmac_hex(
        "api-secret",
        &AuthValidator::string_to_sign("POST", "/apps/app1/events", &params),
    );

    assert!(AuthValidator::signature_is_valid(
        &app,
        "POST",
        "/apps/app1/events",
        &params,
        &signature
    ));
}

#[test]
fn signature_over_different_method_is_rejected() {
    let app = test_app();
    let params = sample_params();
    let signature = hmac_hex(
        "api-secret",
        &AuthValidator::string_to_sign("POST", "/apps/app1/events", &params),
    );

    assert!(!AuthValidator::signature_is_valid(
        &app,
        "GET",
        "/apps/app1/events",
        &params,
        &signature
    ));
}

#[test]
fn signature_with_altered_params_is_rejected() {
    let app = test_app();
    let params = sample_params();
    let signature = hmac_hex(
        "api-secret",
        &AuthValidator::string_to_sign("POST", "/apps/app1/events", &params),
    );

    let mut altered = params.clone();
    altered.insert("auth_timestamp".to_string(), "9999999999".to_string());

    assert!(!AuthValidator::signature_is_valid(
        &app,
        "POST",
        "/apps/app1/events",
        &altered,
        &signature
    ));
}

#[test]
fn malformed_signature_hex_is_rejected() {
    let app = test_app();
    let params = sample_params();

    assert!(!AuthValidator::signature_is_valid(
        &app,
        "POST",
        "/apps/app1/events",
        &params,
        "zz-not-hex"
    ));
}
