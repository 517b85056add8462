use crate::app::config::App;
use crate::app::manager::AppManager;
use crate::error::{Error, Result};
use crate::token::Token;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Validates the signed-request scheme on the HTTP API surface.
///
/// The string-to-sign is `"<METHOD>\n<PATH>\n<k1=v1&k2=v2...>"` with the
/// query parameters sorted ascending by key and `auth_signature` itself
/// excluded. The signature is HMAC-SHA-256 under the app secret, hex
/// encoded, compared in constant time.
pub struct AuthValidator {
    app_manager: Arc<dyn AppManager + Send + Sync>,
}

impl AuthValidator {
    pub fn new(app_manager: Arc<dyn AppManager + Send + Sync>) -> Self {
        Self { app_manager }
    }

    pub async fn validate_api_request(
        &self,
        app_id: &str,
        method: &str,
        path: &str,
        params: &BTreeMap<String, String>,
        auth_signature: &str,
    ) -> Result<bool> {
        let app = self
            .app_manager
            .find_by_id(app_id)
            .await?
            .ok_or_else(|| Error::Application(format!("app {app_id} not found")))?;

        Ok(Self::signature_is_valid(
            &app,
            method,
            path,
            params,
            auth_signature,
        ))
    }

    pub fn signature_is_valid(
        app: &App,
        method: &str,
        path: &str,
        params: &BTreeMap<String, String>,
        auth_signature: &str,
    ) -> bool {
        let token = Token::new(app.key.clone(), app.secret.clone());
        token.verify(&Self::string_to_sign(method, path, params), auth_signature)
    }

    pub fn string_to_sign(method: &str, path: &str, params: &BTreeMap<String, String>) -> String {
        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        format!("{method}\n{path}\n{query}")
    }
}
