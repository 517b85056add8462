use crate::adapter::ConnectionHandler;
use crate::app::auth::AuthValidator;
use crate::error::Error;
use crate::http_handler::AppError;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authenticates a Pusher REST API request.
///
/// The caller signs `"<METHOD>\n<PATH>\n<sorted query>"` (every query
/// parameter except `auth_signature`, sorted ascending by key) with
/// HMAC-SHA-256 under the app secret and sends the hex digest as
/// `auth_signature`. See
/// https://pusher.com/docs/channels/library_auth_reference/rest-api#authentication
pub async fn pusher_api_auth_middleware(
    State(handler): State<Arc<ConnectionHandler>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let uri = request.uri().clone();
    let method = request.method().clone();
    let path = uri.path().to_string();

    let app_id = path
        .strip_prefix("/apps/")
        .and_then(|rest| rest.split('/').next())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| AppError::InvalidInput("missing app id in path".to_string()))?
        .to_string();

    let (params, auth_signature) = params_for_signature(uri.query())?;
    let auth_signature = auth_signature
        .ok_or_else(|| AppError::ApiAuthFailed("missing auth_signature".to_string()))?;

    let auth_validator = AuthValidator::new(handler.app_manager.clone());
    match auth_validator
        .validate_api_request(&app_id, method.as_str(), &path, &params, &auth_signature)
        .await
    {
        Ok(true) => {
            debug!("API authentication succeeded for {}", path);
            Ok(next.run(request).await)
        }
        Ok(false) => {
            warn!("API authentication failed for {}", path);
            Err(AppError::ApiAuthFailed("invalid API signature".to_string()))
        }
        Err(Error::Application(message)) => Err(AppError::AppNotFound(message)),
        Err(e) => Err(AppError::InternalError(e.to_string())),
    }
}

/// Splits the raw query into the sorted parameter map that participates in
/// the signature and the `auth_signature` value itself.
fn params_for_signature(
    query: Option<&str>,
) -> Result<(BTreeMap<String, String>, Option<String>), AppError> {
    let mut params = BTreeMap::new();
    let mut auth_signature = None;

    if let Some(query) = query {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).map_err(|e| {
            AppError::InvalidInput(format!("failed to parse query string: {e}"))
        })?;

        for (key, value) in pairs {
            if key == "auth_signature" {
                auth_signature = Some(value);
            } else {
                params.insert(key, value);
            }
        }
    }

    Ok((params, auth_signature))
}
