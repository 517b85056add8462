use crate::adapter::ConnectionHandler;
use crate::app::config::App;
use crate::channel::ChannelType;
use crate::error::Error;
use crate::middleware::pusher_api_auth_middleware;
use crate::protocol::constants::MAX_MESSAGE_SIZE;
use crate::protocol::messages::PusherMessage;
use crate::websocket::SocketId;
use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

/// HTTP-surface error. Maps onto conventional status codes; the body keeps
/// the `{error, code}` shape clients of the Pusher REST API expect.
#[derive(Debug)]
pub enum AppError {
    InvalidInput(String),
    ApiAuthFailed(String),
    AppNotFound(String),
    PayloadTooLarge(String),
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message),
            AppError::ApiAuthFailed(message) => (StatusCode::UNAUTHORIZED, message),
            AppError::AppNotFound(message) => (StatusCode::FORBIDDEN, message),
            AppError::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            AppError::InternalError(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        let body = json!({
            "error": message,
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        match e {
            Error::Application(message) => AppError::AppNotFound(message),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

/// One event on the publish surface: `channel` or `channels` names the
/// targets, `socket_id` optionally excludes the originating connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEventRequest {
    pub name: String,
    pub data: Value,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    #[serde(default)]
    pub socket_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEventsRequest {
    pub batch: Vec<ApiEventRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelsQuery {
    #[serde(default)]
    pub filter_by_prefix: Option<String>,
}

pub fn router(handler: Arc<ConnectionHandler>) -> Router {
    let api = Router::new()
        .route("/apps/{app_id}/events", post(events))
        .route("/apps/{app_id}/batch_events", post(batch_events))
        .route("/apps/{app_id}/channels", get(channels_index))
        .route("/apps/{app_id}/channels/{channel_name}", get(channel_info))
        .route(
            "/apps/{app_id}/channels/{channel_name}/users",
            get(channel_users),
        )
        .route(
            "/apps/{app_id}/users/{user_id}/terminate_connections",
            post(terminate_user),
        )
        .route_layer(middleware::from_fn_with_state(
            handler.clone(),
            pusher_api_auth_middleware,
        ));

    Router::new()
        .route("/", get(root))
        .route("/app/{app_key}", get(ws_upgrade))
        .merge(api)
        .layer(CorsLayer::permissive())
        .with_state(handler)
}

pub async fn root(State(handler): State<Arc<ConnectionHandler>>) -> Json<Value> {
    Json(json!({
        "message": "Welcome to the pulso server",
        "server_id": handler.server_id,
    }))
}

pub async fn ws_upgrade(
    Path(app_key): Path<String>,
    State(handler): State<Arc<ConnectionHandler>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move { handler.handle_socket(socket, app_key).await })
}

pub async fn events(
    Path(app_id): Path<String>,
    State(handler): State<Arc<ConnectionHandler>>,
    Json(request): Json<ApiEventRequest>,
) -> Result<Json<Value>, AppError> {
    let app = find_app(&handler, &app_id).await?;
    publish_event(&handler, &app, request)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn batch_events(
    Path(app_id): Path<String>,
    State(handler): State<Arc<ConnectionHandler>>,
    Json(request): Json<BatchEventsRequest>,
) -> Result<Json<Value>, AppError> {
    let app = find_app(&handler, &app_id).await?;
    for event in request.batch {
        publish_event(&handler, &app, event)?;
    }
    Ok(Json(json!({ "ok": true })))
}

pub async fn channels_index(
    Path(app_id): Path<String>,
    Query(query): Query<ChannelsQuery>,
    State(handler): State<Arc<ConnectionHandler>>,
) -> Result<Json<Value>, AppError> {
    find_app(&handler, &app_id).await?;

    let counts = {
        let mut conn_mgr = handler.connection_manager.lock().await;
        conn_mgr.get_channels_with_socket_count(&app_id).await?
    };

    let channels: serde_json::Map<String, Value> = counts
        .into_iter()
        .filter(|(name, _)| {
            query
                .filter_by_prefix
                .as_deref()
                .is_none_or(|prefix| name.starts_with(prefix))
        })
        .map(|(name, count)| {
            (
                name,
                json!({ "subscription_count": count, "occupied": count > 0 }),
            )
        })
        .collect();

    Ok(Json(json!({ "channels": channels })))
}

pub async fn channel_info(
    Path((app_id, channel_name)): Path<(String, String)>,
    State(handler): State<Arc<ConnectionHandler>>,
) -> Result<Json<Value>, AppError> {
    find_app(&handler, &app_id).await?;

    let count = {
        let mut conn_mgr = handler.connection_manager.lock().await;
        conn_mgr.get_channel_socket_count(&app_id, &channel_name).await
    };

    Ok(Json(json!({
        "subscription_count": count,
        "occupied": count > 0,
    })))
}

pub async fn channel_users(
    Path((app_id, channel_name)): Path<(String, String)>,
    State(handler): State<Arc<ConnectionHandler>>,
) -> Result<Json<Value>, AppError> {
    find_app(&handler, &app_id).await?;

    if ChannelType::from_name(&channel_name) != ChannelType::Presence {
        return Err(AppError::InvalidInput(
            "users endpoint is only available on presence channels".to_string(),
        ));
    }

    let members = {
        let mut conn_mgr = handler.connection_manager.lock().await;
        conn_mgr.get_channel_members(&app_id, &channel_name).await?
    };

    let users: Vec<Value> = members
        .keys()
        .map(|user_id| json!({ "id": user_id }))
        .collect();

    Ok(Json(json!({ "users": users })))
}

pub async fn terminate_user(
    Path((app_id, user_id)): Path<(String, String)>,
    State(handler): State<Arc<ConnectionHandler>>,
) -> Result<Json<Value>, AppError> {
    find_app(&handler, &app_id).await?;
    handler.terminate_user_connections(&app_id, &user_id).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn find_app(handler: &Arc<ConnectionHandler>, app_id: &str) -> Result<App, AppError> {
    handler
        .app_manager
        .find_by_id(app_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::AppNotFound(format!("app {app_id} not found")))
}

/// Fans the event out to each named channel, one task per channel. The
/// caller's 200 does not wait for delivery.
fn publish_event(
    handler: &Arc<ConnectionHandler>,
    app: &App,
    request: ApiEventRequest,
) -> Result<(), AppError> {
    let channels = match (&request.channels, &request.channel) {
        (Some(channels), _) if !channels.is_empty() => channels.clone(),
        (_, Some(channel)) => vec![channel.clone()],
        _ => {
            return Err(AppError::InvalidInput(
                "event must name a channel or channels".to_string(),
            ));
        }
    };

    if let Some(limit) = app.max_event_payload_bytes() {
        let size = event_data_size(&request.data);
        if size > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "event data is {size} bytes, limit is {limit}"
            )));
        }
    }

    let except = request.socket_id.clone().map(SocketId);
    for channel in channels {
        let handler = handler.clone();
        let app_id = app.id.clone();
        let name = request.name.clone();
        let data = request.data.clone();
        let except = except.clone();

        tokio::spawn(async move {
            let message = PusherMessage::channel_event(&name, &channel, data);
            let mut conn_mgr = handler.connection_manager.lock().await;
            if let Err(e) = conn_mgr.send(&channel, message, except.as_ref(), &app_id).await {
                warn!("publish to channel {} failed: {}", channel, e);
            }
        });
    }

    Ok(())
}

/// Size of the event's `data` as it travels on the wire: string payloads
/// count as-is, structured payloads as their JSON encoding.
fn event_data_size(data: &Value) -> usize {
    match data {
        Value::String(raw) => raw.len(),
        other => other.to_string().len(),
    }
}
