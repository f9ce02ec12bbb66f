use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::workflow::WorkflowRequest;
use crate::transport::telegram::{parse_update, Update};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct AppState {
    workflow_channel: mpsc::Sender<WorkflowRequest>,
    secret: Option<String>,
}

/// Acknowledges as soon as the event is queued. Telegram redelivers
/// anything that is not answered with 2xx, so only a full queue fails.
async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> impl IntoResponse {
    if let Some(secret) = &state.secret {
        let supplied = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if supplied != Some(secret.as_str()) {
            log::warn!("Rejected webhook call with a bad secret token.");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"description": "Invalid secret token."})),
            );
        }
    }

    let update_id = update.update_id;
    let Some(event) = parse_update(update) else {
        log::debug!("Ignoring update {}", update_id);
        return (StatusCode::OK, Json(json!({"ok": true})));
    };

    match state
        .workflow_channel
        .send(WorkflowRequest::Event(event))
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({"ok": true}))),
        Err(e) => {
            log::error!("Failed to queue update {}: {}", update_id, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"description": "Failed to process request."})),
            )
        }
    }
}

pub fn router(
    workflow_channel: mpsc::Sender<WorkflowRequest>,
    secret: Option<String>,
) -> Router {
    let app_state = AppState {
        workflow_channel,
        secret,
    };

    Router::new()
        .route("/telegram", post(receive_update))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    workflow_channel: mpsc::Sender<WorkflowRequest>,
    secret: Option<String>,
) -> Result<(), anyhow::Error> {
    let app = router(workflow_channel, secret);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
