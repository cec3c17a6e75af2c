//! HTTP surface of the relay.
//!
//! Every relay endpoint answers with the `{ success, data }` envelope, including
//! for bodies that fail to decode, so callers never see a bare framework error.

use asa_application::RelayService;
use asa_core::config::WidgetSettings;
use asa_core::envelope::{Envelope, ErrorStyle};
use asa_core::error::ChatError;
use asa_core::forms::{ApiKeyForm, ChatForm, ProactiveForm, WidgetSettingsQuery};
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
}

impl AppState {
    pub fn new(relay: Arc<RelayService>) -> Self {
        Self { relay }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/proactive-message", post(proactive_handler))
        .route("/test-api-key", post(test_api_key_handler))
        .route("/cache/clear", post(clear_cache_handler))
        .route("/widget-settings", get(widget_settings_handler))
        .with_state(state)
}

/// Serves the router on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!("[Server] Relay listening on http://{}", addr);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn rejected(rejection: FormRejection, style: ErrorStyle) -> Json<Envelope> {
    tracing::debug!("[Server] Rejected form body: {}", rejection);
    Json(Envelope::from_chat_error(&ChatError::InvalidRequest, style))
}

async fn chat_handler(
    State(state): State<AppState>,
    form: Result<Form<ChatForm>, FormRejection>,
) -> Json<Envelope> {
    match form {
        Ok(Form(form)) => Json(state.relay.chat_envelope(form).await),
        Err(rejection) => rejected(rejection, ErrorStyle::Plain),
    }
}

async fn proactive_handler(
    State(state): State<AppState>,
    form: Result<Form<ProactiveForm>, FormRejection>,
) -> Json<Envelope> {
    match form {
        Ok(Form(form)) => Json(state.relay.proactive_envelope(form).await),
        Err(rejection) => rejected(rejection, ErrorStyle::Object),
    }
}

async fn test_api_key_handler(
    State(state): State<AppState>,
    form: Result<Form<ApiKeyForm>, FormRejection>,
) -> Json<Envelope> {
    match form {
        Ok(Form(form)) => Json(state.relay.test_api_key_envelope(form).await),
        Err(rejection) => rejected(rejection, ErrorStyle::Object),
    }
}

async fn clear_cache_handler(State(state): State<AppState>) -> Json<Envelope> {
    let removed = state.relay.clear_proactive_cache().await;
    Json(Envelope::ok(serde_json::json!({ "removed": removed })))
}

/// `?pageKind=post` resolves `display` against the configured display rules.
async fn widget_settings_handler(
    State(state): State<AppState>,
    Query(query): Query<WidgetSettingsQuery>,
) -> Json<WidgetSettings> {
    let settings = state.relay.settings().settings();
    Json(settings.widget_settings_for(query.page_kind()))
}
