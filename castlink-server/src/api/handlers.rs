//! HTTP handlers

use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use castlink_common::events::{TtsSnapshot, VotingSnapshot, WidgetPush};
use castlink_common::model::WidgetId;

use crate::api::{ApiError, AppState};
use crate::error::Error;
use crate::tts::publish_queue_changed;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn parse_widget(widget_id: &str) -> Result<WidgetId, ApiError> {
    widget_id
        .parse::<WidgetId>()
        .map_err(|_| ApiError(Error::NotFound(format!("unknown widget: {widget_id}"))))
}

/// One-shot current state of a widget
pub async fn widget_snapshot(
    Path(widget_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WidgetPush>, ApiError> {
    let widget = parse_widget(&widget_id)?;
    Ok(Json(state.broadcaster.snapshot(widget).await))
}

/// SSE subscription: snapshot first, then deltas
pub async fn widget_events(
    Path(widget_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let widget = parse_widget(&widget_id)?;
    info!(
        "widget subscriber connected to {widget} (now {})",
        state.broadcaster.subscriber_count(widget).await + 1
    );

    let stream = state.broadcaster.subscribe_stream(widget).await;
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    ))
}

/// Zero a counter widget (operator action)
pub async fn reset_counter(
    Path(widget_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WidgetPush>, ApiError> {
    let widget = parse_widget(&widget_id)?;
    state.dispatcher.reset_counter(widget).await?;
    Ok(Json(state.broadcaster.snapshot(widget).await))
}

#[derive(Deserialize)]
pub struct StartVoteRequest {
    pub question: String,
    pub options: Vec<String>,
}

pub async fn start_vote(
    State(state): State<AppState>,
    Json(req): Json<StartVoteRequest>,
) -> Result<Json<VotingSnapshot>, ApiError> {
    let snapshot = state.dispatcher.start_vote(req.question, req.options).await?;
    Ok(Json(snapshot))
}

pub async fn stop_vote(State(state): State<AppState>) -> Result<Json<VotingSnapshot>, ApiError> {
    Ok(Json(state.dispatcher.stop_vote().await?))
}

pub async fn reset_vote(State(state): State<AppState>) -> Json<VotingSnapshot> {
    Json(state.dispatcher.reset_vote().await)
}

#[derive(Deserialize)]
pub struct AutoplayRequest {
    pub enabled: bool,
}

pub async fn set_autoplay(
    State(state): State<AppState>,
    Json(req): Json<AutoplayRequest>,
) -> Json<TtsSnapshot> {
    let snapshot = state.queue.set_autoplay(req.enabled).await;
    publish_queue_changed(&state.queue, &state.broadcaster).await;
    Json(snapshot)
}

pub async fn clear_queue(State(state): State<AppState>) -> Json<TtsSnapshot> {
    let snapshot = state.queue.clear().await;
    publish_queue_changed(&state.queue, &state.broadcaster).await;
    Json(snapshot)
}
