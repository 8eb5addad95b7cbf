//! HTTP/SSE surface
//!
//! Widgets subscribe on `/api/v1/widgets/:widget_id/events`; the operator
//! panel drives voting and TTS through the POST endpoints. All state
//! changes go through the dispatcher so they are published like any other.

pub mod handlers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::fanout::WidgetBroadcaster;
use crate::tts::TtsQueue;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub broadcaster: Arc<WidgetBroadcaster>,
    pub queue: Arc<TtsQueue>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/widgets/:widget_id", get(handlers::widget_snapshot))
        .route(
            "/api/v1/widgets/:widget_id/events",
            get(handlers::widget_events),
        )
        .route(
            "/api/v1/widgets/:widget_id/reset",
            post(handlers::reset_counter),
        )
        .route("/api/v1/voting/start", post(handlers::start_vote))
        .route("/api/v1/voting/stop", post(handlers::stop_vote))
        .route("/api/v1/voting/reset", post(handlers::reset_vote))
        .route("/api/v1/tts/autoplay", post(handlers::set_autoplay))
        .route("/api/v1/tts/clear", post(handlers::clear_queue))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error wrapper mapping domain errors to HTTP status codes
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::VoteNotRunning => StatusCode::CONFLICT,
            Error::BadRequest(_)
            | Error::InvalidVoteOption(_)
            | Error::InvalidVoteSession(_)
            | Error::InvalidDelta(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
