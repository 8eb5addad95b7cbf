//! # Castlink Server Library (castlink-server)
//!
//! Overlay widget backend for a livestream.
//!
//! **Purpose:** Ingest chat relay events, normalize them, mutate per-widget
//! state, and fan out versioned snapshot/delta pushes to browser overlay
//! widgets over SSE. Speech-eligible events flow through an ordered TTS
//! queue with pluggable synthesis engines.
//!
//! **Architecture:** Single-process tokio pipeline: log tail -> parser ->
//! dispatcher -> (store + broadcaster, TTS queue), plus an axum HTTP/SSE
//! control surface.

pub mod api;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod store;
pub mod synth;
pub mod tts;
pub mod webhook;

pub use error::{Error, Result};
