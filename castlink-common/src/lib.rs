//! # Castlink Common Library
//!
//! Shared code for the castlink overlay backend:
//! - Normalized event model (relay events after ingestion)
//! - Widget push types (snapshot/delta envelope sent to overlay widgets)
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
