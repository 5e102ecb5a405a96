//! # Funmap Common Library
//!
//! Shared code for the Funmap admin editor crates including:
//! - Error types
//! - Configuration loading
//! - Logging initialisation
//! - Editor event types (EditorEvent enum) and the EventBus
//! - Load/save wire types for the gateway contract

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
