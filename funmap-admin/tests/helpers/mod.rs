//! Test helper modules for funmap-admin integration tests
//!
//! - ScriptedGateway: in-memory gateway with per-action replies and an
//!   optional latency
//! - fixtures: a loaded admin document and session constructors

#![allow(dead_code)]

pub mod fixtures;
pub mod scripted_gateway;

pub use fixtures::{document, drain_events, loaded_over, loaded_session, session_over, TIER};
pub use scripted_gateway::{Reply, ScriptedGateway};
