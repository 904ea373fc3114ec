//! Library crate for predictions-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Storage models and backends.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Business logic over the shared state.
pub mod services;
/// Shared state, form sessions and the wizard.
pub mod state;
