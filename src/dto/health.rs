use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of form sessions currently held in memory.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Build the payload from the degraded flag.
    pub fn new(degraded: bool, active_sessions: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            active_sessions,
        }
    }
}
