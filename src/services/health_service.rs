use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded mode while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_survey_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded(), state.session_count())
}
