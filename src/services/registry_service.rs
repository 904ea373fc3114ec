use tracing::{info, warn};

use crate::{error::ServiceError, state::SharedState};

/// Registered names in registration order. A missing table reads as empty.
pub async fn list_players(state: &SharedState) -> Result<Vec<String>, ServiceError> {
    let store = state.require_survey_store().await?;
    match store.list_players().await {
        Ok(players) => Ok(players.into_iter().map(|player| player.name).collect()),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Registered names, or an empty list when the registry cannot be read.
pub async fn player_names(state: &SharedState) -> Vec<String> {
    match list_players(state).await {
        Ok(names) => names,
        Err(err) => {
            warn!(error = %err, "failed to read player registry; using an empty list");
            Vec::new()
        }
    }
}

/// Register `name`, returning `false` when it was already present.
pub async fn add_player(state: &SharedState, name: String) -> Result<bool, ServiceError> {
    let store = state.require_survey_store().await?;
    let created = store.add_player(name.clone()).await?;
    if created {
        info!(player = %name, "player registered");
    } else {
        info!(player = %name, "player already registered");
    }
    Ok(created)
}
