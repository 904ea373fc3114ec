use tracing::warn;

use crate::{
    dto::admin::{AddPlayerResponse, PlayersResponse, PredictionTableResponse},
    error::ServiceError,
    services::{record_service, registry_service},
    state::SharedState,
};

/// Registry for the dashboard. Read failures are reported, not raised.
pub async fn list_players(state: &SharedState) -> PlayersResponse {
    match registry_service::list_players(state).await {
        Ok(players) => PlayersResponse {
            players,
            warning: None,
        },
        Err(err) => {
            warn!(error = %err, "failed to list players for the dashboard");
            PlayersResponse {
                players: Vec::new(),
                warning: Some(format!("players unavailable: {err}")),
            }
        }
    }
}

/// Register a participant. Store failures surface to the operator.
pub async fn add_player(
    state: &SharedState,
    name: String,
) -> Result<AddPlayerResponse, ServiceError> {
    let created = registry_service::add_player(state, name.clone()).await?;
    Ok(AddPlayerResponse { name, created })
}

/// Raw predictions table for the dashboard. Read failures are reported, not raised.
pub async fn predictions(state: &SharedState) -> PredictionTableResponse {
    match record_service::read_all(state).await {
        Ok(table) => PredictionTableResponse {
            columns: table.columns(),
            rows: table
                .into_rows()
                .into_iter()
                .map(|row| row.into_fields())
                .collect(),
            warning: None,
        },
        Err(err) => {
            warn!(error = %err, "failed to read predictions for the dashboard");
            PredictionTableResponse {
                columns: Vec::new(),
                rows: Vec::new(),
                warning: Some(format!("predictions unavailable: {err}")),
            }
        }
    }
}
