use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::public::{CountdownResponse, PlayerChoices},
    services::{landing_service, registry_service},
    state::SharedState,
};

/// Landing page and player selection endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/countdown", get(countdown))
        .route("/players", get(players))
}

/// Time left until the configured countdown target.
#[utoipa::path(
    get,
    path = "/countdown",
    tag = "public",
    responses((status = 200, description = "Countdown", body = CountdownResponse))
)]
pub async fn countdown(State(state): State<SharedState>) -> Json<CountdownResponse> {
    Json(landing_service::current_countdown(&state))
}

/// Registered players, sorted for selection. Empty when the registry is unavailable.
#[utoipa::path(
    get,
    path = "/players",
    tag = "public",
    responses((status = 200, description = "Registered players", body = PlayerChoices))
)]
pub async fn players(State(state): State<SharedState>) -> Json<PlayerChoices> {
    let mut players = registry_service::player_names(&state).await;
    players.sort();
    Json(PlayerChoices { players })
}
