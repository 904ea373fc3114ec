use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::admin::{
        AddPlayerRequest, AddPlayerResponse, DistributionQuery, DistributionResponse,
        InsightsResponse, PlayersResponse, PredictionTableResponse,
    },
    error::AppError,
    services::{admin_service, export_service, insights_service},
    state::SharedState,
};

const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// Dashboard endpoints gated by the admin shared secret.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/players", get(list_players).post(add_player))
        .route("/admin/predictions", get(list_predictions))
        .route("/admin/predictions/export", get(export_predictions))
        .route("/admin/insights", get(insights))
        .route("/admin/insights/fields/{key}", get(field_distribution))
        .route_layer(middleware::from_fn_with_state(state, require_admin_password))
}

/// Registered players in registration order.
#[utoipa::path(
    get,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Password" = String, Header, description = "Admin shared secret")),
    responses((status = 200, description = "Registered players", body = PlayersResponse))
)]
pub async fn list_players(State(state): State<SharedState>) -> Json<PlayersResponse> {
    Json(admin_service::list_players(&state).await)
}

/// Register a participant; registering an existing name is a no-op.
#[utoipa::path(
    post,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Password" = String, Header, description = "Admin shared secret")),
    request_body = AddPlayerRequest,
    responses(
        (status = 201, description = "Player registered", body = AddPlayerResponse),
        (status = 200, description = "Player already registered", body = AddPlayerResponse),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AddPlayerRequest>>,
) -> Result<(StatusCode, Json<AddPlayerResponse>), AppError> {
    let response = admin_service::add_player(&state, payload.name).await?;
    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// Raw predictions table.
#[utoipa::path(
    get,
    path = "/admin/predictions",
    tag = "admin",
    params(("X-Admin-Password" = String, Header, description = "Admin shared secret")),
    responses((status = 200, description = "Predictions table", body = PredictionTableResponse))
)]
pub async fn list_predictions(State(state): State<SharedState>) -> Json<PredictionTableResponse> {
    Json(admin_service::predictions(&state).await)
}

/// Download the predictions table as CSV.
#[utoipa::path(
    get,
    path = "/admin/predictions/export",
    tag = "admin",
    params(("X-Admin-Password" = String, Header, description = "Admin shared secret")),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn export_predictions(State(state): State<SharedState>) -> Result<Response, AppError> {
    let csv = export_service::export_csv(&state).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_service::EXPORT_FILE_NAME
    );

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            ),
        ],
        csv,
    )
        .into_response())
}

/// Dashboard summary: moodboard, peer-prediction tallies, word-cloud text and expectations.
#[utoipa::path(
    get,
    path = "/admin/insights",
    tag = "admin",
    params(("X-Admin-Password" = String, Header, description = "Admin shared secret")),
    responses((status = 200, description = "Insights", body = InsightsResponse))
)]
pub async fn insights(State(state): State<SharedState>) -> Json<InsightsResponse> {
    Json(insights_service::insights(&state).await)
}

/// Value distribution of an arbitrary column.
#[utoipa::path(
    get,
    path = "/admin/insights/fields/{key}",
    tag = "admin",
    params(
        ("X-Admin-Password" = String, Header, description = "Admin shared secret"),
        ("key" = String, Path, description = "Record column"),
        DistributionQuery
    ),
    responses((status = 200, description = "Distribution", body = DistributionResponse))
)]
pub async fn field_distribution(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Query(query): Query<DistributionQuery>,
) -> Json<DistributionResponse> {
    Json(insights_service::distribution(&state, key, &query).await)
}

async fn require_admin_password(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin password header `X-Admin-Password`".into())
        })?;

    if state.config().admin_secret().matches(provided) {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid admin password".into()))
    }
}
