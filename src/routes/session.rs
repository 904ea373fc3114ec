use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::session::{
        FinishResponse, SessionView, StartSessionRequest, StepSubmission, TransitionResponse,
    },
    error::AppError,
    services::wizard_service,
    state::SharedState,
};

/// Form session endpoints driving the predictions wizard.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/next", post(next_step))
        .route("/sessions/{id}/previous", post(previous_step))
        .route("/sessions/{id}/finish", post(finish_session))
        .route("/sessions/{id}/reset", post(reset_session))
}

/// Open a blank form session.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    responses(
        (status = 201, description = "Session created", body = SessionView),
        (status = 503, description = "Live session cap reached")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = wizard_service::create_session(&state).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current phase, answers and rendered step of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session", body = SessionView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(wizard_service::session_view(&state, id).await?))
}

/// Drop a session and its unsaved progress.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    responses((status = 204, description = "Session deleted"))
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    wizard_service::delete_session(&state, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Choose the participant and enter the first step.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Form started", body = SessionView),
        (status = 400, description = "Player not registered"),
        (status = 409, description = "No players registered or form already running")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<StartSessionRequest>>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        wizard_service::start(&state, id, payload.player).await?,
    ))
}

/// Save the current step and move forward.
#[utoipa::path(
    post,
    path = "/sessions/{id}/next",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = StepSubmission,
    responses((status = 200, description = "Moved to the next step", body = TransitionResponse))
)]
pub async fn next_step(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StepSubmission>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(wizard_service::next(&state, id, payload).await?))
}

/// Save the current step and move back.
#[utoipa::path(
    post,
    path = "/sessions/{id}/previous",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = StepSubmission,
    responses((status = 200, description = "Moved to the previous step", body = TransitionResponse))
)]
pub async fn previous_step(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StepSubmission>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(wizard_service::previous(&state, id, payload).await?))
}

/// Save the last step, apply defaults and reset the session for the next participant.
#[utoipa::path(
    post,
    path = "/sessions/{id}/finish",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = StepSubmission,
    responses((status = 200, description = "Form completed", body = FinishResponse))
)]
pub async fn finish_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StepSubmission>,
) -> Result<Json<FinishResponse>, AppError> {
    Ok(Json(wizard_service::finish(&state, id, payload).await?))
}

/// Abandon the progress and go back to player selection.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reset",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Session reset", body = SessionView))
)]
pub async fn reset_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(wizard_service::reset(&state, id).await?))
}
