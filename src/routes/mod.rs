use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Admin dashboard routes.
pub mod admin;
/// Health check route.
pub mod health;
/// Landing page routes.
pub mod public;
/// Form session routes.
pub mod session;

/// Compose all route trees, wiring in shared state and the Swagger UI.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(public::router())
        .merge(session::router())
        .merge(admin::router(state.clone()));

    let docs_router: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    api_router.merge(docs_router).with_state(state)
}
