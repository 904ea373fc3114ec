use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the predictions backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::countdown,
        crate::routes::public::players,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::session::delete_session,
        crate::routes::session::start_session,
        crate::routes::session::next_step,
        crate::routes::session::previous_step,
        crate::routes::session::finish_session,
        crate::routes::session::reset_session,
        crate::routes::admin::list_players,
        crate::routes::admin::add_player,
        crate::routes::admin::list_predictions,
        crate::routes::admin::export_predictions,
        crate::routes::admin::insights,
        crate::routes::admin::field_distribution,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::public::CountdownResponse,
            crate::dto::public::PlayerChoices,
            crate::dto::session::StartSessionRequest,
            crate::dto::session::StepSubmission,
            crate::dto::session::SessionView,
            crate::dto::session::TransitionResponse,
            crate::dto::session::FinishResponse,
            crate::dto::admin::AddPlayerRequest,
            crate::dto::admin::AddPlayerResponse,
            crate::dto::admin::PlayersResponse,
            crate::dto::admin::PredictionTableResponse,
            crate::dto::admin::InsightsResponse,
            crate::dto::admin::DistributionResponse,
            crate::state::steps::StepDefinition,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Landing page and player selection"),
        (name = "sessions", description = "Predictions form wizard"),
        (name = "admin", description = "Dashboard endpoints gated by the admin password"),
    )
)]
pub struct ApiDoc;
