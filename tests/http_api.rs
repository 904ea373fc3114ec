use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use predictions_back::{
    config::AppConfig,
    dao::{
        models::PredictionRecord,
        survey_store::{SurveyStore, memory::MemorySurveyStore},
    },
    routes,
    state::{AppState, SharedState},
};
use serde_json::{Value, json};
use tower::ServiceExt;

const PASSWORD: &str = "s3cret";

async fn app_with(players: &[&str]) -> (Router, SharedState, MemorySurveyStore) {
    let store = MemorySurveyStore::new()
        .with_players(players.iter().copied())
        .await;
    let state = AppState::new(AppConfig::default().with_admin_password(PASSWORD));
    state.set_survey_store(Arc::new(store.clone())).await;
    (routes::router(state.clone()), state, store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_get(uri: &str, password: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(password) = password {
        builder = builder.header("X-Admin-Password", password);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn healthcheck_reports_ok_once_store_is_installed() {
    let (app, state, _) = app_with(&[]).await;

    let (status, body) = send_json(&app, Request::get("/healthcheck").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    state.update_degraded(true);
    let (_, body) = send_json(&app, Request::get("/healthcheck").body(Body::empty()).unwrap()).await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn players_are_listed_sorted_and_empty_when_degraded() {
    let (app, state, _) = app_with(&["Luis", "Ana"]).await;

    let (status, body) = send_json(&app, Request::get("/players").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["players"], json!(["Ana", "Luis"]));

    state.update_degraded(true);
    let (status, body) = send_json(&app, Request::get("/players").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["players"], json!([]));
}

#[tokio::test]
async fn wizard_round_trip_over_http() {
    let (app, _, store) = app_with(&["Ana", "Luis"]).await;

    let (status, session) = send_json(&app, post("/sessions", Value::Null)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = session["id"].as_str().unwrap().to_owned();
    assert_eq!(session["phase"], "unset");

    let (status, _) = send_json(&app, post(&format!("/sessions/{id}/start"), json!({"player": "Pepe"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, started) = send_json(&app, post(&format!("/sessions/{id}/start"), json!({"player": "Ana"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["step"], 1);
    assert_eq!(started["current"]["id"], "past_year");

    let (status, moved) = send_json(
        &app,
        post(
            &format!("/sessions/{id}/next"),
            json!({"answers": {"Palabra 2025": "Caos"}, "skipped": ["Momento Top 2025"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["saved"], true);
    assert_eq!(moved["session"]["step"], 2);

    let (status, _) = send_json(&app, post(&format!("/sessions/{id}/finish"), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let table = store.read_all().await.unwrap();
    let row = table.find("Ana").unwrap();
    assert_eq!(row.get("Palabra 2025"), Some("Caos"));
    assert_eq!(row.get("Momento Top 2025"), Some("Saltado"));

    let (status, _) = send(
        &app,
        Request::delete(format!("/sessions/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Request::get(format!("/sessions/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_the_password() {
    let (app, _, _) = app_with(&["Ana"]).await;

    let (status, _) = send(&app, admin_get("/admin/players", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, admin_get("/admin/players", Some("2026"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send_json(&app, admin_get("/admin/players", Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["players"], json!(["Ana"]));
}

#[tokio::test]
async fn admin_registers_players_once() {
    let (app, _, store) = app_with(&[]).await;

    let request = |name: &str| {
        Request::post("/admin/players")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Admin-Password", PASSWORD)
            .body(Body::from(json!({"name": name}).to_string()))
            .unwrap()
    };

    let (status, body) = send_json(&app, request("Ana")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], true);

    let (status, body) = send_json(&app, request("Ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);

    let (status, _) = send(&app, request("  ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(store.list_players().await.unwrap().len(), 1);
}

#[tokio::test]
async fn csv_export_has_the_column_union() {
    let (app, _, store) = app_with(&["Ana", "Luis"]).await;
    store
        .upsert([("Jugador", "Ana"), ("PalabraYear", "Caos, total")].into_iter().collect::<PredictionRecord>())
        .await
        .unwrap();
    store
        .upsert([("Jugador", "Luis"), ("Expectativa", "Viajar")].into_iter().collect::<PredictionRecord>())
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(admin_get("/admin/predictions/export", Some(PASSWORD)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("predicciones_2026.csv")
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        String::from_utf8(body.to_vec()).unwrap(),
        "Jugador,PalabraYear,Expectativa\nAna,\"Caos, total\",\nLuis,,Viajar\n"
    );
}

#[tokio::test]
async fn insights_tally_peer_predictions() {
    let (app, state, store) = app_with(&["Ana", "Luis"]).await;
    for (player, vote) in [("Ana", "Luis"), ("Luis", "Luis"), ("Pepe", "Saltado")] {
        store
            .upsert([("Jugador", player), ("Comprara Coche", vote)].into_iter().collect::<PredictionRecord>())
            .await
            .unwrap();
    }

    let (status, body) = send_json(&app, admin_get("/admin/insights", Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["respondents"], 3);
    let car = body["peer_predictions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|field| field["key"] == "Comprara Coche")
        .unwrap();
    assert_eq!(car["top"], json!({"value": "Luis", "count": 2}));

    let (_, body) = send_json(
        &app,
        admin_get("/admin/insights/fields/Comprara%20Coche?include_skipped=true", Some(PASSWORD)),
    )
    .await;
    assert_eq!(body["distribution"].as_array().unwrap().len(), 2);

    state.update_degraded(true);
    let (status, body) = send_json(&app, admin_get("/admin/insights", Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["respondents"], 0);
    assert!(body["warning"].is_string());
}

#[tokio::test]
async fn session_creation_is_refused_at_the_cap() {
    let config = AppConfig::default().with_max_sessions(1);
    let state = AppState::new(config);
    state
        .set_survey_store(Arc::new(MemorySurveyStore::new()))
        .await;
    let app = routes::router(state.clone());

    let (status, _) = send_json(&app, post("/sessions", json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(&app, post("/sessions", json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["message"].as_str().unwrap().contains("too many live sessions"));
    assert_eq!(state.session_count(), 1);
}
