use std::sync::Arc;

use indexmap::IndexMap;
use predictions_back::{
    config::AppConfig,
    dao::{
        models::{PLAYER_KEY, TIMESTAMP_KEY},
        survey_store::{SurveyStore, memory::MemorySurveyStore},
    },
    dto::session::StepSubmission,
    services::{record_service, registry_service, wizard_service},
    state::{
        AppState, SharedState,
        steps::{FieldKind, FieldSpec, StepDefinition},
    },
};

fn two_step_flow() -> Vec<StepDefinition> {
    let text = |key: &str| FieldSpec {
        key: key.into(),
        label: key.into(),
        kind: FieldKind::Text,
        skippable: true,
        default: None,
    };
    vec![
        StepDefinition {
            id: "uno".into(),
            title: "Uno".into(),
            fields: vec![text("PalabraYear")],
        },
        StepDefinition {
            id: "dos".into(),
            title: "Dos".into(),
            fields: vec![text("Expectativa")],
        },
    ]
}

async fn state_with(config: AppConfig, players: &[&str]) -> (SharedState, MemorySurveyStore) {
    let store = MemorySurveyStore::new()
        .with_players(players.iter().copied())
        .await;
    let state = AppState::new(config);
    state.set_survey_store(Arc::new(store.clone())).await;
    (state, store)
}

fn answers(values: &[(&str, &str)]) -> StepSubmission {
    StepSubmission {
        answers: values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>(),
        skipped: Vec::new(),
    }
}

#[tokio::test]
async fn completed_form_leaves_a_single_merged_row() {
    let config = AppConfig::default().with_steps(two_step_flow());
    let (state, store) = state_with(config, &["Ana", "Luis"]).await;

    let id = wizard_service::create_session(&state).await.unwrap().id;
    wizard_service::start(&state, id, "Ana".into()).await.unwrap();
    wizard_service::next(&state, id, answers(&[("PalabraYear", "Caos")]))
        .await
        .unwrap();
    let finished = wizard_service::finish(&state, id, answers(&[("Expectativa", "Viajar")]))
        .await
        .unwrap();
    assert!(finished.saved);

    let table = store.read_all().await.unwrap();
    assert_eq!(table.len(), 1);
    let row = table.find("Ana").unwrap();
    assert_eq!(row.get(PLAYER_KEY), Some("Ana"));
    assert_eq!(row.get("PalabraYear"), Some("Caos"));
    assert_eq!(row.get("Expectativa"), Some("Viajar"));
    assert!(row.get(TIMESTAMP_KEY).is_some());
    assert_eq!(row.len(), 4);
    assert!(table.find("Luis").is_none());
}

#[tokio::test]
async fn later_sessions_merge_into_the_existing_row() {
    let config = AppConfig::default().with_steps(two_step_flow());
    let (state, store) = state_with(config, &["Ana"]).await;

    let first = wizard_service::create_session(&state).await.unwrap().id;
    wizard_service::start(&state, first, "Ana".into()).await.unwrap();
    wizard_service::next(&state, first, answers(&[("PalabraYear", "Caos")]))
        .await
        .unwrap();

    let second = wizard_service::create_session(&state).await.unwrap().id;
    wizard_service::start(&state, second, "Ana".into()).await.unwrap();
    wizard_service::next(&state, second, StepSubmission::default())
        .await
        .unwrap();
    wizard_service::finish(&state, second, answers(&[("Expectativa", "Viajar")]))
        .await
        .unwrap();

    let table = store.read_all().await.unwrap();
    assert_eq!(table.len(), 1);
    let row = table.find("Ana").unwrap();
    assert_eq!(row.get("PalabraYear"), Some("Caos"));
    assert_eq!(row.get("Expectativa"), Some("Viajar"));
}

#[tokio::test]
async fn per_player_questions_follow_registry_changes() {
    let (state, _) = state_with(AppConfig::default(), &["Ana", "Luis"]).await;
    let id = wizard_service::create_session(&state).await.unwrap().id;
    wizard_service::start(&state, id, "Ana".into()).await.unwrap();
    for _ in 0..3 {
        wizard_service::next(&state, id, StepSubmission::default())
            .await
            .unwrap();
    }
    let response = wizard_service::next(&state, id, StepSubmission::default())
        .await
        .unwrap();
    let keys = |view: &predictions_back::dto::session::SessionView| {
        view.current
            .as_ref()
            .unwrap()
            .fields
            .iter()
            .map(|field| field.key.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&response.session), vec!["Sobre Luis"]);

    registry_service::add_player(&state, "Marta".into())
        .await
        .unwrap();
    let view = wizard_service::session_view(&state, id).await.unwrap();
    assert_eq!(keys(&view), vec!["Sobre Luis", "Sobre Marta"]);

    let finished = wizard_service::finish(&state, id, answers(&[("Sobre Marta", "Viajará")]))
        .await
        .unwrap();
    assert_eq!(
        finished.record.get("Sobre Marta").map(String::as_str),
        Some("Viajará")
    );
}

#[tokio::test]
async fn concurrent_participants_do_not_lose_rows() {
    let config = AppConfig::default().with_steps(two_step_flow());
    let names: Vec<String> = (0..12).map(|i| format!("Jugador {i}")).collect();
    let (state, _) = state_with(
        config,
        &names.iter().map(String::as_str).collect::<Vec<_>>(),
    )
    .await;

    let mut tasks = Vec::new();
    for name in names.clone() {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            let id = wizard_service::create_session(&state).await.unwrap().id;
            wizard_service::start(&state, id, name.clone()).await.unwrap();
            wizard_service::next(&state, id, answers(&[("PalabraYear", name.as_str())]))
                .await
                .unwrap();
            wizard_service::finish(&state, id, answers(&[("Expectativa", "Viajar")]))
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let table = record_service::read_all(&state).await.unwrap();
    assert_eq!(table.len(), names.len());
    for name in &names {
        let row = table.find(name).unwrap();
        assert_eq!(row.get("PalabraYear"), Some(name.as_str()));
        assert_eq!(row.get("Expectativa"), Some("Viajar"));
    }
}
