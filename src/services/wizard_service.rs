//! Form session transitions. Every Next / Previous / Finish persists the merged answers
//! before the session moves, so navigating in either direction never loses progress.

use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dto::session::{FinishResponse, SessionView, StepSubmission, TransitionResponse},
    error::ServiceError,
    services::{record_service, registry_service},
    state::{
        FormSession, SessionHandle, SessionId, SharedState,
        steps::{StepAnswers, StepContext},
        wizard::WizardEvent,
    },
};

fn session_handle(state: &SharedState, id: SessionId) -> Result<SessionHandle, ServiceError> {
    state
        .session(id)
        .ok_or_else(|| ServiceError::NotFound(format!("session {id} not found")))
}

/// Current registry, or the session's last successful read when the store cannot be reached.
async fn current_players(state: &SharedState, session: &mut FormSession) -> Vec<String> {
    match registry_service::list_players(state).await {
        Ok(players) => {
            session.remember_players(&players);
            players
        }
        Err(err) => {
            warn!(
                session = %session.id(),
                error = %err,
                known = session.known_players().len(),
                "failed to read player registry; using the last known players"
            );
            session.known_players().to_vec()
        }
    }
}

/// Open a blank session.
pub async fn create_session(state: &SharedState) -> Result<SessionView, ServiceError> {
    let handle = state.create_session()?;
    let session = handle.lock().await;
    info!(session = %session.id(), "form session created");
    Ok(SessionView::build(&session, &state.config(), &[]))
}

/// Current state of a session, with its step rendered against the current registry.
pub async fn session_view(state: &SharedState, id: SessionId) -> Result<SessionView, ServiceError> {
    let handle = session_handle(state, id)?;
    let mut session = handle.lock().await;
    let registry = current_players(state, &mut session).await;
    Ok(SessionView::build(&session, &state.config(), &registry))
}

/// Drop a session.
pub fn delete_session(state: &SharedState, id: SessionId) -> Result<(), ServiceError> {
    if state.remove_session(id) {
        info!(session = %id, "form session deleted");
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("session {id} not found")))
    }
}

/// Bind the session to a registered player and enter the first step.
///
/// Previously stored answers are not loaded back: the session starts blank.
pub async fn start(
    state: &SharedState,
    id: SessionId,
    player: String,
) -> Result<SessionView, ServiceError> {
    let handle = session_handle(state, id)?;
    let mut session = handle.lock().await;

    let candidate = player.as_str();
    let (registry, _) = session
        .run_transition(WizardEvent::Start, || async move {
            let registry = registry_service::player_names(state).await;
            if registry.is_empty() {
                return Err(ServiceError::InvalidState("no players registered yet".into()));
            }
            if !registry.iter().any(|name| name == candidate) {
                return Err(ServiceError::InvalidInput(format!(
                    "`{candidate}` is not a registered player"
                )));
            }
            Ok(registry)
        })
        .await?;

    info!(session = %id, player = %player, "form started");
    session.remember_players(&registry);
    session.begin(player);
    Ok(SessionView::build(&session, &state.config(), &registry))
}

/// Save the current step and move forward.
pub async fn next(
    state: &SharedState,
    id: SessionId,
    submission: StepSubmission,
) -> Result<TransitionResponse, ServiceError> {
    navigate(state, id, WizardEvent::Next, submission.into()).await
}

/// Save the current step and move back.
pub async fn previous(
    state: &SharedState,
    id: SessionId,
    submission: StepSubmission,
) -> Result<TransitionResponse, ServiceError> {
    navigate(state, id, WizardEvent::Previous, submission.into()).await
}

async fn navigate(
    state: &SharedState,
    id: SessionId,
    event: WizardEvent,
    answers: StepAnswers,
) -> Result<TransitionResponse, ServiceError> {
    let handle = session_handle(state, id)?;
    let mut session = handle.lock().await;
    let config = state.config();

    let index = session.require_step()?;
    let player = session.require_player()?.to_owned();
    let step = config
        .step(index)
        .ok_or_else(|| ServiceError::InvalidState(format!("step {index} is not configured")))?;

    let registry = current_players(state, &mut session).await;
    let ctx = StepContext {
        registry: &registry,
        player: &player,
        allow_self_vote: config.allow_self_vote(),
    };
    let cells = step.collect(&ctx, &answers)?;
    let staged = session.staged(&cells, SystemTime::now());

    let record = staged.clone();
    let (saved, phase) = session
        .run_transition(event, || async move { Ok(record_service::save(state, record).await) })
        .await?;
    session.commit(staged);

    info!(session = %id, player = %player, ?event, ?phase, saved, "step submitted");
    Ok(TransitionResponse {
        saved,
        session: SessionView::build(&session, &config, &registry),
    })
}

/// Save the last step with defaults for unanswered optional fields, then reset the session.
///
/// When the final write does not reach the store the session stays on the last step with
/// the submitted answers, so the participant can finish again later.
pub async fn finish(
    state: &SharedState,
    id: SessionId,
    submission: StepSubmission,
) -> Result<FinishResponse, ServiceError> {
    let handle = session_handle(state, id)?;
    let mut session = handle.lock().await;
    let config = state.config();

    let index = session.require_step()?;
    let player = session.require_player()?.to_owned();
    let step = config
        .step(index)
        .ok_or_else(|| ServiceError::InvalidState(format!("step {index} is not configured")))?;

    let registry = current_players(state, &mut session).await;
    let ctx = StepContext {
        registry: &registry,
        player: &player,
        allow_self_vote: config.allow_self_vote(),
    };
    let cells = step.collect(&ctx, &submission.into())?;
    let staged = session.staged(&cells, SystemTime::now());
    let mut record = staged.clone();
    for definition in config.steps() {
        for (key, value) in definition.missing_defaults(&ctx, &record) {
            record.insert(key, value);
        }
    }

    let final_record = record.clone();
    let outcome = session
        .run_transition(WizardEvent::Finish, || async move {
            if record_service::save(state, final_record).await {
                Ok(())
            } else {
                Err(ServiceError::Degraded)
            }
        })
        .await;

    let saved = match outcome {
        Ok(((), phase)) => {
            session.clear();
            info!(session = %id, player = %player, ?phase, "form finished");
            true
        }
        Err(ServiceError::Degraded) => {
            session.commit(staged);
            warn!(
                session = %id,
                player = %player,
                "final answers not saved; staying on the last step"
            );
            false
        }
        Err(err) => return Err(err),
    };

    Ok(FinishResponse {
        saved,
        record: record.into_fields(),
        session: SessionView::build(&session, &config, &registry),
    })
}

/// Abandon the current progress and go back to player selection.
pub async fn reset(state: &SharedState, id: SessionId) -> Result<SessionView, ServiceError> {
    let handle = session_handle(state, id)?;
    let mut session = handle.lock().await;

    session
        .run_transition(WizardEvent::Reset, || async { Ok(()) })
        .await?;
    session.clear();

    info!(session = %id, "form reset");
    Ok(SessionView::build(&session, &state.config(), &[]))
}
