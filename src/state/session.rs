//! Per-participant form session: wizard phase plus the answers gathered so far.

use std::{
    future::Future,
    time::{Duration, SystemTime},
};

use time::{OffsetDateTime, macros::format_description};
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{PredictionRecord, TIMESTAMP_KEY},
    error::ServiceError,
    state::wizard::{Plan, Snapshot, WizardEvent, WizardPhase, WizardStateMachine},
};

/// Identifier handed to the client when a session is created.
pub type SessionId = Uuid;

/// In-memory wizard progress for one browser session.
#[derive(Debug, Clone)]
pub struct FormSession {
    id: SessionId,
    machine: WizardStateMachine,
    player: Option<String>,
    answers: PredictionRecord,
    known_players: Vec<String>,
    created_at: SystemTime,
    updated_at: SystemTime,
}

impl FormSession {
    /// Fresh session with no player chosen.
    pub fn new(id: SessionId, total_steps: usize) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            machine: WizardStateMachine::new(total_steps),
            player: None,
            answers: PredictionRecord::new(),
            known_players: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current wizard phase.
    pub fn phase(&self) -> WizardPhase {
        self.machine.phase()
    }

    /// Current 1-based step, if any.
    pub fn current_step(&self) -> Option<usize> {
        self.machine.current_step()
    }

    /// Number of steps of the flow this session walks.
    pub fn total_steps(&self) -> usize {
        self.machine.total_steps()
    }

    /// Participant filling the form.
    pub fn player(&self) -> Option<&str> {
        self.player.as_deref()
    }

    /// Answers gathered so far, including the player identity.
    pub fn answers(&self) -> &PredictionRecord {
        &self.answers
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Time of the last applied transition.
    pub fn updated_at(&self) -> SystemTime {
        self.updated_at
    }

    /// Whether no transition was applied during the last `ttl` before `now`.
    pub fn is_idle(&self, ttl: Duration, now: SystemTime) -> bool {
        now.duration_since(self.updated_at)
            .is_ok_and(|idle| idle >= ttl)
    }

    /// Last registry this session read successfully.
    pub fn known_players(&self) -> &[String] {
        &self.known_players
    }

    /// Keep `players` as the registry fallback for later steps.
    pub fn remember_players(&mut self, players: &[String]) {
        self.known_players = players.to_vec();
    }

    /// State machine snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    /// Participant of a running form, or an error when none was chosen.
    pub fn require_player(&self) -> Result<&str, ServiceError> {
        self.player()
            .ok_or_else(|| ServiceError::InvalidState("no player selected".into()))
    }

    /// Step being filled, or an error outside of the steps.
    pub fn require_step(&self) -> Result<usize, ServiceError> {
        self.current_step().ok_or_else(|| {
            ServiceError::InvalidState(format!("session is {:?}, not on a step", self.phase()))
        })
    }

    /// Copy of the answers with `cells` merged in and the timestamp stamped.
    pub fn staged(&self, cells: &PredictionRecord, now: SystemTime) -> PredictionRecord {
        let mut staged = self.answers.clone();
        staged.merge_from(cells);
        staged.insert(TIMESTAMP_KEY, format_record_timestamp(now));
        staged
    }

    /// Plan `event`, run `work`, then apply the plan or abort it when `work` fails.
    pub async fn run_transition<F, Fut, T>(
        &mut self,
        event: WizardEvent,
        work: F,
    ) -> Result<(T, WizardPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Plan { id: plan_id, .. } = self.machine.plan(event)?;

        match work().await {
            Ok(value) => {
                let next = self.machine.apply(plan_id)?;
                self.updated_at = SystemTime::now();
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.machine.abort(plan_id) {
                    warn!(
                        session = %self.id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                Err(err)
            }
        }
    }

    /// Bind the session to `player`, starting from blank answers.
    pub fn begin(&mut self, player: String) {
        self.answers = PredictionRecord::for_player(&player);
        self.player = Some(player);
    }

    /// Keep `answers` as the session progress.
    pub fn commit(&mut self, answers: PredictionRecord) {
        self.answers = answers;
    }

    /// Forget player and answers so the next participant starts fresh.
    pub fn clear(&mut self) {
        self.player = None;
        self.answers = PredictionRecord::new();
    }
}

/// Format a write time the way the `Timestamp` column stores it.
pub fn format_record_timestamp(time: SystemTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from(time)
        .format(&format)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
