/// Per-participant form sessions.
pub mod session;
/// Step definitions and submission collection.
pub mod steps;
/// Plan/apply/abort wizard state machine.
pub mod wizard;

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::{config::AppConfig, dao::survey_store::SurveyStore, error::ServiceError};

pub use self::session::{FormSession, SessionId};
pub use self::wizard::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

/// Application state shared by every handler and background task.
pub type SharedState = Arc<AppState>;
/// Session behind its own lock so transitions of one session are serialized.
pub type SessionHandle = Arc<Mutex<FormSession>>;

/// Central application state holding the store handle, configuration and live sessions.
pub struct AppState {
    survey_store: RwLock<Option<Arc<dyn SurveyStore>>>,
    sessions: DashMap<SessionId, SessionHandle>,
    config: Arc<AppConfig>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            survey_store: RwLock::new(None),
            sessions: DashMap::new(),
            config: Arc::new(config),
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn survey_store(&self) -> Option<Arc<dyn SurveyStore>> {
        let guard = self.survey_store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle for an operation, failing while degraded.
    pub async fn require_survey_store(&self) -> Result<Arc<dyn SurveyStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.survey_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_survey_store(&self, store: Arc<dyn SurveyStore>) {
        {
            let mut guard = self.survey_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_survey_store(&self) {
        {
            let mut guard = self.survey_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Register a blank session for the configured flow, refusing once the cap is reached.
    pub fn create_session(&self) -> Result<SessionHandle, ServiceError> {
        let limit = self.config.max_sessions();
        if self.sessions.len() >= limit {
            return Err(ServiceError::TooManySessions { limit });
        }
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(FormSession::new(id, self.config.total_steps())));
        self.sessions.insert(id, handle.clone());
        Ok(handle)
    }

    /// Drop sessions idle for at least the configured lifetime, returning how many went.
    ///
    /// Sessions locked by an in-flight request are kept.
    pub fn evict_idle_sessions(&self, now: SystemTime) -> usize {
        let ttl = self.config.session_idle_ttl();
        let mut evicted = 0;
        self.sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) if session.is_idle(ttl, now) => {
                evicted += 1;
                false
            }
            _ => true,
        });
        evicted
    }

    /// Look up a live session.
    pub fn session(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop a session, returning whether it existed.
    pub fn remove_session(&self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::survey_store::memory::MemorySurveyStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_survey_store().await,
            Err(ServiceError::Degraded)
        ));

        state.set_survey_store(Arc::new(MemorySurveyStore::new())).await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_survey_store().await.is_ok());

        state.update_degraded(true);
        assert!(state.require_survey_store().await.is_err());
        assert!(state.survey_store().await.is_some());

        state.clear_survey_store().await;
        assert!(state.survey_store().await.is_none());
    }

    #[tokio::test]
    async fn sessions_are_keyed_by_id() {
        let state = AppState::new(AppConfig::default());
        let first = state.create_session().unwrap();
        let second = state.create_session().unwrap();

        let first_id = first.lock().await.id();
        let second_id = second.lock().await.id();
        assert_ne!(first_id, second_id);
        assert_eq!(state.session_count(), 2);

        assert!(state.session(first_id).is_some());
        assert!(state.remove_session(first_id));
        assert!(!state.remove_session(first_id));
        assert!(state.session(first_id).is_none());
        assert!(state.session(second_id).is_some());
    }

    #[tokio::test]
    async fn session_cap_refuses_new_sessions() {
        let state = AppState::new(AppConfig::default().with_max_sessions(2));
        state.create_session().unwrap();
        state.create_session().unwrap();

        assert!(matches!(
            state.create_session(),
            Err(ServiceError::TooManySessions { limit: 2 })
        ));
        assert_eq!(state.session_count(), 2);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let ttl = Duration::from_secs(60);
        let state = AppState::new(AppConfig::default().with_session_idle_ttl(ttl));
        let idle = state.create_session().unwrap();
        let busy = state.create_session().unwrap();
        let idle_id = idle.lock().await.id();
        let busy_id = busy.lock().await.id();
        let later = SystemTime::now() + ttl + Duration::from_secs(1);

        assert_eq!(state.evict_idle_sessions(SystemTime::now()), 0);

        let _guard = busy.lock().await;
        assert_eq!(state.evict_idle_sessions(later), 1);
        assert!(state.session(idle_id).is_none());
        assert!(state.session(busy_id).is_some());
    }
}
