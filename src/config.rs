//! Application-level configuration loading: wizard steps, landing countdown and admin secret.

use std::{env, fmt, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::datetime};
use tracing::{info, warn};

use crate::state::steps::{StepDefinition, reference_steps, validate_steps};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PREDICTIONS_BACK_CONFIG_PATH";
/// Environment variable holding the admin shared secret.
const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";
/// Insecure placeholder used when no admin secret is configured.
pub const PLACEHOLDER_ADMIN_PASSWORD: &str = "2026";
/// Landing countdown target used when none is configured.
const DEFAULT_COUNTDOWN_TARGET: OffsetDateTime = datetime!(2026-01-01 00:00 UTC);
/// Sessions without a transition for this long are evicted.
const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
/// Upper bound on live form sessions.
const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Shared secret gating the admin surface.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSecret(String);

impl AdminSecret {
    /// Wrap a configured secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Compare operator input against the secret.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        expected.len() == candidate.len()
            && expected
                .iter()
                .zip(candidate)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    /// Whether the built-in placeholder is in use.
    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_ADMIN_PASSWORD
    }
}

impl Default for AdminSecret {
    fn default() -> Self {
        Self::new(PLACEHOLDER_ADMIN_PASSWORD)
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(***)")
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    steps: Vec<StepDefinition>,
    countdown_target: OffsetDateTime,
    allow_self_vote: bool,
    admin_secret: AdminSecret,
    session_idle_ttl: Duration,
    max_sessions: usize,
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to the built-in
    /// five-step flow.
    pub fn load() -> Self {
        let mut config = Self::from_file();

        match env::var(ADMIN_PASSWORD_ENV) {
            Ok(secret) if !secret.is_empty() => config.admin_secret = AdminSecret::new(secret),
            _ => {}
        }
        if config.admin_secret.is_placeholder() {
            warn!(
                env = ADMIN_PASSWORD_ENV,
                "admin password not configured; using the insecure placeholder"
            );
        }

        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        steps = app_config.steps.len(),
                        "loaded wizard configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Ordered wizard steps.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Step at 1-based `index`.
    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        index.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// Number of steps in the wizard.
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Moment the landing countdown reaches zero.
    pub fn countdown_target(&self) -> OffsetDateTime {
        self.countdown_target
    }

    /// Whether peer predictions may name the participant themself.
    pub fn allow_self_vote(&self) -> bool {
        self.allow_self_vote
    }

    /// Admin shared secret.
    pub fn admin_secret(&self) -> &AdminSecret {
        &self.admin_secret
    }

    /// How long a session may sit without a transition before it is evicted.
    pub fn session_idle_ttl(&self) -> Duration {
        self.session_idle_ttl
    }

    /// Maximum number of live sessions.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Replace the wizard steps.
    pub fn with_steps(mut self, steps: Vec<StepDefinition>) -> Self {
        self.steps = steps;
        self
    }

    /// Replace the admin secret.
    pub fn with_admin_password(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = AdminSecret::new(secret);
        self
    }

    /// Replace the self-vote policy.
    pub fn with_allow_self_vote(mut self, allow: bool) -> Self {
        self.allow_self_vote = allow;
        self
    }

    /// Replace the countdown target.
    pub fn with_countdown_target(mut self, target: OffsetDateTime) -> Self {
        self.countdown_target = target;
        self
    }

    /// Replace the idle session lifetime.
    pub fn with_session_idle_ttl(mut self, ttl: Duration) -> Self {
        self.session_idle_ttl = ttl;
        self
    }

    /// Replace the live session cap.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            steps: reference_steps(),
            countdown_target: DEFAULT_COUNTDOWN_TARGET,
            allow_self_vote: true,
            admin_secret: AdminSecret::default(),
            session_idle_ttl: DEFAULT_SESSION_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    steps: Option<Vec<StepDefinition>>,
    #[serde(default)]
    countdown_target: Option<String>,
    #[serde(default)]
    allow_self_vote: Option<bool>,
    #[serde(default)]
    admin_password: Option<String>,
    #[serde(default)]
    session_idle_minutes: Option<u64>,
    #[serde(default)]
    max_sessions: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut config = Self::default();

        if let Some(steps) = value.steps {
            match validate_steps(&steps) {
                Ok(()) => config.steps = steps,
                Err(reason) => warn!(%reason, "invalid step configuration; using built-in steps"),
            }
        }

        if let Some(target) = value.countdown_target {
            match OffsetDateTime::parse(&target, &Rfc3339) {
                Ok(parsed) => config.countdown_target = parsed,
                Err(err) => warn!(
                    value = %target,
                    error = %err,
                    "invalid countdown target; using default"
                ),
            }
        }

        if let Some(allow) = value.allow_self_vote {
            config.allow_self_vote = allow;
        }

        if let Some(secret) = value.admin_password.filter(|secret| !secret.is_empty()) {
            config.admin_secret = AdminSecret::new(secret);
        }

        match value.session_idle_minutes {
            Some(0) => warn!("session idle lifetime must be positive; using default"),
            Some(minutes) => {
                config.session_idle_ttl = Duration::from_secs(minutes.saturating_mul(60))
            }
            None => {}
        }

        match value.max_sessions {
            Some(0) => warn!("session cap must be positive; using default"),
            Some(max) => config.max_sessions = max,
            None => {}
        }

        config
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
