use std::time::{Duration, SystemTime};

use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::state::SharedState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically drop form sessions that saw no transition within the configured lifetime.
pub async fn run(state: SharedState) {
    let mut ticker = interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep(&state, SystemTime::now());
    }
}

fn sweep(state: &SharedState, now: SystemTime) -> usize {
    let evicted = state.evict_idle_sessions(now);
    if evicted > 0 {
        info!(
            evicted,
            remaining = state.session_count(),
            "evicted idle form sessions"
        );
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn sweep_drops_only_expired_sessions() {
        let ttl = Duration::from_secs(600);
        let state = AppState::new(AppConfig::default().with_session_idle_ttl(ttl));
        for _ in 0..3 {
            state.create_session().unwrap();
        }

        assert_eq!(sweep(&state, SystemTime::now()), 0);
        assert_eq!(state.session_count(), 3);

        assert_eq!(sweep(&state, SystemTime::now() + ttl), 3);
        assert_eq!(state.session_count(), 0);
    }
}
