use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{dto::public::CountdownResponse, state::SharedState};

/// Split the time left until `target` into days, hours, minutes and seconds.
pub fn countdown(target: OffsetDateTime, now: OffsetDateTime) -> CountdownResponse {
    let remaining = (target - now).whole_seconds().max(0).unsigned_abs();
    CountdownResponse {
        target: target
            .format(&Rfc3339)
            .unwrap_or_else(|_| "invalid-timestamp".into()),
        arrived: remaining == 0,
        days: remaining / 86_400,
        hours: ((remaining % 86_400) / 3_600) as u8,
        minutes: ((remaining % 3_600) / 60) as u8,
        seconds: (remaining % 60) as u8,
    }
}

/// Countdown to the configured landing target.
pub fn current_countdown(state: &SharedState) -> CountdownResponse {
    countdown(state.config().countdown_target(), OffsetDateTime::now_utc())
}
