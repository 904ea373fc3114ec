use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Admin dashboard payloads.
pub mod admin;
/// Health check payloads.
pub mod health;
/// Landing page payloads.
pub mod public;
/// Form session payloads.
pub mod session;
/// Custom validators for request payloads.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    format_offset_time(OffsetDateTime::from(time))
}

fn format_offset_time(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
