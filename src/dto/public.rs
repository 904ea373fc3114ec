use serde::Serialize;
use utoipa::ToSchema;

/// Time left until the landing page target.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct CountdownResponse {
    /// Target moment (RFC 3339).
    pub target: String,
    /// Whether the target has been reached.
    pub arrived: bool,
    /// Whole days left.
    pub days: u64,
    /// Hours left within the day.
    pub hours: u8,
    /// Minutes left within the hour.
    pub minutes: u8,
    /// Seconds left within the minute.
    pub seconds: u8,
}

/// Registered participants offered for selection.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerChoices {
    /// Sorted player names; empty when the registry is unavailable.
    pub players: Vec<String>,
}
