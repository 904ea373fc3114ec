use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dto::validation::validate_player_name;

/// Registers a new participant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddPlayerRequest {
    /// Name to register.
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// Outcome of a registration.
#[derive(Debug, Serialize, ToSchema)]
pub struct AddPlayerResponse {
    /// Registered name.
    pub name: String,
    /// `false` when the name was already registered.
    pub created: bool,
}

/// Registry as seen by the admin.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayersResponse {
    /// Names in registration order.
    pub players: Vec<String>,
    /// Set when the store could not be read; `players` is then empty.
    pub warning: Option<String>,
}

/// Raw predictions table.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionTableResponse {
    /// Union of all written columns, in first-write order.
    pub columns: Vec<String>,
    /// Stored rows in insertion order.
    pub rows: Vec<IndexMap<String, String>>,
    /// Set when the store could not be read; the table is then empty.
    pub warning: Option<String>,
}

/// One value and how many rows hold it.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct VoteCount {
    /// Answer.
    pub value: String,
    /// Rows holding it.
    pub count: usize,
}

/// Tally of a peer-prediction question.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct FieldVotes {
    /// Record column.
    pub key: String,
    /// Question as configured.
    pub label: String,
    /// Most voted answer.
    pub top: Option<VoteCount>,
    /// Every answer by descending count.
    pub distribution: Vec<VoteCount>,
}

/// A participant's moodboard tile.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct MoodTile {
    /// Participant.
    pub player: String,
    /// Color of the year.
    pub color: String,
    /// Emoji of the year.
    pub emoji: String,
    /// Year in one sentence.
    pub vibe: Option<String>,
}

/// A participant's expectations for the coming year.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct ExpectationEntry {
    /// Participant.
    pub player: String,
    /// Year in one sentence.
    pub vibe: Option<String>,
    /// Expectations for the year.
    pub expectation: String,
    /// Top moment of the past year.
    pub top_moment: Option<String>,
}

/// Dashboard summary of every stored record.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct InsightsResponse {
    /// Number of participants with a stored row.
    pub respondents: usize,
    /// One tile per respondent.
    pub moodboard: Vec<MoodTile>,
    /// Tallies of every peer-prediction question.
    pub peer_predictions: Vec<FieldVotes>,
    /// Words for the next year joined by spaces, for external word-cloud analysis.
    pub word_cloud_text: String,
    /// Answered expectations.
    pub expectations: Vec<ExpectationEntry>,
    /// Set when the store could not be read; the summary is then empty.
    pub warning: Option<String>,
}

/// Options for an arbitrary column tally.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DistributionQuery {
    /// Count the skipped sentinel as a value.
    #[serde(default)]
    pub include_skipped: bool,
    /// Count empty answers as a value.
    #[serde(default)]
    pub include_empty: bool,
}

/// Tally of an arbitrary column.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct DistributionResponse {
    /// Record column.
    pub key: String,
    /// Most frequent value.
    pub top: Option<VoteCount>,
    /// Every value by descending count.
    pub distribution: Vec<VoteCount>,
    /// Set when the store could not be read.
    pub warning: Option<String>,
}
