//! Read-only summaries over the predictions table for the admin dashboard.

use indexmap::IndexMap;

use crate::{
    config::AppConfig,
    dao::models::{PLAYER_KEY, PredictionRecord, PredictionTable, SKIPPED},
    dto::admin::{
        DistributionQuery, DistributionResponse, ExpectationEntry, FieldVotes, InsightsResponse,
        MoodTile, VoteCount,
    },
    error::ServiceError,
    services::record_service,
    state::{SharedState, steps::FieldKind},
};

const MOOD_COLOR_KEY: &str = "Mood Color";
const MOOD_EMOJI_KEY: &str = "Mood Emoji";
const MOOD_VIBE_KEY: &str = "Mood Vibe";
const WORD_CLOUD_KEY: &str = "Palabra 2026";
const EXPECTATION_KEY: &str = "Expectativa 2026";
const TOP_MOMENT_KEY: &str = "Momento Top 2025";
const DEFAULT_MOOD_COLOR: &str = "#ff4b2b";
const DEFAULT_MOOD_EMOJI: &str = "✨";

/// Which non-answers are counted as values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountOptions {
    /// Count the skipped sentinel.
    pub include_skipped: bool,
    /// Count empty strings.
    pub include_empty: bool,
}

impl From<&DistributionQuery> for CountOptions {
    fn from(value: &DistributionQuery) -> Self {
        Self {
            include_skipped: value.include_skipped,
            include_empty: value.include_empty,
        }
    }
}

/// Value frequencies of `key`, most frequent first. Ties keep first-appearance order and
/// rows without the column are ignored.
pub fn value_counts(table: &PredictionTable, key: &str, options: CountOptions) -> Vec<VoteCount> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for value in table.rows().iter().filter_map(|row| row.get(key)) {
        if value == SKIPPED && !options.include_skipped {
            continue;
        }
        if value.is_empty() && !options.include_empty {
            continue;
        }
        *counts.entry(value).or_default() += 1;
    }

    let mut distribution: Vec<VoteCount> = counts
        .into_iter()
        .map(|(value, count)| VoteCount {
            value: value.to_owned(),
            count,
        })
        .collect();
    distribution.sort_by(|a, b| b.count.cmp(&a.count));
    distribution
}

/// Most frequent value of `key`, if any row holds one.
pub fn top_vote(table: &PredictionTable, key: &str, options: CountOptions) -> Option<VoteCount> {
    value_counts(table, key, options).into_iter().next()
}

/// Every answered value of `key` joined by spaces.
pub fn collect_text(table: &PredictionTable, key: &str) -> String {
    table
        .rows()
        .iter()
        .filter_map(|row| answered(row, key))
        .collect::<Vec<_>>()
        .join(" ")
}

fn answered<'a>(row: &'a PredictionRecord, key: &str) -> Option<&'a str> {
    row.get(key)
        .filter(|value| !value.is_empty() && *value != SKIPPED)
}

/// Moodboard tiles, one per row, with colour and emoji defaults for missing answers.
pub fn moodboard(table: &PredictionTable) -> Vec<MoodTile> {
    table
        .rows()
        .iter()
        .filter_map(|row| {
            let player = row.get(PLAYER_KEY)?;
            Some(MoodTile {
                player: player.to_owned(),
                color: answered(row, MOOD_COLOR_KEY)
                    .unwrap_or(DEFAULT_MOOD_COLOR)
                    .to_owned(),
                emoji: answered(row, MOOD_EMOJI_KEY)
                    .unwrap_or(DEFAULT_MOOD_EMOJI)
                    .to_owned(),
                vibe: answered(row, MOOD_VIBE_KEY).map(str::to_owned),
            })
        })
        .collect()
}

/// Expectations for the coming year, skipping rows that declined to answer.
pub fn expectations(table: &PredictionTable) -> Vec<ExpectationEntry> {
    table
        .rows()
        .iter()
        .filter_map(|row| {
            let player = row.get(PLAYER_KEY)?;
            let expectation = answered(row, EXPECTATION_KEY)?;
            Some(ExpectationEntry {
                player: player.to_owned(),
                vibe: answered(row, MOOD_VIBE_KEY).map(str::to_owned),
                expectation: expectation.to_owned(),
                top_moment: answered(row, TOP_MOMENT_KEY).map(str::to_owned),
            })
        })
        .collect()
}

/// Tallies for every peer-prediction field of the configured flow.
pub fn peer_predictions(config: &AppConfig, table: &PredictionTable) -> Vec<FieldVotes> {
    config
        .steps()
        .iter()
        .flat_map(|step| &step.fields)
        .filter(|field| field.kind == FieldKind::Player)
        .map(|field| {
            let distribution = value_counts(table, &field.key, CountOptions::default());
            FieldVotes {
                key: field.key.clone(),
                label: field.label.clone(),
                top: distribution.first().cloned(),
                distribution,
            }
        })
        .collect()
}

/// Summarise `table` for the dashboard.
pub fn summarize(config: &AppConfig, table: &PredictionTable) -> InsightsResponse {
    InsightsResponse {
        respondents: table.len(),
        moodboard: moodboard(table),
        peer_predictions: peer_predictions(config, table),
        word_cloud_text: collect_text(table, WORD_CLOUD_KEY),
        expectations: expectations(table),
        warning: None,
    }
}

/// Dashboard summary of the stored records. Store failures yield an empty summary.
pub async fn insights(state: &SharedState) -> InsightsResponse {
    let config = state.config();
    match record_service::read_all(state).await {
        Ok(table) => summarize(&config, &table),
        Err(err) => {
            let mut response = summarize(&config, &PredictionTable::default());
            response.warning = Some(warning(&err));
            response
        }
    }
}

/// Tally of an arbitrary column. Store failures yield an empty tally.
pub async fn distribution(
    state: &SharedState,
    key: String,
    query: &DistributionQuery,
) -> DistributionResponse {
    let (table, warning) = match record_service::read_all(state).await {
        Ok(table) => (table, None),
        Err(err) => (PredictionTable::default(), Some(warning(&err))),
    };
    let distribution = value_counts(&table, &key, query.into());

    DistributionResponse {
        top: distribution.first().cloned(),
        key,
        distribution,
        warning,
    }
}

fn warning(err: &ServiceError) -> String {
    tracing::warn!(error = %err, "failed to read predictions for insights");
    format!("predictions unavailable: {err}")
}
