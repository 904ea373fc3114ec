use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dao::storage::{StorageError, StorageResult};

/// Column holding the player identity of a prediction row.
pub const PLAYER_KEY: &str = "Jugador";
/// Column holding the last-write time of a prediction row.
pub const TIMESTAMP_KEY: &str = "Timestamp";
/// Column holding the name of a registered player.
pub const PLAYER_NAME_KEY: &str = "Nombre";
/// Reserved answer meaning the participant declined to answer.
pub const SKIPPED: &str = "Saltado";

/// Name of the players table.
pub const PLAYERS_TABLE: &str = "Players";
/// Name of the predictions table.
pub const PREDICTIONS_TABLE: &str = "Predictions";

/// Registered participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Case-sensitive identity of the player.
    #[serde(rename = "Nombre")]
    pub name: String,
}

impl PlayerEntity {
    /// Player named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A single predictions row: question key to answer, in first-write order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRecord {
    fields: IndexMap<String, String>,
}

/// Whether an upsert created a row or merged into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed for the player.
    Inserted,
    /// The player's row was merged.
    Updated,
}

impl PredictionRecord {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a record carrying only the player identity.
    pub fn for_player(name: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.insert(PLAYER_KEY, name);
        record
    }

    /// Player identity of the row, when present and non-empty.
    pub fn player(&self) -> Option<&str> {
        self.get(PLAYER_KEY).filter(|name| !name.is_empty())
    }

    /// Like [`Self::player`] but failing with [`StorageError::InvalidRecord`].
    pub fn require_player(&self) -> StorageResult<&str> {
        self.player().ok_or_else(|| StorageError::InvalidRecord {
            reason: format!("missing `{PLAYER_KEY}` field"),
        })
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Whether `key` has a cell.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a cell. Existing keys keep their position; new keys are appended.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(key.into(), value.into())
    }

    /// Overwrite every cell present in `incoming`, leaving the other cells untouched.
    pub fn merge_from(&mut self, incoming: &PredictionRecord) {
        for (key, value) in incoming.iter() {
            self.insert(key, value);
        }
    }

    /// Cells in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Columns in first-write order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no cells.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Underlying column map.
    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    /// Consume into the column map.
    pub fn into_fields(self) -> IndexMap<String, String> {
        self.fields
    }
}

impl From<IndexMap<String, String>> for PredictionRecord {
    fn from(fields: IndexMap<String, String>) -> Self {
        Self { fields }
    }
}

impl<K, V> FromIterator<(K, V)> for PredictionRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Every stored prediction row, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredictionTable {
    rows: Vec<PredictionRecord>,
}

impl PredictionTable {
    /// Table over `rows`, kept in the given order.
    pub fn new(rows: Vec<PredictionRecord>) -> Self {
        Self { rows }
    }

    /// Union of all ever-written columns, ordered by first appearance.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: IndexMap<&str, ()> = IndexMap::new();
        for row in &self.rows {
            for key in row.keys() {
                columns.entry(key).or_insert(());
            }
        }
        columns.into_keys().map(str::to_owned).collect()
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[PredictionRecord] {
        &self.rows
    }

    /// Consume into the rows.
    pub fn into_rows(self) -> Vec<PredictionRecord> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no row is stored.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row stored for `player`, if any.
    pub fn find(&self, player: &str) -> Option<&PredictionRecord> {
        self.rows.iter().find(|row| row.player() == Some(player))
    }

    /// Merge `record` into the row sharing its identity, or append it as a new row.
    pub fn upsert(&mut self, record: PredictionRecord) -> StorageResult<UpsertOutcome> {
        let player = record.require_player()?;
        let position = self.rows.iter().position(|row| row.player() == Some(player));
        match position {
            Some(index) => {
                self.rows[index].merge_from(&record);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.rows.push(record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }
}
