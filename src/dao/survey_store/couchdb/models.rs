use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::dao::models::{PlayerEntity, PredictionRecord};

/// Id prefix of player documents.
pub const PLAYER_PREFIX: &str = "player::";
/// Id prefix of prediction documents.
pub const PREDICTION_PREFIX: &str = "prediction::";
/// Appended to a prefix to close an `_all_docs` key range.
pub const END_SUFFIX: &str = "\u{ffff}";

/// `_all_docs` payload with `include_docs=true`.
#[derive(Debug, Deserialize)]
pub struct AllDocsResponse<T> {
    /// One row per document in the requested key range.
    pub rows: Vec<AllDocsRow<T>>,
}

/// `_all_docs` row carrying its document.
#[derive(Debug, Deserialize)]
pub struct AllDocsRow<T> {
    /// Document body, absent for rows without one.
    pub doc: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "Nombre")]
    pub name: String,
    pub created_at: SystemTime,
}

impl CouchPlayerDocument {
    pub fn new(name: String) -> Self {
        Self {
            id: player_doc_id(&name),
            rev: None,
            name,
            created_at: SystemTime::now(),
        }
    }
}

impl From<CouchPlayerDocument> for PlayerEntity {
    fn from(doc: CouchPlayerDocument) -> Self {
        PlayerEntity::new(doc.name)
    }
}

/// Cells live under `fields` because CouchDB reserves top-level keys starting with `_`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPredictionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub fields: PredictionRecord,
}

impl CouchPredictionDocument {
    /// Fold `incoming` into the stored document, or start a new one when none exists.
    pub fn merged(existing: Option<Self>, player: &str, incoming: &PredictionRecord) -> Self {
        let now = SystemTime::now();
        match existing {
            Some(mut doc) => {
                doc.fields.merge_from(incoming);
                doc.updated_at = now;
                doc
            }
            None => Self {
                id: prediction_doc_id(player),
                rev: None,
                created_at: now,
                updated_at: now,
                fields: incoming.clone(),
            },
        }
    }
}

pub fn player_doc_id(name: &str) -> String {
    format!("{}{}", PLAYER_PREFIX, name)
}

pub fn prediction_doc_id(player: &str) -> String {
    format!("{}{}", PREDICTION_PREFIX, player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::PLAYER_KEY;

    #[test]
    fn merged_document_keeps_revision_and_previous_cells() {
        let first: PredictionRecord = [(PLAYER_KEY, "Ana"), ("PalabraYear", "Caos")]
            .into_iter()
            .collect();
        let mut stored = CouchPredictionDocument::merged(None, "Ana", &first);
        assert_eq!(stored.id, "prediction::Ana");
        stored.rev = Some("1-abc".into());

        let second: PredictionRecord = [(PLAYER_KEY, "Ana"), ("Expectativa", "Viajar")]
            .into_iter()
            .collect();
        let merged = CouchPredictionDocument::merged(Some(stored), "Ana", &second);

        assert_eq!(merged.rev.as_deref(), Some("1-abc"));
        assert_eq!(merged.fields.get("PalabraYear"), Some("Caos"));
        assert_eq!(merged.fields.get("Expectativa"), Some("Viajar"));
        assert!(merged.updated_at >= merged.created_at);
    }

    #[test]
    fn listed_predictions_keep_their_column_order() {
        let payload = r#"{"total_rows": 1, "offset": 0, "rows": [
            {"id": "prediction::Ana", "key": "prediction::Ana", "value": {"rev": "2-b"},
             "doc": {"_id": "prediction::Ana", "_rev": "2-b",
                     "created_at": {"secs_since_epoch": 0, "nanos_since_epoch": 0},
                     "updated_at": {"secs_since_epoch": 0, "nanos_since_epoch": 0},
                     "fields": {"Jugador": "Ana", "Zeta": "z", "Alfa": "a", "Timestamp": "t"}}}
        ]}"#;
        let response: AllDocsResponse<CouchPredictionDocument> =
            serde_json::from_str(payload).unwrap();
        let doc = response.rows.into_iter().next().and_then(|row| row.doc).unwrap();

        assert_eq!(
            doc.fields.keys().collect::<Vec<_>>(),
            vec![PLAYER_KEY, "Zeta", "Alfa", "Timestamp"]
        );
    }

    #[test]
    fn prediction_document_serializes_fields_as_an_object() {
        let fields: PredictionRecord = [(PLAYER_KEY, "Luis")].into_iter().collect();
        let doc = CouchPredictionDocument::merged(None, "Luis", &fields);
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["_id"], "prediction::Luis");
        assert!(value.get("_rev").is_none());
        assert_eq!(value["fields"][PLAYER_KEY], "Luis");
    }
}
