use mongodb::bson::{Bson, Document};

use crate::dao::models::{PLAYER_NAME_KEY, PlayerEntity, PredictionRecord};

/// Internal primary key, never surfaced as a column.
pub const ID_FIELD: &str = "_id";

// MongoDB treats `.` as a path separator and reserves a leading `$`, so both are
// swapped for their full-width forms before a key reaches the server.
const DOT: char = '.';
const DOT_ESCAPE: char = '\u{ff0e}';
const DOLLAR: char = '$';
const DOLLAR_ESCAPE: char = '\u{ff04}';

/// Escape a column name so it can be used as a top-level field name.
pub fn encode_field(key: &str) -> String {
    let mut encoded: String = key
        .chars()
        .map(|c| if c == DOT { DOT_ESCAPE } else { c })
        .collect();
    if encoded.starts_with(DOLLAR) {
        encoded.replace_range(..DOLLAR.len_utf8(), &DOLLAR_ESCAPE.to_string());
    }
    encoded
}

/// Inverse of [`encode_field`].
pub fn decode_field(field: &str) -> String {
    let mut decoded: String = field
        .chars()
        .map(|c| if c == DOT_ESCAPE { DOT } else { c })
        .collect();
    if decoded.starts_with(DOLLAR_ESCAPE) {
        decoded.replace_range(..DOLLAR_ESCAPE.len_utf8(), &DOLLAR.to_string());
    }
    decoded
}

/// Build the `$set` body for a record, one escaped field per cell.
pub fn record_to_set_document(record: &PredictionRecord) -> Document {
    let mut document = Document::new();
    for (key, value) in record.iter() {
        document.insert(encode_field(key), value);
    }
    document
}

/// Convert a stored document back into a record, dropping the primary key and nulls.
pub fn document_to_record(document: Document) -> PredictionRecord {
    document
        .into_iter()
        .filter(|(field, _)| field != ID_FIELD)
        .filter_map(|(field, value)| bson_to_cell(value).map(|cell| (decode_field(&field), cell)))
        .collect()
}

pub fn document_to_player(document: &Document) -> Option<PlayerEntity> {
    document
        .get(PLAYER_NAME_KEY)
        .and_then(|value| bson_to_cell(value.clone()))
        .filter(|name| !name.is_empty())
        .map(PlayerEntity::new)
}

/// Cells are strings; values edited by hand in the database are stringified.
fn bson_to_cell(value: Bson) -> Option<String> {
    match value {
        Bson::String(text) => Some(text),
        Bson::Null | Bson::Undefined => None,
        Bson::Boolean(flag) => Some(flag.to_string()),
        Bson::Int32(number) => Some(number.to_string()),
        Bson::Int64(number) => Some(number.to_string()),
        Bson::Double(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{doc, oid::ObjectId};

    use super::*;
    use crate::dao::models::PLAYER_KEY;

    #[test]
    fn field_names_survive_escaping() {
        for key in ["Sobre J.R.", "$precio", "Palabra 2026", "a$b.c"] {
            assert_eq!(decode_field(&encode_field(key)), key);
        }
        assert!(!encode_field("Sobre J.R.").contains('.'));
        assert!(!encode_field("$precio").starts_with('$'));
        assert_eq!(encode_field("a$b"), "a$b");
    }

    #[test]
    fn documents_convert_to_records_without_internal_fields() {
        let mut document = doc! { "_id": ObjectId::new(), PLAYER_KEY: "Ana" };
        document.insert(encode_field("Sobre J.R."), "Saltado");
        document.insert("Votos", 3);
        document.insert("Vacio", Bson::Null);
        let record = document_to_record(document);

        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            vec![PLAYER_KEY, "Sobre J.R.", "Votos"]
        );
        assert_eq!(record.get("Votos"), Some("3"));
    }

    #[test]
    fn set_document_escapes_every_key() {
        let record: PredictionRecord = [(PLAYER_KEY, "Ana"), ("Sobre Mr. X", "Viajar")]
            .into_iter()
            .collect();
        let set = record_to_set_document(&record);
        assert_eq!(set.get_str(PLAYER_KEY).ok(), Some("Ana"));
        assert!(set.contains_key(&encode_field("Sobre Mr. X")));
    }
}
