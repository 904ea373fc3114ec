use tracing::{debug, warn};

use crate::{
    dao::models::{PredictionRecord, PredictionTable},
    error::ServiceError,
    state::SharedState,
};

/// Every stored record. A missing table reads as empty.
pub async fn read_all(state: &SharedState) -> Result<PredictionTable, ServiceError> {
    let store = state.require_survey_store().await?;
    match store.read_all().await {
        Ok(table) => Ok(table),
        Err(err) if err.is_not_found() => Ok(PredictionTable::default()),
        Err(err) => Err(err.into()),
    }
}

/// Every stored record, or an empty table when the store cannot be read.
pub async fn read_all_or_empty(state: &SharedState) -> PredictionTable {
    match read_all(state).await {
        Ok(table) => table,
        Err(err) => {
            warn!(error = %err, "failed to read predictions; using an empty table");
            PredictionTable::default()
        }
    }
}

/// Merge `record` into the participant's row.
pub async fn upsert(state: &SharedState, record: PredictionRecord) -> Result<(), ServiceError> {
    let store = state.require_survey_store().await?;
    let outcome = store.upsert(record).await?;
    debug!(?outcome, "prediction saved");
    Ok(())
}

/// Merge `record` into the participant's row, reporting failures as `false`.
pub async fn save(state: &SharedState, record: PredictionRecord) -> bool {
    let player = record.player().unwrap_or_default().to_owned();
    match upsert(state, record).await {
        Ok(()) => true,
        Err(err) => {
            warn!(player = %player, error = %err, "failed to save prediction; progress kept in session");
            false
        }
    }
}
