/// CouchDB backend.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// In-process backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{PlayerEntity, PredictionRecord, PredictionTable, UpsertOutcome};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the backing store holding the `Players` and `Predictions` tables.
///
/// Implementations must make `add_player` and `upsert` atomic with respect to
/// concurrent callers: two participants writing at the same time never lose
/// each other's rows.
pub trait SurveyStore: Send + Sync {
    /// Every registered player, in registration order.
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Register `name` unless already present. Returns `true` when a row was added.
    fn add_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Every stored prediction row, in first-insertion order.
    fn read_all(&self) -> BoxFuture<'static, StorageResult<PredictionTable>>;
    /// Merge `record` into the row sharing its `Jugador` identity, or append it.
    fn upsert(&self, record: PredictionRecord) -> BoxFuture<'static, StorageResult<UpsertOutcome>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
