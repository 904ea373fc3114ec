//! Process-local store used for development, tests, and the `memory` backend.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dao::{
    models::{PlayerEntity, PredictionRecord, PredictionTable, UpsertOutcome},
    storage::StorageResult,
    survey_store::SurveyStore,
};

/// Both tables live behind a single lock so every read-merge-write is one critical section.
#[derive(Clone, Default)]
pub struct MemorySurveyStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    players: Vec<PlayerEntity>,
    predictions: PredictionTable,
}

impl MemorySurveyStore {
    /// Empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the players table, skipping duplicates.
    pub async fn with_players<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut tables = self.tables.lock().await;
            for name in names {
                let name = name.into();
                if !tables.players.iter().any(|player| player.name == name) {
                    tables.players.push(PlayerEntity::new(name));
                }
            }
        }
        self
    }
}

impl SurveyStore for MemorySurveyStore {
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.lock().await;
            Ok(guard.players.clone())
        })
    }

    fn add_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.lock().await;
            if guard.players.iter().any(|player| player.name == name) {
                return Ok(false);
            }
            debug!(player = %name, "registering player in memory store");
            guard.players.push(PlayerEntity::new(name));
            Ok(true)
        })
    }

    fn read_all(&self) -> BoxFuture<'static, StorageResult<PredictionTable>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.lock().await;
            Ok(guard.predictions.clone())
        })
    }

    fn upsert(&self, record: PredictionRecord) -> BoxFuture<'static, StorageResult<UpsertOutcome>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.lock().await;
            guard.predictions.upsert(record)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::PLAYER_KEY;

    #[tokio::test]
    async fn add_player_twice_keeps_one_row() {
        let store = MemorySurveyStore::new();
        assert!(store.add_player("Ana".into()).await.unwrap());
        assert!(!store.add_player("Ana".into()).await.unwrap());
        // Identity is case-sensitive.
        assert!(store.add_player("ana".into()).await.unwrap());

        let names: Vec<_> = store
            .list_players()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Ana", "ana"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_are_all_kept() {
        let store = MemorySurveyStore::new();
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.add_player(format!("player-{i}")).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }
        assert_eq!(store.list_players().await.unwrap().len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_for_distinct_players_never_lose_rows() {
        let store = MemorySurveyStore::new();
        let handles: Vec<_> = (0..16)
            .flat_map(|i| {
                let first = store.clone();
                let second = store.clone();
                [
                    tokio::spawn(async move {
                        let record: PredictionRecord =
                            [(PLAYER_KEY.to_owned(), format!("p{i}")), ("A".into(), "1".into())]
                                .into_iter()
                                .collect();
                        first.upsert(record).await
                    }),
                    tokio::spawn(async move {
                        let record: PredictionRecord =
                            [(PLAYER_KEY.to_owned(), format!("p{i}")), ("B".into(), "2".into())]
                                .into_iter()
                                .collect();
                        second.upsert(record).await
                    }),
                ]
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let table = store.read_all().await.unwrap();
        assert_eq!(table.len(), 16);
        for i in 0..16 {
            let row = table.find(&format!("p{i}")).unwrap();
            assert_eq!(row.get("A"), Some("1"));
            assert_eq!(row.get("B"), Some("2"));
        }
    }
}
