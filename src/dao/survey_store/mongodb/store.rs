use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{ID_FIELD, document_to_player, document_to_record, record_to_set_document},
};
use crate::dao::{
    models::{
        PLAYER_KEY, PLAYER_NAME_KEY, PLAYERS_TABLE, PREDICTIONS_TABLE, PlayerEntity,
        PredictionRecord, PredictionTable, UpsertOutcome,
    },
    storage::StorageResult,
    survey_store::SurveyStore,
};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB backend: one document per player in `Players`, one per prediction row in
/// `Predictions`. Both writes are single-document atomic upserts.
#[derive(Clone)]
pub struct MongoSurveyStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.database.write().await;
        *guard = database;
        Ok(())
    }
}

impl MongoSurveyStore {
    /// Establish a connection to MongoDB and ensure the identity indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let players_index = IndexModel::builder()
            .keys(doc! { PLAYER_NAME_KEY: 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("player_name_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.players()
            .await
            .create_index(players_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYERS_TABLE,
                index: PLAYER_NAME_KEY,
                source,
            })?;

        let predictions_index = IndexModel::builder()
            .keys(doc! { PLAYER_KEY: 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("prediction_player_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.predictions()
            .await
            .create_index(predictions_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PREDICTIONS_TABLE,
                index: PLAYER_KEY,
                source,
            })?;

        Ok(())
    }

    async fn players(&self) -> Collection<Document> {
        let guard = self.inner.database.read().await;
        guard.collection::<Document>(PLAYERS_TABLE)
    }

    async fn predictions(&self) -> Collection<Document> {
        let guard = self.inner.database.read().await;
        guard.collection::<Document>(PREDICTIONS_TABLE)
    }

    async fn list_players(&self) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<Document> = self
            .players()
            .await
            .find(doc! {})
            .sort(doc! { ID_FIELD: 1 })
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?;

        Ok(documents.iter().filter_map(document_to_player).collect())
    }

    async fn add_player(&self, name: String) -> MongoResult<bool> {
        let result = self
            .players()
            .await
            .update_one(
                doc! { PLAYER_NAME_KEY: name.as_str() },
                doc! { "$setOnInsert": { PLAYER_NAME_KEY: name.as_str() } },
            )
            .upsert(true)
            .await;

        match result {
            Ok(outcome) => Ok(outcome.upserted_id.is_some()),
            // Another admin registered the same name between our filter and insert.
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::AddPlayer { name, source }),
        }
    }

    async fn read_all(&self) -> MongoResult<PredictionTable> {
        let documents: Vec<Document> = self
            .predictions()
            .await
            .find(doc! {})
            .sort(doc! { ID_FIELD: 1 })
            .await
            .map_err(|source| MongoDaoError::ReadPredictions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ReadPredictions { source })?;

        Ok(PredictionTable::new(
            documents.into_iter().map(document_to_record).collect(),
        ))
    }

    async fn upsert(&self, record: PredictionRecord) -> MongoResult<UpsertOutcome> {
        let player = record
            .player()
            .ok_or_else(|| MongoDaoError::InvalidRecord {
                reason: format!("missing `{PLAYER_KEY}` field"),
            })?
            .to_owned();

        let filter = doc! { PLAYER_KEY: player.as_str() };
        let update = doc! { "$set": record_to_set_document(&record) };
        let collection = self.predictions().await;

        let mut retried = false;
        loop {
            match collection
                .update_one(filter.clone(), update.clone())
                .upsert(true)
                .await
            {
                Ok(result) if result.upserted_id.is_some() => return Ok(UpsertOutcome::Inserted),
                Ok(_) => return Ok(UpsertOutcome::Updated),
                // Two first writes for the same player raced on the unique index; the
                // loser retries and merges into the row the winner created.
                Err(err) if is_duplicate_key(&err) && !retried => {
                    debug!(player = %player, "duplicate key on prediction upsert; retrying");
                    retried = true;
                }
                Err(source) => return Err(MongoDaoError::UpsertPrediction { player, source }),
            }
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl SurveyStore for MongoSurveyStore {
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players().await.map_err(Into::into) })
    }

    fn add_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.add_player(name).await.map_err(Into::into) })
    }

    fn read_all(&self) -> BoxFuture<'static, StorageResult<PredictionTable>> {
        let store = self.clone();
        Box::pin(async move { store.read_all().await.map_err(Into::into) })
    }

    fn upsert(&self, record: PredictionRecord) -> BoxFuture<'static, StorageResult<UpsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.upsert(record).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
