use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::dao::{
    models::{PLAYER_KEY, PlayerEntity, PredictionRecord, PredictionTable, UpsertOutcome},
    storage::StorageResult,
    survey_store::SurveyStore,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchPlayerDocument, CouchPredictionDocument, END_SUFFIX, PLAYER_PREFIX,
        PREDICTION_PREFIX, prediction_doc_id,
    },
};

const ALL_DOCS: &str = "_all_docs";
const MAX_UPSERT_ATTEMPTS: u32 = 5;

/// Outcome of a PUT against a document endpoint.
enum PutOutcome {
    Written,
    /// The revision we sent is stale, or the document already exists.
    Conflict,
}

/// CouchDB backend keeping players and predictions as prefixed documents in one database.
///
/// Registration relies on create-only PUTs and prediction upserts on revision checks,
/// so concurrent writers are detected by the server instead of overwriting each other.
#[derive(Clone)]
pub struct CouchSurveyStore {
    client: Client,
    base_url: Arc<Url>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchSurveyStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|err| {
            CouchDaoError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: err.to_string(),
            }
        })?;
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url: Arc::new(base_url),
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    /// Build `<base>/<database>/<segments...>` with every segment percent-encoded.
    fn url(&self, segments: &[&str]) -> CouchResult<Url> {
        let mut url = self.base_url.as_ref().clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| CouchDaoError::InvalidBaseUrl {
                    url: self.base_url.to_string(),
                    reason: "URL cannot be a base".into(),
                })?;
            path.pop_if_empty().push(&self.database);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> CouchResult<reqwest::RequestBuilder> {
        let builder = self.client.request(method, self.url(segments)?);
        Ok(if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();

        let response = self
            .request(Method::GET, &[])?
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .request(Method::PUT, &[])?
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412: another instance created it first.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, &[doc_id])?
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<PutOutcome>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, &[doc_id])?
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => Ok(PutOutcome::Written),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", json_key(prefix)),
            ("endkey", json_key(&format!("{}{}", prefix, END_SUFFIX))),
        ];

        let response = self
            .request(Method::GET, &[ALL_DOCS])?
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {}
            other => {
                return Err(CouchDaoError::RequestStatus {
                    path: ALL_DOCS.to_string(),
                    status: other,
                });
            }
        }

        // Decoded straight into `T` so record cells keep their stored order.
        let payload = response.json::<AllDocsResponse<T>>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        Ok(payload.rows.into_iter().filter_map(|row| row.doc).collect())
    }

    async fn list_players(&self) -> CouchResult<Vec<PlayerEntity>> {
        let mut docs = self
            .list_documents::<CouchPlayerDocument>(PLAYER_PREFIX)
            .await?;
        // `_all_docs` is ordered by id; registration order is what callers expect.
        docs.sort_by_key(|doc| doc.created_at);
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn add_player(&self, name: String) -> CouchResult<bool> {
        let document = CouchPlayerDocument::new(name);
        match self.put_document(&document.id, &document).await? {
            PutOutcome::Written => Ok(true),
            PutOutcome::Conflict => Ok(false),
        }
    }

    async fn read_all(&self) -> CouchResult<PredictionTable> {
        let mut docs = self
            .list_documents::<CouchPredictionDocument>(PREDICTION_PREFIX)
            .await?;
        docs.sort_by_key(|doc| doc.created_at);
        Ok(PredictionTable::new(
            docs.into_iter().map(|doc| doc.fields).collect(),
        ))
    }

    async fn upsert(&self, record: PredictionRecord) -> CouchResult<UpsertOutcome> {
        let player = record
            .player()
            .ok_or_else(|| CouchDaoError::InvalidRecord {
                reason: format!("missing `{PLAYER_KEY}` field"),
            })?
            .to_owned();
        let doc_id = prediction_doc_id(&player);

        for attempt in 1..=MAX_UPSERT_ATTEMPTS {
            let existing = self
                .get_document::<CouchPredictionDocument>(&doc_id)
                .await?;
            let outcome = if existing.is_some() {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Inserted
            };
            let document = CouchPredictionDocument::merged(existing, &player, &record);

            match self.put_document(&doc_id, &document).await? {
                PutOutcome::Written => return Ok(outcome),
                PutOutcome::Conflict => {
                    debug!(player = %player, attempt, "revision conflict on prediction upsert; retrying");
                }
            }
        }

        Err(CouchDaoError::UpsertConflict {
            player,
            attempts: MAX_UPSERT_ATTEMPTS,
        })
    }

    async fn ping(&self) -> CouchResult<()> {
        let response = self
            .request(Method::GET, &[])?
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: self.database.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: self.database.to_string(),
                status: response.status(),
            })
        }
    }
}

/// `_all_docs` range keys are JSON strings.
fn json_key(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

impl SurveyStore for CouchSurveyStore {
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
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::survey_store::couchdb::models::player_doc_id;

    fn store(base_url: &str) -> CouchSurveyStore {
        CouchSurveyStore {
            client: Client::new(),
            base_url: Arc::new(Url::parse(base_url).unwrap()),
            database: Arc::from("predicciones"),
            auth: None,
        }
    }

    #[test]
    fn document_urls_percent_encode_player_names() {
        let store = store("http://localhost:5984");
        let url = store.url(&[player_doc_id("Ana María/2").as_str()]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5984/predicciones/player::Ana%20Mar%C3%ADa%2F2"
        );
    }

    #[test]
    fn database_url_keeps_base_path() {
        let store = store("http://couch.local/db-proxy");
        assert_eq!(
            store.url(&[]).unwrap().as_str(),
            "http://couch.local/db-proxy/predicciones"
        );
        assert_eq!(
            store.url(&[ALL_DOCS]).unwrap().as_str(),
            "http://couch.local/db-proxy/predicciones/_all_docs"
        );
    }

    #[test]
    fn range_keys_are_json_encoded() {
        assert_eq!(json_key("player::"), "\"player::\"");
        assert_eq!(json_key("a\"b"), "\"a\\\"b\"");
    }
}
