mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoSurveyStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::InvalidRecord { reason } => StorageError::InvalidRecord { reason },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
