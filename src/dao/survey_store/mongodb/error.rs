use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be built from the options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the first ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A unique index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading the players collection failed.
    #[error("failed to list players")]
    ListPlayers {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Registering a player failed.
    #[error("failed to register player `{name}`")]
    AddPlayer {
        /// Player being registered.
        name: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading the predictions collection failed.
    #[error("failed to read predictions")]
    ReadPredictions {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a prediction failed.
    #[error("failed to upsert predictions of `{player}`")]
    UpsertPrediction {
        /// Player whose row was written.
        player: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The record cannot be stored as given.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// Why the record was refused.
        reason: String,
    },
}
