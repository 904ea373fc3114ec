//! Error types shared by the CouchDB storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// The configured base URL cannot address documents.
    #[error("invalid CouchDB base URL `{url}`: {reason}")]
    InvalidBaseUrl {
        /// URL as configured.
        url: String,
        /// Why it was refused.
        reason: String,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a GET against the target database.
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        /// Database name.
        database: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a database creation request.
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        /// Database name.
        database: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Status returned.
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        /// Requested path.
        path: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus {
        /// Requested path.
        path: String,
        /// Status returned.
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Requested path.
        path: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// Concurrent writers kept winning the revision race.
    #[error("gave up upserting predictions of `{player}` after {attempts} conflicting attempt(s)")]
    UpsertConflict {
        /// Player whose row was written.
        player: String,
        /// Attempts made.
        attempts: u32,
    },
    /// The record cannot be stored as given.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// Why the record was refused.
        reason: String,
    },
}
