//! Errors raised by the MongoDB match store.

use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB store operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failure of a MongoDB call, tagged with the operation that issued it.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Rejected connection string.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the parsed client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings sent before giving up.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index required by the store could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Name of the index.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a match document failed.
    #[error("failed to load match `{id}`")]
    LoadMatch {
        /// Match that was being read.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Inserting a new match document failed.
    #[error("failed to insert match `{id}`")]
    InsertMatch {
        /// Match that was being inserted.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An atomic update on a match document failed.
    #[error("failed to {operation} on match `{id}`")]
    UpdateMatch {
        /// Match that was being updated.
        id: String,
        /// Short name of the update.
        operation: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Querying the match collection failed.
    #[error("failed to list matches")]
    ListMatches {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The filter of an update matched nothing.
    #[error("no document matched: {what}")]
    MissingDocument {
        /// Description of the missing target.
        what: String,
    },
}
