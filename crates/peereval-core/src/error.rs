//! Core error types for peereval-core.
//!
//! The allocation engine distinguishes caller defects ([`ValidationError`]),
//! collaborator failures while loading ([`FetchError`]) and rejected
//! submissions ([`SinkError`]). Storage, configuration and grouping each get
//! their own enum, and [`CoreError`] wraps all of them for callers that do
//! not care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for peereval-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Engine invariant violated by the caller
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Roster or window could not be loaded
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Submission rejected by the sink
    #[error("Submission error: {0}")]
    Sink(#[from] SinkError),

    /// Group formation failed
    #[error("Grouping error: {0}")]
    Grouping(#[from] GroupingError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caller defects. These never surface to a user when the view disables
/// submission and only offers roster peers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Row index does not address an existing row
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// Peer is not part of the roster the form was initialized with
    #[error("Peer '{0}' is not in the roster")]
    UnknownPeer(String),

    /// Points must be finite and non-negative
    #[error("Invalid points value '{value}': {message}")]
    InvalidPoints { value: String, message: String },

    /// `submit()` called while the form cannot be submitted
    #[error("Allocation cannot be submitted: {0}")]
    NotSubmittable(String),

    /// The form already reached its terminal state
    #[error("Allocation was already submitted")]
    AlreadySubmitted,
}

/// Failure of the roster or window collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network-level failure
    #[error("Request for {resource} failed: {message}")]
    Transport { resource: String, message: String },

    /// Backend answered with a non-success status
    #[error("Backend returned HTTP {status} for {resource}: {body}")]
    Status {
        resource: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("Could not decode {resource}: {message}")]
    Decode { resource: String, message: String },

    /// Backend has no record for the resource
    #[error("No {0} record available")]
    Missing(String),

    /// Local store failure
    #[error("Local store failed while reading {resource}: {message}")]
    Storage { resource: String, message: String },
}

/// Failure of the submission sink. Form state is kept so the user can retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// Backend refused the payload
    #[error("Submission rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network-level failure
    #[error("Submission request failed: {0}")]
    Transport(String),

    /// Local store failure
    #[error("Local store rejected submission: {0}")]
    Storage(String),
}

/// Errors returned by a submission attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Group formation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroupingError {
    /// Group size must be at least one
    #[error("Group size must be at least 1")]
    InvalidGroupSize,

    /// Fewer present students than one group needs
    #[error("Not enough present students ({present}) to form groups of size {size}")]
    NotEnoughStudents { present: usize, size: usize },

    /// Remainder students cannot be spread one per group
    #[error("Cannot split {present} students into groups of {size} or {larger}", larger = .size + 1)]
    Infeasible { present: usize, size: usize },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored value could not be interpreted
    #[error("Corrupt {column} value: {value}")]
    Corrupt { column: String, value: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
