//! Error types for the revenue-sharing ledger
//!
//! Every rejected operation maps to a stable [`ErrorKind`] and numeric
//! [`Error::code`] so callers can branch on the cause without parsing text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Project title empty or too long
    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    /// Content hash is not exactly 32 bytes
    #[error("Invalid content hash: expected 32 bytes, got {0}")]
    InvalidContentHash(usize),

    /// License type empty or too long
    #[error("Invalid license: {0}")]
    InvalidLicense(String),

    /// Share percentage outside [1, 100]
    #[error("Invalid share percentage: {0} (must be 1..=100)")]
    InvalidSharePercentage(u32),

    /// Revenue amount must be positive
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(u128),

    /// Collaborator role too long
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Project does not exist
    #[error("Project not found: {0}")]
    ProjectNotFound(u64),

    /// No share record for (project, collaborator)
    #[error("Collaborator {collaborator} not found on project {project_id}")]
    CollaboratorNotFound {
        /// Project ID
        project_id: u64,
        /// Collaborator identity
        collaborator: String,
    },

    /// Caller is not the required principal
    #[error("Unauthorized: {caller} is not the owner of project {project_id}")]
    Unauthorized {
        /// Project ID
        project_id: u64,
        /// Rejected caller
        caller: String,
    },

    /// Mutation requires an active project
    #[error("Project {0} is inactive")]
    ProjectInactive(u64),

    /// Project was already deactivated
    #[error("Project {0} is already inactive")]
    AlreadyInactive(u64),

    /// Share record for the pair already exists
    #[error("Collaborator {collaborator} already exists on project {project_id}")]
    CollaboratorAlreadyExists {
        /// Project ID
        project_id: u64,
        /// Collaborator identity
        collaborator: String,
    },

    /// Adding the share would push the project over 100%
    #[error("Share cap exceeded on project {project_id}: {allocated}% allocated, {requested}% requested")]
    ShareCapExceeded {
        /// Project ID
        project_id: u64,
        /// Percentage already allocated
        allocated: u32,
        /// Percentage requested
        requested: u32,
    },

    /// Collaborator record is already verified
    #[error("Collaborator {collaborator} already verified on project {project_id}")]
    AlreadyVerified {
        /// Project ID
        project_id: u64,
        /// Collaborator identity
        collaborator: String,
    },

    /// Withdrawal attempted with a zero pending balance
    #[error("No pending earnings for {collaborator} on project {project_id}")]
    NoPendingEarnings {
        /// Project ID
        project_id: u64,
        /// Collaborator identity
        collaborator: String,
    },

    /// Checked arithmetic overflowed an accumulator
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (sequencer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Stable error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorKind {
    /// Malformed or out-of-range argument
    InvalidInput = 1,
    /// Project or collaborator record absent
    NotFound = 2,
    /// Caller is not the required principal
    Unauthorized = 3,
    /// Operation conflicts with current state
    StateConflict = 4,
    /// Nothing to withdraw
    NoFunds = 5,
    /// Storage, serialization or runtime failure
    Internal = 6,
}

impl ErrorKind {
    /// Short label, used as a metrics label value
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::NoFunds => "no_funds",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Error {
    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidTitle(_)
            | Error::InvalidContentHash(_)
            | Error::InvalidLicense(_)
            | Error::InvalidSharePercentage(_)
            | Error::InvalidAmount(_)
            | Error::InvalidRole(_) => ErrorKind::InvalidInput,
            Error::ProjectNotFound(_) | Error::CollaboratorNotFound { .. } => ErrorKind::NotFound,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::ProjectInactive(_)
            | Error::AlreadyInactive(_)
            | Error::CollaboratorAlreadyExists { .. }
            | Error::ShareCapExceeded { .. }
            | Error::AlreadyVerified { .. } => ErrorKind::StateConflict,
            Error::NoPendingEarnings { .. } => ErrorKind::NoFunds,
            Error::Overflow(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Concurrency(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Metrics(_) => ErrorKind::Internal,
        }
    }

    /// Stable numeric code. Never renumber.
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidTitle(_) => 100,
            Error::InvalidContentHash(_) => 101,
            Error::InvalidLicense(_) => 102,
            Error::InvalidSharePercentage(_) => 103,
            Error::InvalidAmount(_) => 104,
            Error::InvalidRole(_) => 105,
            Error::ProjectNotFound(_) => 200,
            Error::CollaboratorNotFound { .. } => 201,
            Error::Unauthorized { .. } => 300,
            Error::ProjectInactive(_) => 400,
            Error::AlreadyInactive(_) => 401,
            Error::CollaboratorAlreadyExists { .. } => 402,
            Error::ShareCapExceeded { .. } => 403,
            Error::AlreadyVerified { .. } => 404,
            Error::NoPendingEarnings { .. } => 500,
            Error::Overflow(_) => 900,
            Error::Storage(_) => 901,
            Error::Serialization(_) => 902,
            Error::Concurrency(_) => 903,
            Error::Config(_) => 904,
            Error::Io(_) => 905,
            Error::Metrics(_) => 906,
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
