use std::path::PathBuf;

use thiserror::Error;

use crate::types::Role;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Administration(#[from] AdministrationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while locating or reading a credential artifact.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("database config for {role} not found in {dir} e.g. {example}")]
    NotFound {
        role: Role,
        dir: PathBuf,
        example: String,
    },

    #[error("database config for {role} is ambiguous, {} candidates: {}", candidates.len(), candidates.join(", "))]
    Ambiguous { role: Role, candidates: Vec<String> },

    #[error("database config {filename} has {fields} fields, expected 5")]
    MalformedConfig { filename: String, fields: usize },

    #[error("{field} not found in {filename}")]
    MissingField {
        filename: String,
        field: &'static str,
    },

    #[error("environment variable {0} is not set")]
    Env(String),

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "database username {name} was detected {count} times, root, migration, write and read usernames must all be unique"
    )]
    DuplicateUsername { name: String, count: usize },

    #[error(
        "database password was detected {count} times, root, migration, write and read passwords must all be unique"
    )]
    DuplicatePassword { count: usize },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Failures reported by the administration gateway.
#[derive(Debug, Error)]
pub enum AdministrationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to start database runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("table {0} not found")]
    TableNotFound(String),

    #[error("no database selected")]
    NoDatabaseSelected,

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("host account {0} does not exist")]
    UnknownAccount(String),

    #[error("host account {0} has no primary group")]
    MissingPrimaryGroup(String),

    #[error("failed to set ownership of {path}: {source}")]
    Ownership {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("account lookup failed for {account}: {source}")]
    AccountLookup {
        account: String,
        #[source]
        source: nix::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
