//! Error types for the mining pipelines
//!
//! One enum covers every failure the library reports. Pipelines use
//! [`MineError::is_unit_local`] to decide whether a failure stays inside
//! one work unit or aborts the whole invocation.

use thiserror::Error;

/// Errors that can occur while mining a repository
#[derive(Error, Debug)]
pub enum MineError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Commit {commit} touches {count} files (limit {limit})")]
    TooManyFiles {
        commit: String,
        count: usize,
        limit: usize,
    },

    #[error("Metadata store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("SCM provider failure: {0}")]
    Provider(String),

    #[error("Checkout refused: {0}")]
    CheckoutConflict(String),

    #[error("Invalid commit range: {0}")]
    InvalidRange(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type MineResult<T> = Result<T, MineError>;

impl MineError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        MineError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True for failures scoped to a single commit or file.
    pub fn is_unit_local(&self) -> bool {
        matches!(
            self,
            MineError::NotFound { .. } | MineError::TooManyFiles { .. }
        )
    }
}

impl From<git2::Error> for MineError {
    fn from(err: git2::Error) -> Self {
        if err.code() == git2::ErrorCode::NotFound {
            MineError::NotFound {
                kind: "object",
                name: err.message().to_string(),
            }
        } else {
            MineError::Provider(err.message().to_string())
        }
    }
}

impl From<std::io::Error> for MineError {
    fn from(err: std::io::Error) -> Self {
        MineError::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for MineError {
    fn from(err: serde_json::Error) -> Self {
        MineError::StoreUnavailable(format!("record encoding: {}", err))
    }
}

macro_rules! store_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MineError {
                fn from(err: $ty) -> Self {
                    MineError::StoreUnavailable(err.to_string())
                }
            }
        )*
    };
}

store_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
