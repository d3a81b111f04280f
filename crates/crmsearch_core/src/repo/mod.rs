//! Repository layer for CRM records.
//!
//! # Responsibility
//! - Define data access contracts for the records the search layer indexes.
//! - Isolate SQLite query details from the relational store and tests.
//!
//! # Invariants
//! - Loads hydrate every relation a search document reads.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use rusqlite::types::Value;
use thiserror::Error;

pub mod account_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and loading.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("invalid persisted {entity} data: {message}")]
    InvalidData {
        entity: &'static str,
        message: String,
    },
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RepoError> for DbError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => err,
            other => DbError::InvalidData(other.to_string()),
        }
    }
}

/// Keeps `IN (...)` lists well below SQLite's bound-parameter limit.
pub(crate) const LOAD_CHUNK_SIZE: usize = 500;

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn id_values(ids: &[i64]) -> Vec<Value> {
    ids.iter().map(|id| Value::Integer(*id)).collect()
}

pub(crate) fn int_to_bool(entity: &'static str, column: &str, value: i64) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData {
            entity,
            message: format!("invalid {column} value `{other}`"),
        }),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
