//! Shared error categories for the query and document layers.
//!
//! # Responsibility
//! - Keep caller-facing failures in one enum so query code can use `?` across
//!   the document, query and store layers.
//! - Keep backend outages in their own category (`StoreError`) so callers can
//!   apply their own retry policy.
//!
//! # Invariants
//! - Build-time failures (`UnsupportedLookup`, `InvalidLookupValue`) are raised
//!   before any backend is contacted.
//! - Nothing in this crate retries a `StoreError`.

use crate::db::DbError;
use crate::engine::EngineError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Which backend produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Relational,
    SearchEngine,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::SearchEngine => "search_engine",
        }
    }
}

/// A backend could not serve a request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("relational store unavailable: {0}")]
    Relational(#[from] DbError),
    #[error("search engine unavailable: {0}")]
    SearchEngine(#[from] EngineError),
    #[error("{} store rejected field `{field}`: {message}", .backend.as_str())]
    UnsupportedField {
        backend: Backend,
        field: String,
        message: String,
    },
}

impl StoreError {
    pub fn backend(&self) -> Backend {
        match self {
            Self::Relational(_) => Backend::Relational,
            Self::SearchEngine(_) => Backend::SearchEngine,
            Self::UnsupportedField { backend, .. } => *backend,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Relational(DbError::Sqlite(value))
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// An attribute path names something that does not exist on the object.
    #[error("{entity} has no attribute `{attr}` (while resolving `{path}`)")]
    NameResolution {
        entity: String,
        attr: String,
        path: String,
    },
    #[error("unsupported lookup `{lookup}` on field `{field}`")]
    UnsupportedLookup { field: String, lookup: String },
    #[error("invalid value for `{field}__{lookup}`: {message}")]
    InvalidLookupValue {
        field: String,
        lookup: String,
        message: String,
    },
    #[error("operation not supported: {0}")]
    NotSupportedOperation(&'static str),
    #[error("field `{field}` cannot index {found} values")]
    InvalidFieldValue { field: String, found: &'static str },
    #[error("invalid document schema: {0}")]
    Schema(String),
    #[error("no document type registered for `{0}`")]
    UnknownEntity(String),
    /// A lifecycle scope names neither an entity group nor `group.entity`.
    #[error("No model or app named {0}")]
    UnknownScope(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DbError> for CoreError {
    fn from(value: DbError) -> Self {
        Self::Store(StoreError::Relational(value))
    }
}

impl From<EngineError> for CoreError {
    fn from(value: EngineError) -> Self {
        Self::Store(StoreError::SearchEngine(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{Backend, CoreError, StoreError};
    use crate::engine::EngineError;

    #[test]
    fn engine_failures_surface_as_store_errors() {
        let err: CoreError = EngineError::IndexNotFound("account".to_string()).into();
        match err {
            CoreError::Store(store) => assert_eq!(store.backend(), Backend::SearchEngine),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsupported_field_names_its_backend() {
        let err = StoreError::UnsupportedField {
            backend: Backend::Relational,
            field: "owner.name".to_string(),
            message: "relation traversal".to_string(),
        };
        assert!(err.to_string().starts_with("relational store rejected"));
    }
}
