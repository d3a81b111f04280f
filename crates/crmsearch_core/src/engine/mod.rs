//! Search-engine contract.
//!
//! # Responsibility
//! - Describe the operations the query layer and lifecycle manager need from a
//!   search engine: index and alias management, document indexing and
//!   clause-tree search with an explicit cache mode.
//! - Provide a SQLite-backed engine usable in tests and single-host setups.
//!
//! # Invariants
//! - `put_alias` is one atomic pointer update; readers never see an alias that
//!   is unset or points at two indices.
//! - `search` resolves aliases before index names.
//! - `CacheMode::Bypass` never reads or fills the request cache.

mod eval;
mod sqlite;

use crate::db::DbError;
use crate::document::Document;
use crate::query::SearchRequest;
use serde_json::Value;
use thiserror::Error;

pub use sqlite::SqliteEngine;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),
    #[error("alias `{0}` collides with an index of the same name")]
    AliasConflict(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid hit: {0}")]
    InvalidHit(String),
    #[error("invalid stored document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Whether a search may be answered from the request cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Default,
    Bypass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub score: f64,
    pub source: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Matching documents before windowing.
    pub total: usize,
    pub hits: Vec<Hit>,
}

pub trait SearchEngine: Send + Sync {
    /// Creates a physical index with its mapping body.
    fn create_index(&self, name: &str, body: &Value) -> EngineResult<()>;
    /// Deletes a physical index and any alias pointing at it.
    ///
    /// Returns `false` when the index did not exist.
    fn delete_index(&self, name: &str) -> EngineResult<bool>;
    fn index_exists(&self, name: &str) -> EngineResult<bool>;
    /// Physical index names starting with `prefix`, sorted.
    fn list_indices(&self, prefix: &str) -> EngineResult<Vec<String>>;
    fn get_alias(&self, alias: &str) -> EngineResult<Option<String>>;
    /// Points `alias` at `index`, replacing any previous target.
    fn put_alias(&self, alias: &str, index: &str) -> EngineResult<()>;
    fn index_document(&self, index: &str, document: &Document) -> EngineResult<()>;
    /// Indexes all documents in one write; returns how many were written.
    fn bulk_index(&self, index: &str, documents: &[Document]) -> EngineResult<usize>;
    /// Runs `request` against an alias or index.
    fn search(
        &self,
        target: &str,
        request: &SearchRequest,
        cache: CacheMode,
    ) -> EngineResult<SearchResponse>;
}
