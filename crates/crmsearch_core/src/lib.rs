//! Core search layer for the CRM: document mapping, hybrid query routing and
//! index lifecycle management.
//! This crate is the single source of truth for search invariants.

pub mod config;
pub mod db;
pub mod document;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod search;
pub mod store;

pub use config::{AppConfig, ConfigError, ConnectionConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult, Schema};
pub use document::field::{Field, FieldKind, ScalarKind};
pub use document::{Document, DocumentType};
pub use engine::{CacheMode, EngineError, EngineResult, SearchEngine, SqliteEngine};
pub use error::{Backend, CoreError, CoreResult, StoreError, StoreResult};
pub use lifecycle::{
    Action, IndexLifecycleManager, LifecycleError, LifecycleResult, Outcome, TerminalConfirm,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::value::{Attributes, AttrValue, Entity};
pub use query::{Backends, Clause, HybridQuery, SearchRequest};
pub use repo::{RepoError, RepoResult};
pub use search::{default_registry, Registry, Selection};
pub use store::{RelationalStore, SqliteStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
