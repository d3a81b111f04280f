//! Relational store contract.
//!
//! # Responsibility
//! - Count and fetch entities described by a [`RelationalQuery`].
//! - Retrieve entities by primary key for search-hit hydration.
//!
//! # Invariants
//! - Unwindowed fetches return every match in the requested order, with
//!   primary key as the final tie-breaker.
//! - `get_by_ids` silently skips unknown ids.

mod sql;
mod sqlite;

use crate::error::StoreResult;
use crate::model::value::Entity;
use crate::query::RelationalQuery;

pub use sql::{render_count, render_select, SqlStatement};
pub use sqlite::{EntityTable, SqliteStore};

pub trait RelationalStore: Send + Sync {
    /// Number of rows `query` selects, window included.
    fn count(&self, query: &RelationalQuery) -> StoreResult<usize>;
    fn fetch(&self, query: &RelationalQuery) -> StoreResult<Vec<Entity>>;
    fn get_by_ids(&self, entity: &str, ids: &[i64]) -> StoreResult<Vec<Entity>>;
}
