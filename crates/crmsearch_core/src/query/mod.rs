//! Hybrid query translation and routing.
//!
//! # Responsibility
//! - Parse ORM-style lookups and translate them into search-engine clauses.
//! - Build immutable hybrid queries and execute them on the right backend.
//!
//! # Invariants
//! - A query with a full-text clause reads only from the search engine
//!   (hydrating hits by primary key); any other query reads only from the
//!   relational store.
//! - Translation failures surface before any backend call.

pub mod clause;
pub mod executor;
pub mod hybrid;
pub mod lookup;
pub mod relational;
pub mod request;

pub use clause::{BoolClause, Clause, RangeBound};
pub use executor::Executor;
pub use hybrid::{Backends, HybridQuery};
pub use lookup::{Lookup, LookupOp, UNSUPPORTED_LOOKUPS};
pub use relational::{Predicate, RelationalQuery};
pub use request::{SearchRequest, SortKey, Window, MAX_RESULT_WINDOW};
