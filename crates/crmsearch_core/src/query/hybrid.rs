//! Queryset-shaped builder that routes each read to one backend.
//!
//! # Responsibility
//! - Accumulate full-text clauses, structural lookups, ordering and a window.
//! - Pick the relational store or the search engine per read.
//!
//! # Invariants
//! - Builder calls take `&self` and return a new value; a base query can be
//!   branched freely, across threads included.
//! - Lookups are parsed when they are added, so unsupported suffixes fail
//!   before any backend is contacted.
//! - Only full-text clauses route reads to the search engine.

use super::clause::{BoolClause, Clause};
use super::executor::{EngineExecutor, Executor, RelationalExecutor};
use super::lookup::Lookup;
use super::relational::{Predicate, RelationalQuery};
use super::request::{SearchRequest, SortKey, Window};
use crate::document::DocumentType;
use crate::engine::SearchEngine;
use crate::error::{Backend, CoreError, CoreResult};
use crate::model::value::Entity;
use crate::search::Registry;
use crate::store::RelationalStore;
use serde_json::Value;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

/// The two backends a hybrid query can read from.
#[derive(Clone)]
pub struct Backends {
    pub relational: Arc<dyn RelationalStore>,
    pub engine: Arc<dyn SearchEngine>,
}

impl Backends {
    pub fn new(relational: Arc<dyn RelationalStore>, engine: Arc<dyn SearchEngine>) -> Self {
        Self { relational, engine }
    }
}

#[derive(Clone)]
pub struct HybridQuery {
    document: Arc<DocumentType>,
    backends: Backends,
    full_text: Vec<Clause>,
    predicates: Vec<Predicate>,
    ordering: Vec<SortKey>,
    window: Option<Window>,
}

impl HybridQuery {
    pub fn new(document: Arc<DocumentType>, backends: Backends) -> Self {
        Self {
            document,
            backends,
            full_text: Vec::new(),
            predicates: Vec::new(),
            ordering: Vec::new(),
            window: None,
        }
    }

    /// Query over every record of `entity`.
    pub fn for_entity(registry: &Registry, entity: &str, backends: Backends) -> CoreResult<Self> {
        Ok(Self::new(registry.document(entity)?, backends))
    }

    pub fn document(&self) -> &DocumentType {
        &self.document
    }

    /// Adds a full-text match on one field.
    pub fn match_text(&self, field: &str, text: &str) -> CoreResult<Self> {
        self.with_full_text(Clause::matching(field, text))
    }

    /// Adds a full-text match across several fields.
    pub fn multi_match(&self, fields: &[&str], text: &str) -> CoreResult<Self> {
        self.with_full_text(Clause::multi_match(fields.iter().copied(), text))
    }

    /// Keeps records matching every lookup, e.g. `[("id__gte", json!(1337))]`.
    pub fn filter<I, K>(&self, lookups: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.ensure_unsliced("filter() on a sliced query")?;
        let mut next = self.clone();
        for lookup in parse_lookups(lookups)? {
            next.predicates.push(Predicate::Lookup(lookup));
        }
        Ok(next)
    }

    /// Drops records matching all of the lookups together.
    pub fn exclude<I, K>(&self, lookups: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.ensure_unsliced("exclude() on a sliced query")?;
        let lookups = parse_lookups(lookups)?;
        let mut next = self.clone();
        if !lookups.is_empty() {
            next.predicates.push(Predicate::Not(lookups));
        }
        Ok(next)
    }

    /// Replaces the ordering; `-field` sorts descending.
    pub fn order_by(&self, keys: &[&str]) -> CoreResult<Self> {
        self.ensure_unsliced("order_by() on a sliced query")?;
        let mut next = self.clone();
        next.ordering = keys
            .iter()
            .map(|key| SortKey::parse(key))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(next)
    }

    /// Narrows the window; `..` ranges map to `[start:stop]` slicing.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        let start = match range.start_bound() {
            Bound::Included(start) => *start,
            Bound::Excluded(start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Included(stop) => Some(stop.saturating_add(1)),
            Bound::Excluded(stop) => Some(*stop),
            Bound::Unbounded => None,
        };
        let mut next = self.clone();
        next.window = Some(Window::compose(self.window, start, stop));
        next
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    pub fn has_full_text(&self) -> bool {
        !self.full_text.is_empty()
    }

    /// Backend every read of this query goes to.
    pub fn backend(&self) -> Backend {
        if self.has_full_text() {
            Backend::SearchEngine
        } else {
            Backend::Relational
        }
    }

    /// Engine body for this query.
    pub fn search_request(&self) -> SearchRequest {
        SearchRequest {
            must: self.full_text.clone(),
            filter: self.predicates.iter().map(predicate_clause).collect(),
            sort: self.ordering.clone(),
            window: self.window.map(|window| window.bounded()),
        }
    }

    /// Relational description of this query; full-text clauses do not apply.
    pub fn relational_query(&self) -> RelationalQuery {
        RelationalQuery {
            entity: self.document.entity().to_string(),
            predicates: self.predicates.clone(),
            ordering: self.ordering.clone(),
            window: self.window,
        }
    }

    pub fn executor(&self) -> Executor<'_> {
        match self.backend() {
            Backend::SearchEngine => Executor::SearchEngine(EngineExecutor::new(
                self.backends.engine.as_ref(),
                self.backends.relational.as_ref(),
                self.document.index(),
                self.document.entity(),
                self.search_request(),
            )),
            Backend::Relational => Executor::Relational(RelationalExecutor::new(
                self.backends.relational.as_ref(),
                self.relational_query(),
            )),
        }
    }

    pub fn count(&self) -> CoreResult<usize> {
        self.executor().count()
    }

    pub fn fetch(&self) -> CoreResult<Vec<Entity>> {
        self.executor().fetch()
    }

    /// The `k`-th record of the current window.
    pub fn get(&self, k: usize) -> CoreResult<Option<Entity>> {
        Ok(self.slice(k..=k).fetch()?.into_iter().next())
    }

    pub fn first(&self) -> CoreResult<Option<Entity>> {
        self.executor().first()
    }

    /// Unsupported on both backends; always fails.
    pub fn last(&self) -> CoreResult<Option<Entity>> {
        Err(CoreError::NotSupportedOperation("last() on a hybrid query"))
    }

    pub fn exists(&self) -> CoreResult<bool> {
        Ok(self.first()?.is_some())
    }

    fn with_full_text(&self, clause: Clause) -> CoreResult<Self> {
        self.ensure_unsliced("full-text match on a sliced query")?;
        let mut next = self.clone();
        next.full_text.push(clause);
        Ok(next)
    }

    fn ensure_unsliced(&self, operation: &'static str) -> CoreResult<()> {
        if self.window.is_some() {
            return Err(CoreError::NotSupportedOperation(operation));
        }
        Ok(())
    }
}

fn parse_lookups<I, K>(lookups: I) -> CoreResult<Vec<Lookup>>
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    lookups
        .into_iter()
        .map(|(key, value)| Lookup::parse(key.as_ref(), value))
        .collect()
}

fn predicate_clause(predicate: &Predicate) -> Clause {
    match predicate {
        Predicate::Lookup(lookup) => lookup.to_clause(),
        Predicate::Not(lookups) => {
            let inner = match lookups.as_slice() {
                [single] => single.to_clause(),
                many => Clause::Bool(BoolClause {
                    must: many.iter().map(Lookup::to_clause).collect(),
                    ..BoolClause::default()
                }),
            };
            Clause::Bool(BoolClause {
                must_not: vec![inner],
                ..BoolClause::default()
            })
        }
    }
}
