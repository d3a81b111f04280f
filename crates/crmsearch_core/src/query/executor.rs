//! The two read strategies a hybrid query dispatches to.
//!
//! # Invariants
//! - The relational strategy never touches the search engine.
//! - The search-engine strategy only reads the relational store through
//!   `get_by_ids`, to hydrate hits; counting never hydrates.
//! - `first` on the search engine always bypasses the request cache.

use super::relational::RelationalQuery;
use super::request::{SearchRequest, Window, MAX_RESULT_WINDOW};
use crate::engine::{CacheMode, EngineError, Hit, SearchEngine};
use crate::error::{Backend, CoreResult};
use crate::model::value::Entity;
use crate::store::RelationalStore;
use log::{debug, warn};
use std::collections::HashMap;

/// Executor chosen for one read, tagged by backend.
pub enum Executor<'q> {
    Relational(RelationalExecutor<'q>),
    SearchEngine(EngineExecutor<'q>),
}

impl Executor<'_> {
    pub fn backend(&self) -> Backend {
        match self {
            Self::Relational(_) => Backend::Relational,
            Self::SearchEngine(_) => Backend::SearchEngine,
        }
    }

    pub fn count(&self) -> CoreResult<usize> {
        self.log_route("count");
        match self {
            Self::Relational(executor) => executor.count(),
            Self::SearchEngine(executor) => executor.count(),
        }
    }

    pub fn fetch(&self) -> CoreResult<Vec<Entity>> {
        self.log_route("fetch");
        match self {
            Self::Relational(executor) => executor.fetch(),
            Self::SearchEngine(executor) => executor.fetch(),
        }
    }

    pub fn first(&self) -> CoreResult<Option<Entity>> {
        self.log_route("first");
        match self {
            Self::Relational(executor) => executor.first(),
            Self::SearchEngine(executor) => executor.first(),
        }
    }

    fn log_route(&self, operation: &str) {
        let entity = match self {
            Self::Relational(executor) => executor.query.entity.as_str(),
            Self::SearchEngine(executor) => executor.entity,
        };
        debug!(
            "event=query_route module=query backend={} entity={entity} operation={operation}",
            self.backend().as_str()
        );
    }
}

pub struct RelationalExecutor<'q> {
    store: &'q dyn RelationalStore,
    query: RelationalQuery,
}

impl<'q> RelationalExecutor<'q> {
    pub fn new(store: &'q dyn RelationalStore, query: RelationalQuery) -> Self {
        Self { store, query }
    }

    fn count(&self) -> CoreResult<usize> {
        Ok(self.store.count(&self.query)?)
    }

    fn fetch(&self) -> CoreResult<Vec<Entity>> {
        Ok(self.store.fetch(&self.query)?)
    }

    fn first(&self) -> CoreResult<Option<Entity>> {
        let query = self
            .query
            .clone()
            .with_window(Window::compose(self.query.window, 0, Some(1)));
        Ok(self.store.fetch(&query)?.into_iter().next())
    }
}

pub struct EngineExecutor<'q> {
    engine: &'q dyn SearchEngine,
    store: &'q dyn RelationalStore,
    /// Alias (logical index) the request runs against.
    target: &'q str,
    entity: &'q str,
    request: SearchRequest,
}

impl<'q> EngineExecutor<'q> {
    pub fn new(
        engine: &'q dyn SearchEngine,
        store: &'q dyn RelationalStore,
        target: &'q str,
        entity: &'q str,
        request: SearchRequest,
    ) -> Self {
        Self {
            engine,
            store,
            target,
            entity,
            request,
        }
    }

    fn count(&self) -> CoreResult<usize> {
        let probe = self.request.clone().with_window(Window::new(0, 0));
        let total = self
            .engine
            .search(self.target, &probe, CacheMode::Default)?
            .total;
        Ok(match self.request.window {
            Some(window) => total.saturating_sub(window.from).min(window.result_size()),
            None => total,
        })
    }

    fn fetch(&self) -> CoreResult<Vec<Entity>> {
        let window = self
            .request
            .window
            .unwrap_or_else(|| Window::new(0, MAX_RESULT_WINDOW));
        let request = self.request.clone().with_window(window);
        let response = self.engine.search(self.target, &request, CacheMode::Default)?;
        self.hydrate(&response.hits)
    }

    fn first(&self) -> CoreResult<Option<Entity>> {
        let window = Window::compose(self.request.window, 0, Some(1));
        let request = self.request.clone().with_window(window);
        let response = self.engine.search(self.target, &request, CacheMode::Bypass)?;
        Ok(self.hydrate(&response.hits)?.into_iter().next())
    }

    /// Loads hit entities by primary key, in hit order.
    fn hydrate(&self, hits: &[Hit]) -> CoreResult<Vec<Entity>> {
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = hit.id.parse::<i64>().map_err(|_| {
                EngineError::InvalidHit(format!("`{}` is not a primary key", hit.id))
            })?;
            ids.push(id);
        }

        let mut loaded = self
            .store
            .get_by_ids(self.entity, &ids)?
            .into_iter()
            .filter_map(|entity| {
                let id = entity.attr("id").and_then(|value| value.as_int())?;
                Some((id, entity))
            })
            .collect::<HashMap<_, _>>();

        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            match loaded.remove(&id) {
                Some(entity) => entities.push(entity),
                None => warn!(
                    "event=query_hydrate module=query status=stale entity={} id={id}",
                    self.entity
                ),
            }
        }
        Ok(entities)
    }
}
