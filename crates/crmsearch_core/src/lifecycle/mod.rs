//! Index lifecycle: create, populate, delete and zero-downtime rebuild.
//!
//! # Responsibility
//! - Allocate physical generations (`<logical>.<epoch-seconds>`) for logical
//!   indices and manage the alias that names the serving one.
//! - Populate indices from the relational source in batches.
//! - Report progress as readable lines on the given writer.
//!
//! # Invariants
//! - Scope resolution happens before any backend call.
//! - `create` never moves an existing alias.
//! - `rebuild` populates every new generation before the first alias update;
//!   a failure before that point leaves all aliases and old generations
//!   untouched and abandons the new generations.
//! - After a successful `rebuild` each selected alias points at the new
//!   generation and no other generation of that logical index remains.

mod confirm;

pub use confirm::{Clock, Confirm, SystemClock, TerminalConfirm};

use crate::document::DocumentType;
use crate::engine::{EngineError, SearchEngine};
use crate::error::{CoreError, StoreError};
use crate::query::{Backends, Window};
use crate::search::{Registry, Selection};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 500;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A scope names neither an entity group nor `group.entity`.
    #[error("No model or app named {0}")]
    UnknownScope(String),
    #[error(transparent)]
    Core(CoreError),
    #[error("failed to talk to the operator: {0}")]
    Io(#[from] io::Error),
}

impl LifecycleError {
    /// Whether the failure is the caller's usage mistake rather than a
    /// runtime failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::UnknownScope(_))
    }
}

impl From<CoreError> for LifecycleError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::UnknownScope(scope) => Self::UnknownScope(scope),
            other => Self::Core(other),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        Self::Core(CoreError::Store(value))
    }
}

impl From<EngineError> for LifecycleError {
    fn from(value: EngineError) -> Self {
        Self::Core(value.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Populate,
    Delete,
    Rebuild,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Populate => "populate",
            Self::Delete => "delete",
            Self::Rebuild => "rebuild",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The operator declined the confirmation prompt.
    Aborted,
}

pub struct IndexLifecycleManager {
    registry: Arc<Registry>,
    backends: Backends,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl IndexLifecycleManager {
    pub fn new(registry: Arc<Registry>, backends: Backends) -> Self {
        Self {
            registry,
            backends,
            clock: Arc::new(SystemClock),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Rows loaded and indexed per round trip; zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Resolves `scopes` and runs `action` on the selection.
    pub fn run<S: AsRef<str>>(
        &self,
        action: Action,
        scopes: &[S],
        force: bool,
        confirm: &mut dyn Confirm,
        out: &mut dyn Write,
    ) -> LifecycleResult<Outcome> {
        let selection = self.registry.select(scopes)?;
        let started_at = Instant::now();
        info!(
            "event=lifecycle_run module=lifecycle status=start action={} indices={}",
            action.as_str(),
            selection.indices().join(",")
        );

        let result = match action {
            Action::Create => self.create(&selection, out).map(|_| Outcome::Completed),
            Action::Populate => self.populate(&selection, out).map(|_| Outcome::Completed),
            Action::Delete => self.delete(&selection, force, confirm, out),
            Action::Rebuild => self.rebuild(&selection, force, confirm, out),
        };

        match &result {
            Ok(outcome) => info!(
                "event=lifecycle_run module=lifecycle status=ok action={} outcome={:?} duration_ms={}",
                action.as_str(),
                outcome,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=lifecycle_run module=lifecycle status=error action={} duration_ms={} error={}",
                action.as_str(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Creates one new generation per selected logical index and points the
    /// alias at it only when the alias does not exist yet.
    ///
    /// Returns the created generation names.
    pub fn create(
        &self,
        selection: &Selection,
        out: &mut dyn Write,
    ) -> LifecycleResult<Vec<String>> {
        let engine = self.engine();
        let mut created = Vec::new();
        for logical in selection.indices() {
            let generation = self.create_generation(&logical, out)?;
            if engine.get_alias(&logical)?.is_none() {
                writeln!(out, "Pointing alias {logical} to '{generation}'")?;
                engine.put_alias(&logical, &generation)?;
            }
            created.push(generation);
        }
        Ok(created)
    }

    /// Indexes every source record of the selected document types through
    /// their aliases. Returns the number of documents written.
    pub fn populate(&self, selection: &Selection, out: &mut dyn Write) -> LifecycleResult<usize> {
        let mut written = 0;
        for document in selection.documents() {
            written += self.populate_into(document, document.index(), false, out)?;
        }
        Ok(written)
    }

    /// Deletes every generation of the selected logical indices.
    pub fn delete(
        &self,
        selection: &Selection,
        force: bool,
        confirm: &mut dyn Confirm,
        out: &mut dyn Write,
    ) -> LifecycleResult<Outcome> {
        if !self.confirmed(selection, force, confirm, out)? {
            return Ok(Outcome::Aborted);
        }

        let engine = self.engine();
        for logical in selection.indices() {
            for generation in generations(engine, &logical)? {
                writeln!(out, "Deleting index '{generation}'")?;
                engine.delete_index(&generation)?;
            }
        }
        Ok(Outcome::Completed)
    }

    /// Builds fresh generations, fills them, then cuts the aliases over and
    /// drops every older generation.
    pub fn rebuild(
        &self,
        selection: &Selection,
        force: bool,
        confirm: &mut dyn Confirm,
        out: &mut dyn Write,
    ) -> LifecycleResult<Outcome> {
        if !self.confirmed(selection, force, confirm, out)? {
            return Ok(Outcome::Aborted);
        }

        let mut fresh = BTreeMap::new();
        for logical in selection.indices() {
            let generation = self.create_generation(&logical, out)?;
            fresh.insert(logical, generation);
        }

        for document in selection.documents() {
            let Some(generation) = fresh.get(document.index()) else {
                continue;
            };
            if let Err(err) = self.populate_into(document, generation, true, out) {
                warn!(
                    "event=lifecycle_rebuild module=lifecycle status=abandoned index={generation} error={err}"
                );
                return Err(err);
            }
        }

        let engine = self.engine();
        for (logical, generation) in &fresh {
            writeln!(out, "Pointing alias {logical} to '{generation}'")?;
            engine.put_alias(logical, generation)?;
        }

        for (logical, generation) in &fresh {
            let old = generations(engine, logical)?
                .into_iter()
                .filter(|name| name != generation)
                .collect::<Vec<_>>();
            writeln!(out, "Deleting old indices: {}", old.join(", "))?;
            for name in &old {
                engine.delete_index(name)?;
            }
        }
        Ok(Outcome::Completed)
    }

    fn engine(&self) -> &dyn SearchEngine {
        self.backends.engine.as_ref()
    }

    fn confirmed(
        &self,
        selection: &Selection,
        force: bool,
        confirm: &mut dyn Confirm,
        out: &mut dyn Write,
    ) -> LifecycleResult<bool> {
        if force {
            return Ok(true);
        }
        let prompt = format!(
            "Are you sure you want to delete the '{}' indexes? [n/Y]: ",
            selection.indices().join(", ")
        );
        if confirm.confirm(&prompt)? {
            return Ok(true);
        }
        writeln!(out, "Aborted")?;
        Ok(false)
    }

    fn create_generation(&self, logical: &str, out: &mut dyn Write) -> LifecycleResult<String> {
        let engine = self.engine();
        let mut stamp = self.clock.now();
        let mut generation = format!("{logical}.{stamp}");
        while engine.index_exists(&generation)? {
            stamp += 1;
            generation = format!("{logical}.{stamp}");
        }

        writeln!(out, "Creating index '{generation}'")?;
        engine.create_index(&generation, &self.registry.index_body(logical)?)?;
        info!("event=index_create module=lifecycle status=ok index={generation}");
        Ok(generation)
    }

    fn populate_into(
        &self,
        document: &DocumentType,
        target: &str,
        name_target: bool,
        out: &mut dyn Write,
    ) -> LifecycleResult<usize> {
        let store = self.backends.relational.as_ref();
        let engine = self.engine();
        let source = document.source_query();
        let total = store.count(&source)?;
        if name_target {
            writeln!(out, "Indexing {total} '{}' objects to {target}", document.name())?;
        } else {
            writeln!(out, "Indexing {total} '{}' objects", document.name())?;
        }

        let mut offset = 0;
        let mut written = 0;
        loop {
            let page = source
                .clone()
                .with_window(Window::new(offset, self.batch_size));
            let batch = store.fetch(&page)?;
            if batch.is_empty() {
                break;
            }
            let documents = batch
                .iter()
                .map(|entity| document.prepare(entity.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            written += engine.bulk_index(target, &documents)?;
            offset += batch.len();
            if batch.len() < self.batch_size {
                break;
            }
        }

        info!(
            "event=index_populate module=lifecycle status=ok entity={} index={target} documents={written}",
            document.entity()
        );
        Ok(written)
    }
}

/// Physical generations of `logical`: `<logical>.<digits>`, sorted by name.
pub fn generations(engine: &dyn SearchEngine, logical: &str) -> LifecycleResult<Vec<String>> {
    let prefix = format!("{logical}.");
    Ok(engine
        .list_indices(&prefix)?
        .into_iter()
        .filter(|name| {
            name.strip_prefix(prefix.as_str()).is_some_and(|suffix| {
                !suffix.is_empty() && suffix.bytes().all(|byte| byte.is_ascii_digit())
            })
        })
        .collect())
}
