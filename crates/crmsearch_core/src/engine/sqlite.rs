//! SQLite-backed search engine.
//!
//! # Responsibility
//! - Store physical indices, aliases and JSON documents in one SQLite file.
//! - Evaluate clause trees over stored documents and window the results.
//!
//! # Invariants
//! - Aliases and index names never collide.
//! - Deleting an index removes its documents and every alias pointing at it.
//! - Every write clears the request cache and advances its generation; a
//!   response computed before a write is never cached after it.
//! - The request cache holds at most [`CACHE_CAPACITY`] responses.

use super::eval::{sort_hits, Matcher};
use super::{CacheMode, EngineError, EngineResult, Hit, SearchEngine, SearchResponse};
use crate::db::{open_db, open_db_in_memory, DbError, Schema};
use crate::document::Document;
use crate::query::SearchRequest;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Page size used when a request carries no window.
const DEFAULT_PAGE_SIZE: usize = 10;

/// Most responses the request cache keeps between writes.
const CACHE_CAPACITY: usize = 256;

#[derive(Default)]
struct RequestCache {
    generation: u64,
    entries: HashMap<String, SearchResponse>,
}

impl RequestCache {
    fn get(&self, key: &str) -> Option<SearchResponse> {
        self.entries.get(key).cloned()
    }

    /// Keeps `response` only if no write happened since `generation` was read.
    fn store(&mut self, generation: u64, key: String, response: SearchResponse) -> bool {
        if generation != self.generation {
            return false;
        }
        if self.entries.len() >= CACHE_CAPACITY && !self.entries.contains_key(&key) {
            self.entries.clear();
        }
        self.entries.insert(key, response);
        true
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.entries.clear();
    }
}

pub struct SqliteEngine {
    conn: Mutex<Connection>,
    cache: Mutex<RequestCache>,
}

impl SqliteEngine {
    /// Wraps a connection already migrated with [`Schema::Engine`].
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            cache: Mutex::new(RequestCache::default()),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        Ok(Self::new(open_db(path, Schema::Engine)?))
    }

    pub fn open_in_memory() -> EngineResult<Self> {
        Ok(Self::new(open_db_in_memory(Schema::Engine)?))
    }

    fn conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Db(DbError::LockPoisoned))
    }

    fn cache(&self) -> EngineResult<MutexGuard<'_, RequestCache>> {
        self.cache
            .lock()
            .map_err(|_| EngineError::Db(DbError::LockPoisoned))
    }

    fn invalidate_cache(&self) -> EngineResult<()> {
        self.cache()?.invalidate();
        Ok(())
    }

    fn execute(&self, target: &str, request: &SearchRequest) -> EngineResult<SearchResponse> {
        let matcher = Matcher::compile(&request.query())?;
        let conn = self.conn()?;
        let index = resolve_target(&conn, target)?;

        let mut stmt =
            conn.prepare("SELECT doc_id, source FROM engine_documents WHERE index_name = ?1;")?;
        let mut rows = stmt.query([index.as_str()])?;
        let mut matches = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let raw: String = row.get(1)?;
            let source: Value = serde_json::from_str(&raw)?;
            if let Some(score) = matcher.score(&source) {
                matches.push((id, score, source));
            }
        }

        sort_hits(&mut matches, &request.sort);
        let total = matches.len();
        let (from, size) = request
            .window
            .map_or((0, DEFAULT_PAGE_SIZE), |window| {
                (window.from, window.result_size())
            });
        let hits = matches
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, score, source)| Hit { id, score, source })
            .collect();

        Ok(SearchResponse { total, hits })
    }
}

impl SearchEngine for SqliteEngine {
    fn create_index(&self, name: &str, body: &Value) -> EngineResult<()> {
        {
            let conn = self.conn()?;
            if alias_target(&conn, name)?.is_some() {
                return Err(EngineError::AliasConflict(name.to_string()));
            }
            if index_exists(&conn, name)? {
                return Err(EngineError::IndexAlreadyExists(name.to_string()));
            }
            conn.execute(
                "INSERT INTO engine_indices (name, body) VALUES (?1, ?2);",
                params![name, body.to_string()],
            )?;
        }
        self.invalidate_cache()?;
        info!("event=engine_index_create module=engine status=ok index={name}");
        Ok(())
    }

    fn delete_index(&self, name: &str) -> EngineResult<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM engine_indices WHERE name = ?1;", [name])?;
        self.invalidate_cache()?;
        info!(
            "event=engine_index_delete module=engine status=ok index={name} existed={}",
            changed > 0
        );
        Ok(changed > 0)
    }

    fn index_exists(&self, name: &str) -> EngineResult<bool> {
        let conn = self.conn()?;
        index_exists(&conn, name)
    }

    fn list_indices(&self, prefix: &str) -> EngineResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM engine_indices
             WHERE substr(name, 1, length(?1)) = ?1
             ORDER BY name ASC;",
        )?;
        let names = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn get_alias(&self, alias: &str) -> EngineResult<Option<String>> {
        let conn = self.conn()?;
        alias_target(&conn, alias)
    }

    fn put_alias(&self, alias: &str, index: &str) -> EngineResult<()> {
        {
            let conn = self.conn()?;
            if !index_exists(&conn, index)? {
                return Err(EngineError::IndexNotFound(index.to_string()));
            }
            if index_exists(&conn, alias)? {
                return Err(EngineError::AliasConflict(alias.to_string()));
            }
            conn.execute(
                "INSERT INTO engine_aliases (name, index_name) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET index_name = excluded.index_name;",
                params![alias, index],
            )?;
        }
        self.invalidate_cache()?;
        info!("event=engine_alias_put module=engine status=ok alias={alias} index={index}");
        Ok(())
    }

    fn index_document(&self, index: &str, document: &Document) -> EngineResult<()> {
        self.bulk_index(index, std::slice::from_ref(document))
            .map(|_| ())
    }

    fn bulk_index(&self, index: &str, documents: &[Document]) -> EngineResult<usize> {
        {
            let mut conn = self.conn()?;
            let physical = resolve_target(&conn, index)?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO engine_documents (index_name, doc_id, source) VALUES (?1, ?2, ?3)
                     ON CONFLICT(index_name, doc_id) DO UPDATE SET source = excluded.source;",
                )?;
                for document in documents {
                    let source = serde_json::to_string(&document.source)?;
                    stmt.execute(params![physical.as_str(), document.id.as_str(), source])?;
                }
            }
            tx.commit()?;
        }
        self.invalidate_cache()?;
        debug!(
            "event=engine_bulk_index module=engine status=ok index={index} documents={}",
            documents.len()
        );
        Ok(documents.len())
    }

    fn search(
        &self,
        target: &str,
        request: &SearchRequest,
        mode: CacheMode,
    ) -> EngineResult<SearchResponse> {
        let key = cache_key(target, request);
        let generation = {
            let cache = self.cache()?;
            if mode == CacheMode::Default {
                if let Some(cached) = cache.get(&key) {
                    debug!("event=engine_search module=engine status=ok target={target} cache=hit");
                    return Ok(cached);
                }
            }
            cache.generation
        };

        let response = self.execute(target, request)?;
        let outcome = match mode {
            CacheMode::Bypass => "bypass",
            CacheMode::Default => {
                if self.cache()?.store(generation, key, response.clone()) {
                    "miss"
                } else {
                    "stale"
                }
            }
        };
        debug!(
            "event=engine_search module=engine status=ok target={target} cache={outcome} total={}",
            response.total
        );
        Ok(response)
    }
}

fn cache_key(target: &str, request: &SearchRequest) -> String {
    format!("{target}\n{}", request.to_dict())
}

fn index_exists(conn: &Connection, name: &str) -> EngineResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM engine_indices WHERE name = ?1;",
            [name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn alias_target(conn: &Connection, alias: &str) -> EngineResult<Option<String>> {
    let target = conn
        .query_row(
            "SELECT index_name FROM engine_aliases WHERE name = ?1;",
            [alias],
            |row| row.get(0),
        )
        .optional()?;
    Ok(target)
}

fn resolve_target(conn: &Connection, target: &str) -> EngineResult<String> {
    if let Some(index) = alias_target(conn, target)? {
        return Ok(index);
    }
    if index_exists(conn, target)? {
        return Ok(target.to_string());
    }
    Err(EngineError::IndexNotFound(target.to_string()))
}
