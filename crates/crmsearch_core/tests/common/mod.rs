#![allow(dead_code)]

use crmsearch_core::db::DbError;
use crmsearch_core::document::Document;
use crmsearch_core::engine::SearchResponse;
use crmsearch_core::lifecycle::{Clock, Confirm};
use crmsearch_core::model::account::Account;
use crmsearch_core::model::user::{Team, User};
use crmsearch_core::query::RelationalQuery;
use crmsearch_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use crmsearch_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use crmsearch_core::{
    default_registry, Backends, CacheMode, EngineResult, Entity, IndexLifecycleManager,
    RelationalStore, SearchEngine, SearchRequest, SqliteEngine, SqliteStore, StoreError,
    StoreResult,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const EPOCH: u64 = 1_700_000_000;

/// Relational store that counts calls and can be told to fail fetches.
pub struct SpyStore {
    pub inner: SqliteStore,
    pub counts: AtomicUsize,
    pub fetches: AtomicUsize,
    pub lookups: AtomicUsize,
    pub fail_fetch: AtomicBool,
}

impl SpyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            counts: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
            + self.fetches.load(Ordering::SeqCst)
            + self.lookups.load(Ordering::SeqCst)
    }
}

impl RelationalStore for SpyStore {
    fn count(&self, query: &RelationalQuery) -> StoreResult<usize> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.inner.count(query)
    }

    fn fetch(&self, query: &RelationalQuery) -> StoreResult<Vec<Entity>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Relational(DbError::InvalidData(
                "connection reset".to_string(),
            )));
        }
        self.inner.fetch(query)
    }

    fn get_by_ids(&self, entity: &str, ids: &[i64]) -> StoreResult<Vec<Entity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_ids(entity, ids)
    }
}

/// Search engine that records the cache mode of every search.
pub struct SpyEngine {
    pub inner: SqliteEngine,
    pub searches: Mutex<Vec<CacheMode>>,
}

impl SpyEngine {
    pub fn new(inner: SqliteEngine) -> Self {
        Self {
            inner,
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn searches(&self) -> Vec<CacheMode> {
        self.searches.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.searches.lock().unwrap().clear();
    }
}

impl SearchEngine for SpyEngine {
    fn create_index(&self, name: &str, body: &Value) -> EngineResult<()> {
        self.inner.create_index(name, body)
    }

    fn delete_index(&self, name: &str) -> EngineResult<bool> {
        self.inner.delete_index(name)
    }

    fn index_exists(&self, name: &str) -> EngineResult<bool> {
        self.inner.index_exists(name)
    }

    fn list_indices(&self, prefix: &str) -> EngineResult<Vec<String>> {
        self.inner.list_indices(prefix)
    }

    fn get_alias(&self, alias: &str) -> EngineResult<Option<String>> {
        self.inner.get_alias(alias)
    }

    fn put_alias(&self, alias: &str, index: &str) -> EngineResult<()> {
        self.inner.put_alias(alias, index)
    }

    fn index_document(&self, index: &str, document: &Document) -> EngineResult<()> {
        self.inner.index_document(index, document)
    }

    fn bulk_index(&self, index: &str, documents: &[Document]) -> EngineResult<usize> {
        self.inner.bulk_index(index, documents)
    }

    fn search(
        &self,
        target: &str,
        request: &SearchRequest,
        cache: CacheMode,
    ) -> EngineResult<SearchResponse> {
        self.searches.lock().unwrap().push(cache);
        self.inner.search(target, request, cache)
    }
}

pub struct FixedClock(pub AtomicU64);

impl FixedClock {
    pub fn at(seconds: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(seconds)))
    }

    pub fn set(&self, seconds: u64) {
        self.0.store(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Answers every prompt with `answer` and keeps the prompts.
pub struct Scripted {
    pub answer: bool,
    pub prompts: Vec<String>,
}

impl Scripted {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            prompts: Vec::new(),
        }
    }
}

impl Confirm for Scripted {
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool> {
        self.prompts.push(prompt.to_string());
        Ok(self.answer)
    }
}

pub struct Fixture {
    pub store: Arc<SpyStore>,
    pub engine: Arc<SpyEngine>,
    pub clock: Arc<FixedClock>,
}

impl Fixture {
    /// Three accounts (one assigned to a user on the sales team) and two users.
    pub fn seeded() -> Self {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .with_connection(|conn| {
                let users = SqliteUserRepository::new(conn);
                users.create_team(&Team {
                    id: 1,
                    name: "Sales".to_string(),
                })?;
                let mut ann = User::new(9, 1, "ann@example.com");
                ann.first_name = "Ann".to_string();
                ann.last_name = "Smith".to_string();
                ann.teams = vec![Team {
                    id: 1,
                    name: "Sales".to_string(),
                }];
                users.create_user(&ann)?;
                users.create_user(&User::new(10, 1, "bob@example.com"))?;

                let accounts = SqliteAccountRepository::new(conn);
                accounts.create_account(&Account::new(1, 1, "Globex", "2017-01-01T00:00:00"))?;
                let mut holding = Account::new(2, 1, "Acme Holding", "2017-02-01T00:00:00");
                holding.assigned_to = Some(ann);
                accounts.create_account(&holding)?;
                accounts.create_account(&Account::new(
                    3,
                    1,
                    "Acme Trading",
                    "2017-03-01T00:00:00",
                ))?;
                Ok(())
            })
            .unwrap();

        Self {
            store: Arc::new(SpyStore::new(store)),
            engine: Arc::new(SpyEngine::new(SqliteEngine::open_in_memory().unwrap())),
            clock: FixedClock::at(EPOCH),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends::new(self.store.clone(), self.engine.clone())
    }

    pub fn manager(&self) -> IndexLifecycleManager {
        IndexLifecycleManager::new(Arc::new(default_registry().unwrap()), self.backends())
            .with_clock(self.clock.clone())
    }

    /// Creates and populates every index, then clears the spies.
    pub fn indexed(self) -> Self {
        let manager = self.manager();
        let mut confirm = Scripted::answering(true);
        let mut out = Vec::new();
        manager
            .run(
                crmsearch_core::Action::Create,
                &[] as &[&str],
                true,
                &mut confirm,
                &mut out,
            )
            .unwrap();
        manager
            .run(
                crmsearch_core::Action::Populate,
                &[] as &[&str],
                true,
                &mut confirm,
                &mut out,
            )
            .unwrap();
        self.engine.reset();
        self.store.counts.store(0, Ordering::SeqCst);
        self.store.fetches.store(0, Ordering::SeqCst);
        self.store.lookups.store(0, Ordering::SeqCst);
        self
    }
}

pub fn ids(entities: &[Entity]) -> Vec<i64> {
    entities
        .iter()
        .filter_map(|entity| entity.attr("id").and_then(|value| value.as_int()))
        .collect()
}
