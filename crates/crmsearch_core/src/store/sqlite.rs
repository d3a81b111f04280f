//! SQLite implementation of [`RelationalStore`].
//!
//! # Responsibility
//! - Run translated queries against the CRM tables.
//! - Hydrate selected ids into full entities through the repositories.
//!
//! # Invariants
//! - Fetch results keep the order the SQL statement produced.
//! - A poisoned connection lock surfaces as a relational store error.

use super::sql::{render_count, render_select, SqlStatement};
use super::RelationalStore;
use crate::db::{open_db, open_db_in_memory, DbError, Schema};
use crate::error::{Backend, StoreError, StoreResult};
use crate::model::value::Entity;
use crate::query::RelationalQuery;
use crate::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use log::debug;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

type LoadFn = fn(&Connection, &[i64]) -> RepoResult<Vec<Entity>>;

/// How one entity type is stored and hydrated.
#[derive(Clone, Copy)]
pub struct EntityTable {
    pub entity: &'static str,
    pub table: &'static str,
    /// Columns that filters and ordering may reference.
    pub columns: &'static [&'static str],
    pub load: LoadFn,
}

const ACCOUNT_COLUMNS: &[&str] = &[
    "id",
    "tenant_id",
    "customer_id",
    "name",
    "flatname",
    "description",
    "legalentity",
    "taxnumber",
    "bankaccountnumber",
    "bic",
    "iban",
    "cocnumber",
    "status_id",
    "assigned_to_id",
    "is_deleted",
    "created",
    "modified",
];

const USER_COLUMNS: &[&str] = &[
    "id",
    "tenant_id",
    "first_name",
    "last_name",
    "position",
    "is_active",
    "email",
    "phone_number",
    "internal_number",
];

impl EntityTable {
    pub fn accounts() -> Self {
        Self {
            entity: "account",
            table: "accounts",
            columns: ACCOUNT_COLUMNS,
            load: load_accounts,
        }
    }

    pub fn users() -> Self {
        Self {
            entity: "user",
            table: "users",
            columns: USER_COLUMNS,
            load: load_users,
        }
    }
}

fn load_accounts(conn: &Connection, ids: &[i64]) -> RepoResult<Vec<Entity>> {
    Ok(SqliteAccountRepository::new(conn)
        .load_accounts(ids)?
        .into_iter()
        .map(|account| Arc::new(account) as Entity)
        .collect())
}

fn load_users(conn: &Connection, ids: &[i64]) -> RepoResult<Vec<Entity>> {
    Ok(SqliteUserRepository::new(conn)
        .load_users(ids)?
        .into_iter()
        .map(|user| Arc::new(user) as Entity)
        .collect())
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    tables: Vec<EntityTable>,
}

impl SqliteStore {
    /// Wraps a connection migrated with [`Schema::Relational`]; accounts and
    /// users are registered.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            tables: vec![EntityTable::accounts(), EntityTable::users()],
        }
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path, Schema::Relational)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory(Schema::Relational)?))
    }

    /// Runs `f` with the underlying connection, e.g. to seed records through
    /// the repositories.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> RepoResult<T>) -> StoreResult<T> {
        let conn = self.conn()?;
        f(&conn).map_err(|err| StoreError::Relational(err.into()))
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Relational(DbError::LockPoisoned))
    }

    fn table(&self, entity: &str) -> StoreResult<&EntityTable> {
        self.tables
            .iter()
            .find(|table| table.entity == entity)
            .ok_or_else(|| StoreError::UnsupportedField {
                backend: Backend::Relational,
                field: entity.to_string(),
                message: "no table registered for this entity".to_string(),
            })
    }
}

impl RelationalStore for SqliteStore {
    fn count(&self, query: &RelationalQuery) -> StoreResult<usize> {
        let table = self.table(&query.entity)?;
        let SqlStatement { sql, params } = render_count(table.table, table.columns, query)?;
        let count: i64 = self
            .conn()?
            .query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        debug!(
            "event=store_count module=store status=ok entity={} count={count}",
            query.entity
        );
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn fetch(&self, query: &RelationalQuery) -> StoreResult<Vec<Entity>> {
        let table = self.table(&query.entity)?;
        let SqlStatement { sql, params } = render_select(table.table, table.columns, query)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(params), |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut loaded = (table.load)(&conn, &ids)
            .map_err(|err| StoreError::Relational(err.into()))?
            .into_iter()
            .filter_map(|entity| entity_id(&entity).map(|id| (id, entity)))
            .collect::<HashMap<_, _>>();
        let entities = ids
            .iter()
            .filter_map(|id| loaded.remove(id))
            .collect::<Vec<_>>();
        debug!(
            "event=store_fetch module=store status=ok entity={} rows={}",
            query.entity,
            entities.len()
        );
        Ok(entities)
    }

    fn get_by_ids(&self, entity: &str, ids: &[i64]) -> StoreResult<Vec<Entity>> {
        let table = self.table(entity)?;
        let conn = self.conn()?;
        (table.load)(&conn, ids).map_err(|err| StoreError::Relational(err.into()))
    }
}

pub(crate) fn entity_id(entity: &Entity) -> Option<i64> {
    entity.attr("id").and_then(|value| value.as_int())
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::model::account::Account;
    use crate::query::{Lookup, Predicate, RelationalQuery, SortKey};
    use crate::repo::account_repo::{AccountRepository, SqliteAccountRepository};
    use crate::store::RelationalStore;
    use serde_json::json;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().expect("open store");
        store
            .with_connection(|conn| {
                let repo = SqliteAccountRepository::new(conn);
                for (id, name) in [(1, "Globex"), (2, "Acme"), (3, "Initech")] {
                    repo.create_account(&Account::new(id, 1, name, "2017-01-01T00:00:00"))?;
                }
                Ok(())
            })
            .expect("seed accounts");
        store
    }

    #[test]
    fn fetch_keeps_sql_order() {
        let store = seeded();
        let mut query = RelationalQuery::all("account");
        query.ordering = vec![SortKey::parse("name").expect("sort key")];
        let names = store
            .fetch(&query)
            .expect("fetch")
            .iter()
            .map(|entity| format!("{:?}", entity.attr("name")))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "Some(Text(\"Acme\"))",
                "Some(Text(\"Globex\"))",
                "Some(Text(\"Initech\"))"
            ]
        );
    }

    #[test]
    fn exclude_and_count_agree() {
        let store = seeded();
        let mut query = RelationalQuery::all("account");
        query.predicates = vec![Predicate::Not(vec![
            Lookup::parse("name__regex", json!("^A")).expect("lookup"),
        ])];
        assert_eq!(store.count(&query).expect("count"), 2);
        assert_eq!(store.fetch(&query).expect("fetch").len(), 2);
    }

    #[test]
    fn get_by_ids_skips_unknown_ids() {
        let store = seeded();
        let found = store.get_by_ids("account", &[3, 42, 1]).expect("load");
        assert_eq!(found.len(), 2);
    }
}
