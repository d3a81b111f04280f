//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas and SQL functions required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations of the requested schema applied.
//! - Relational connections understand `value REGEXP pattern`.

use super::migrations::{apply_migrations, Schema};
use super::DbResult;
use log::{error, info};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, schema: Schema) -> DbResult<Connection> {
    open_with(schema, "file", || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory(schema: Schema) -> DbResult<Connection> {
    open_with(schema, "memory", Connection::open_in_memory)
}

fn open_with(
    schema: Schema,
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode={mode} schema={}",
        schema.as_str()
    );

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} schema={} duration_ms={} error_code=db_open_failed error={}",
                schema.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, schema) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} schema={} duration_ms={}",
                schema.as_str(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} schema={} duration_ms={} error_code=db_bootstrap_failed error={}",
                schema.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, schema: Schema) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    if schema == Schema::Relational {
        register_regexp(conn)?;
    }
    apply_migrations(conn, schema)?;
    Ok(())
}

// SQLite parses `x REGEXP y` as `regexp(y, x)`.
fn register_regexp(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: String = ctx.get(0)?;
            let value: Option<String> = ctx.get(1)?;
            let Some(value) = value else {
                return Ok(false);
            };
            let regex = Regex::new(&pattern)
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            Ok(regex.is_match(&value))
        },
    )?;
    Ok(())
}
