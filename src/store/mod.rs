//! Row-store adapter (spec §5, §6): a `rusqlite`-backed connection wrapper
//! bootstrapping the fixed two-table schema, plus the process-wide registry
//! keyed by `"{env}/{project}"` that hands out one connection per logical
//! graph. Grounded in the teacher's `clickhouse_client.rs` connection-pool
//! wrapper and `registry.rs` process-keyed handle map, re-targeted from an
//! external ClickHouse cluster to an embedded SQLite file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use rusqlite::Connection;

use crate::error::StoreError;
use crate::translator::SqlParam;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL DEFAULT '[]',
    properties TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS edges (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    source_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    properties TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(type);
";

/// A single logical graph's connection. Every query against it runs on the
/// thread that calls `execute()` — there is no pooling or async dispatch
/// (spec §5's single-threaded-per-query concurrency model).
pub struct SqliteStore {
    conn: Connection,
}

/// Thin seam over the concrete SQLite connection so the executor never binds
/// directly to `rusqlite` types, mirroring the teacher's `RowStore` trait
/// that abstracts over ClickHouse's native vs. HTTP clients.
pub trait RowStore {
    fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Vec<serde_json::Value>>, StoreError>;
    fn column_names(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<String>, StoreError>;
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize, StoreError>;
}

fn bind_params(params: &[SqlParam]) -> Vec<Box<dyn rusqlite::types::ToSql>> {
    params
        .iter()
        .map(|p| -> Box<dyn rusqlite::types::ToSql> {
            match p {
                SqlParam::Null => Box::new(Option::<i64>::None),
                SqlParam::Int(i) => Box::new(*i),
                SqlParam::Float(f) => Box::new(*f),
                SqlParam::Text(s) => Box::new(s.clone()),
            }
        })
        .collect()
}

fn sqlite_value_to_json(v: rusqlite::types::ValueRef) -> serde_json::Value {
    use rusqlite::types::ValueRef;
    match v {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(format!("{b:?}")),
    }
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| StoreError(e.to_string()))?;
        register_functions(&conn)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError(e.to_string()))?;
        info!("bootstrapped sqlite store");
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| StoreError(e.to_string()))?;
        register_functions(&conn)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(SqliteStore { conn })
    }
}

/// SQLite's core lacks `POWER`; the translator emits `power(base, exp)` for
/// `^`, so register it here rather than reaching for a math extension
/// (spec §4.3.5, grounded in the teacher's own `register_udf` pattern for
/// ClickHouse-side custom aggregate shims).
fn register_functions(conn: &Connection) -> Result<(), StoreError> {
    conn.create_scalar_function(
        "power",
        2,
        rusqlite::functions::FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let base: f64 = ctx.get(0)?;
            let exp: f64 = ctx.get(1)?;
            Ok(base.powf(exp))
        },
    )
    .map_err(|e| StoreError(e.to_string()))
}

impl RowStore for SqliteStore {
    fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Vec<serde_json::Value>>, StoreError> {
        debug!("executing query");
        let mut stmt = self.conn.prepare(sql).map_err(|e| StoreError(e.to_string()))?;
        let bound = bind_params(params);
        let bound_refs: Vec<&dyn rusqlite::types::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let col_count = stmt.column_count();
        let rows = stmt
            .query_map(bound_refs.as_slice(), |row| {
                let mut out = Vec::with_capacity(col_count);
                for i in 0..col_count {
                    out.push(sqlite_value_to_json(row.get_ref(i)?));
                }
                Ok(out)
            })
            .map_err(|e| StoreError(e.to_string()))?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| StoreError(e.to_string()))?);
        }
        Ok(results)
    }

    fn column_names(&self, sql: &str, _params: &[SqlParam]) -> Result<Vec<String>, StoreError> {
        let stmt = self.conn.prepare(sql).map_err(|e| StoreError(e.to_string()))?;
        Ok(stmt.column_names().into_iter().map(String::from).collect())
    }

    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize, StoreError> {
        debug!("executing mutation");
        let bound = bind_params(params);
        let bound_refs: Vec<&dyn rusqlite::types::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        self.conn
            .execute(sql, bound_refs.as_slice())
            .map_err(|e| StoreError(e.to_string()))
    }
}

/// Process-wide registry of open stores keyed by `"{env}/{project}"` (spec
/// §5). Each key maps to one `Mutex<SqliteStore>` so concurrent callers
/// serialize on the same logical graph instead of opening duplicate
/// connections to the same file.
#[derive(Default)]
pub struct StoreRegistry {
    handles: Mutex<HashMap<String, Arc<Mutex<SqliteStore>>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(
        &self,
        env: &str,
        project: &str,
        path: &str,
    ) -> Result<Arc<Mutex<SqliteStore>>, StoreError> {
        let key = format!("{env}/{project}");
        let mut handles = self.handles.lock().expect("registry mutex poisoned");
        if let Some(existing) = handles.get(&key) {
            return Ok(existing.clone());
        }
        debug!("opening new store handle for {key}");
        let store = SqliteStore::open(path)?;
        let handle = Arc::new(Mutex::new(store));
        handles.insert(key, handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstraps_schema_on_open() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cols = store.column_names("SELECT id, label, properties FROM nodes", &[]).unwrap();
        assert_eq!(cols, vec!["id", "label", "properties"]);
    }

    #[test]
    fn power_function_is_registered() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = store.query("SELECT power(2, 10)", &[]).unwrap();
        assert_eq!(rows[0][0], serde_json::json!(1024.0));
    }

    #[test]
    fn registry_reuses_handle_for_same_key() {
        let registry = StoreRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.sqlite3");
        let path_str = path.to_str().unwrap();
        let a = registry.handle("dev", "proj1", path_str).unwrap();
        let b = registry.handle("dev", "proj1", path_str).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
