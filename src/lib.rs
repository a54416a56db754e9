//! graphcypher - embedded property-graph database with an OpenCypher
//! front-end translating to SQLite.
//!
//! This crate provides:
//! - A hand-written Cypher tokenizer and recursive-descent parser
//! - A planning context translating the resulting AST into parameterized SQL
//! - A SQLite-backed row store (fixed `nodes`/`edges` schema) with a
//!   process-wide handle registry
//! - An executor that runs the generated SQL and shapes rows back into
//!   Cypher values

pub mod ast;
pub mod config;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;
pub mod procedures;
pub mod store;
pub mod translator;
pub mod value;

use std::collections::HashMap;

pub use ast::Value;
pub use config::Config;
pub use error::{CypherError, ErrorEnvelope};
pub use executor::QueryResult;
pub use store::{RowStore, SqliteStore, StoreRegistry};

/// Runs a single Cypher statement against an already-open store, binding
/// `$name` parameters from `params`. This is the crate's one public query
/// entry point (spec §6) — everything else (registry lookup, store
/// bootstrap) is plumbing the caller wires up once per logical graph.
pub fn run(
    cypher: &str,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<QueryResult, CypherError> {
    executor::execute(cypher, params, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn creates_and_returns_a_node() {
        let store = SqliteStore::open_in_memory().unwrap();
        run(
            "CREATE (n:Person {name: 'Ada'})",
            &HashMap::new(),
            &store,
        )
        .unwrap();
        let result = run(
            "MATCH (n:Person) RETURN n.name AS name",
            &HashMap::new(),
            &store,
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::Str("Ada".to_string()));
    }

    #[test]
    fn parameter_binds_into_match_property() {
        let store = SqliteStore::open_in_memory().unwrap();
        run(
            "CREATE (n:Person {name: 'Ada'})",
            &HashMap::new(),
            &store,
        )
        .unwrap();
        let mut params = HashMap::new();
        params.insert("name".to_string(), Value::Str("Ada".to_string()));
        let result = run(
            "MATCH (n:Person {name: $name}) RETURN n.name AS name",
            &params,
            &store,
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn bad_syntax_surfaces_as_parse_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = run("MATCH (n RETURN n", &HashMap::new(), &store).unwrap_err();
        assert!(matches!(err, CypherError::Parse(_)));
    }
}
