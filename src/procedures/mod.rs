//! Fixed introspection procedures (spec §6): `db.labels()` and
//! `db.relationshipTypes()`. No user-defined or dynamically registered
//! procedures — CALL only ever resolves one of these two names, grounded in
//! the teacher's `procedures/mod.rs` dispatch registry (there, a larger set
//! of `db.*`/`dbms.*`/`apoc.*` procedures backing the Bolt surface; here,
//! trimmed to the two this crate's fixed schema can answer without a
//! catalog).

use crate::error::{CypherError, SemanticError};
use crate::store::RowStore;
use crate::value::json_to_value;

pub const KNOWN_PROCEDURES: &[&str] = &["db.labels", "db.relationshipTypes"];

/// One row per yielded column, already converted to [`crate::ast::Value`].
pub fn call_procedure(
    name: &str,
    store: &dyn RowStore,
) -> Result<(Vec<String>, Vec<Vec<crate::ast::Value>>), CypherError> {
    match name {
        "db.labels" => {
            let rows = store.query(
                "SELECT DISTINCT value AS label FROM nodes, json_each(nodes.label) ORDER BY label",
                &[],
            )?;
            let out = rows
                .into_iter()
                .map(|r| r.into_iter().map(|j| json_to_value(&j)).collect())
                .collect();
            Ok((vec!["label".to_string()], out))
        }
        "db.relationshipTypes" => {
            let rows = store.query("SELECT DISTINCT type FROM edges ORDER BY type", &[])?;
            let out = rows
                .into_iter()
                .map(|r| r.into_iter().map(|j| json_to_value(&j)).collect())
                .collect();
            Ok((vec!["relationshipType".to_string()], out))
        }
        other => Err(CypherError::from(SemanticError::UnknownProcedure(other.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn unknown_procedure_is_semantic_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = call_procedure("db.bogus", &store).unwrap_err();
        assert!(matches!(err, CypherError::Semantic(SemanticError::UnknownProcedure(_))));
    }

    #[test]
    fn labels_returns_distinct_values() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute(
                "INSERT INTO nodes (id, label, properties) VALUES ('n1', '[\"User\"]', '{}')",
                &[],
            )
            .unwrap();
        let (cols, rows) = call_procedure("db.labels", &store).unwrap();
        assert_eq!(cols, vec!["label"]);
        assert_eq!(rows.len(), 1);
    }
}
