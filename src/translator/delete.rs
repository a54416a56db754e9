//! DELETE/DETACH DELETE lowering (spec §4.3.1). By the time this runs the
//! executor has already resolved each delete-target expression against the
//! current row to a concrete id (a bare variable resolves directly; an
//! indexing expression like `collected[0]` is evaluated against the
//! in-memory row value first) — this module only emits the final SQL.
//!
//! Schema-level `ON DELETE CASCADE` means a plain (non-DETACH) node delete
//! would otherwise silently remove its edges too; Cypher requires that to be
//! an error instead, so the executor checks for attached edges before
//! calling here when `detach` is false (spec §7 invariants).

use super::{SqlParam, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTable {
    Node,
    Edge,
}

pub struct DeleteTarget {
    pub id: String,
    pub table: DeleteTable,
}

pub fn build_delete(targets: &[DeleteTarget], detach: bool) -> Vec<Statement> {
    let mut statements = Vec::new();
    for target in targets {
        match target.table {
            DeleteTable::Edge => {
                statements.push(Statement::new(
                    "DELETE FROM edges WHERE id = ?".to_string(),
                    vec![SqlParam::Text(target.id.clone())],
                ));
            }
            DeleteTable::Node => {
                if detach {
                    statements.push(Statement::new(
                        "DELETE FROM edges WHERE source_id = ? OR target_id = ?".to_string(),
                        vec![SqlParam::Text(target.id.clone()), SqlParam::Text(target.id.clone())],
                    ));
                }
                statements.push(Statement::new(
                    "DELETE FROM nodes WHERE id = ?".to_string(),
                    vec![SqlParam::Text(target.id.clone())],
                ));
            }
        }
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detach_delete_removes_edges_first() {
        let targets = vec![DeleteTarget { id: "n1".into(), table: DeleteTable::Node }];
        let stmts = build_delete(&targets, true);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].sql.contains("FROM edges"));
        assert!(stmts[1].sql.contains("FROM nodes"));
    }

    #[test]
    fn plain_node_delete_is_single_statement() {
        let targets = vec![DeleteTarget { id: "n1".into(), table: DeleteTable::Node }];
        let stmts = build_delete(&targets, false);
        assert_eq!(stmts.len(), 1);
    }
}
