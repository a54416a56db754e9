//! MERGE lowering (spec §4.3.1, §4.4 shape "probe-then-branch"). MERGE never
//! gets its own SQL verb: it probes for the pattern with an ordinary MATCH
//! select, and the executor branches per row — CREATE + ON CREATE SET when
//! the probe is empty, ON MATCH SET when it isn't. This module only builds
//! the probe statement; `crate::executor` owns the branch.

use std::collections::HashMap;

use crate::ast::{PathPattern, ProjectionItem, ProjectionClause, Expr, Value};
use crate::error::CypherError;
use crate::planner::PlanningContext;

use super::select::build_select;
use super::Statement;

/// Registers `pattern` onto a scratch `PlanningContext` and builds a probe
/// SELECT returning one row per existing match, projecting every node/edge
/// variable the pattern introduces. An empty result set means MERGE must
/// create; a non-empty one means every returned row already exists.
pub fn build_merge_probe(
    pattern: &PathPattern,
    query_params: &HashMap<String, Value>,
) -> Result<(PlanningContext, Statement), CypherError> {
    let mut ctx = PlanningContext::new();
    ctx.register_pattern(pattern, false)?;

    let mut items = Vec::new();
    for node in ctx.nodes.clone() {
        items.push(ProjectionItem {
            expr: Expr::Variable(node.alias.clone()),
            alias: Some(node.alias),
        });
    }
    for rel in ctx.rels.clone() {
        items.push(ProjectionItem {
            expr: Expr::Variable(rel.edge_alias.clone()),
            alias: Some(rel.edge_alias),
        });
    }
    let projection = ProjectionClause {
        items,
        ..Default::default()
    };
    let stmt = build_select(&mut ctx, &projection, query_params)?;
    Ok((ctx, stmt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::{Clause, CypherStatement};

    #[test]
    fn probe_selects_every_pattern_variable() {
        let ast = parse("MERGE (a:User {id: 1})-[:OWNS]->(b:Account)").unwrap();
        let CypherStatement::Query(q) = ast else { panic!() };
        let Clause::Merge { pattern, .. } = &q.parts[0].clauses[0] else { panic!() };
        let (_, stmt) = build_merge_probe(pattern, &HashMap::new()).unwrap();
        assert!(stmt.sql.contains("AS a"));
        assert!(stmt.sql.contains("AS b"));
    }
}
