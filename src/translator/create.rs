//! CREATE lowering (spec §4.3.1 "mutations"). CREATE never joins — it emits
//! one `INSERT` per new node/edge, parameterized with ids the executor has
//! already resolved (freshly generated for new entities, carried over from a
//! preceding MATCH row for reused variables). The teacher has no write path
//! to ground this on directly; the collect-targets-then-emit-one-statement-
//! per-target shape follows `render_plan/plan_builder.rs`'s pattern of
//! gathering typed targets from the logical plan before rendering each one.
//!
//! Property expressions inside a CREATE pattern may only reference literals
//! and query parameters, not other pattern variables, since a CREATE
//! statement has no join context to resolve a sibling variable against.

use std::collections::HashMap;

use crate::ast::{Expr, NodePattern, PathPattern, PatternElement, Value};
use crate::error::CypherError;
use crate::planner::PlanningContext;
use crate::value::value_to_sql_param;

use super::expr::ExprRenderer;
use super::{SqlParam, Statement};

/// One row that needs materializing: a fresh node/edge, or a reference to a
/// variable already bound by a preceding MATCH.
#[derive(Debug, Clone)]
pub enum CreateTarget {
    NewNode {
        key: String,
        labels: Vec<String>,
        properties: Option<Vec<(String, Expr)>>,
    },
    NewEdge {
        key: String,
        edge_type: String,
        source_key: String,
        target_key: String,
        properties: Option<Vec<(String, Expr)>>,
    },
}

/// Walks CREATE patterns and lists every row that needs an id. Variables
/// already bound in `ctx` (from an earlier MATCH) are skipped — the executor
/// supplies their existing id instead of minting a new one.
pub fn collect_create_targets(patterns: &[PathPattern], ctx: &PlanningContext) -> Vec<CreateTarget> {
    let mut targets = Vec::new();
    let mut anon_counter = 0usize;
    let mut key_for = |var: &Option<String>, ctx: &PlanningContext, prefix: &str| -> (String, bool) {
        match var {
            Some(v) if ctx.is_bound(v) => (v.clone(), false),
            Some(v) => (v.clone(), true),
            None => {
                anon_counter += 1;
                (format!("__create_{prefix}{anon_counter}"), true)
            }
        }
    };

    for pattern in patterns {
        match &pattern.element {
            PatternElement::Node(n) => {
                let (key, is_new) = key_for(&n.variable, ctx, "n");
                if is_new {
                    targets.push(CreateTarget::NewNode {
                        key,
                        labels: n.labels.clone(),
                        properties: n.properties.clone(),
                    });
                }
            }
            PatternElement::Chain(links) => {
                let mut prev_key: Option<String> = None;
                for link in links {
                    let (source_key, source_new) = match &prev_key {
                        Some(k) => (k.clone(), false),
                        None => key_for(&link.source.variable, ctx, "n"),
                    };
                    if source_new && prev_key.is_none() {
                        push_node_target(&mut targets, &source_key, &link.source);
                    }
                    let (target_key, target_new) = key_for(&link.target.variable, ctx, "n");
                    if target_new {
                        push_node_target(&mut targets, &target_key, &link.target);
                    }
                    let (edge_key, _) = key_for(&link.edge.variable, ctx, "e");
                    targets.push(CreateTarget::NewEdge {
                        key: edge_key,
                        edge_type: link.edge.types.first().cloned().unwrap_or_default(),
                        source_key: source_key.clone(),
                        target_key: target_key.clone(),
                        properties: link.edge.properties.clone(),
                    });
                    prev_key = Some(target_key);
                }
            }
            PatternElement::ShortestPath(..) => {} // rejected at parse time
        }
    }
    targets
}

fn push_node_target(targets: &mut Vec<CreateTarget>, key: &str, pattern: &NodePattern) {
    targets.push(CreateTarget::NewNode {
        key: key.to_string(),
        labels: pattern.labels.clone(),
        properties: pattern.properties.clone(),
    });
}

/// Renders the actual INSERT statements. `entity_ids` must contain an id for
/// every key `collect_create_targets` produced (new ids minted by the
/// executor) plus every already-bound variable referenced as an endpoint.
pub fn build_create(
    targets: &[CreateTarget],
    entity_ids: &HashMap<String, String>,
    query_params: &HashMap<String, Value>,
) -> Result<Vec<Statement>, CypherError> {
    let empty_ctx = PlanningContext::new();
    let mut statements = Vec::new();
    for target in targets {
        match target {
            CreateTarget::NewNode {
                key,
                labels,
                properties,
            } => {
                let id = entity_ids.get(key).cloned().unwrap_or_default();
                let mut params = vec![SqlParam::Text(id)];
                let label_json = serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string());
                params.push(SqlParam::Text(label_json));
                let props_sql = render_property_map(properties, &empty_ctx, query_params, &mut params)?;
                statements.push(Statement::new(
                    format!("INSERT INTO nodes (id, label, properties) VALUES (?, ?, {props_sql})"),
                    params,
                ));
            }
            CreateTarget::NewEdge {
                key,
                edge_type,
                source_key,
                target_key,
                properties,
            } => {
                let id = entity_ids.get(key).cloned().unwrap_or_default();
                let source_id = entity_ids.get(source_key).cloned().unwrap_or_default();
                let target_id = entity_ids.get(target_key).cloned().unwrap_or_default();
                let mut params = vec![
                    SqlParam::Text(id),
                    SqlParam::Text(edge_type.clone()),
                    SqlParam::Text(source_id),
                    SqlParam::Text(target_id),
                ];
                let props_sql = render_property_map(properties, &empty_ctx, query_params, &mut params)?;
                statements.push(Statement::new(
                    format!(
                        "INSERT INTO edges (id, type, source_id, target_id, properties) VALUES (?, ?, ?, ?, {props_sql})"
                    ),
                    params,
                ));
            }
        }
    }
    Ok(statements)
}

fn render_property_map(
    properties: &Option<Vec<(String, Expr)>>,
    ctx: &PlanningContext,
    query_params: &HashMap<String, Value>,
    params: &mut Vec<SqlParam>,
) -> Result<String, CypherError> {
    let Some(props) = properties else {
        return Ok("'{}'".to_string());
    };
    let mut r = ExprRenderer::new(ctx, query_params);
    let entries: Result<Vec<String>, _> = props
        .iter()
        .map(|(k, v)| r.render(v).map(|rendered| format!("'{k}', {rendered}")))
        .collect();
    let entries = entries?;
    params.extend(r.params);
    Ok(format!("json_object({})", entries.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::{Clause, CypherStatement};

    #[test]
    fn collects_chain_targets_in_order() {
        let ast = parse("CREATE (a:User {name: 'Ann'})-[:FOLLOWS]->(b:User {name: 'Bob'})").unwrap();
        let CypherStatement::Query(q) = ast else { panic!() };
        let Clause::Create { patterns } = &q.parts[0].clauses[0] else { panic!() };
        let ctx = PlanningContext::new();
        let targets = collect_create_targets(patterns, &ctx);
        assert_eq!(targets.len(), 3);
        assert!(matches!(targets[0], CreateTarget::NewNode { .. }));
        assert!(matches!(targets[2], CreateTarget::NewEdge { .. }));
    }
}
