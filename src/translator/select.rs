//! FROM/JOIN/WHERE/GROUP BY/ORDER BY assembly (spec §4.3.2, §4.3.3) — the
//! heart of the planner. Required patterns join as INNER, OPTIONAL MATCH
//! patterns as LEFT, and an unmatched optional side is kept alive in WHERE
//! via `(alias.id IS NULL OR condition)` rather than eliminating the row.
//! Grounded in the teacher's `render_plan/select_builder.rs` SELECT-item
//! extraction and `query_planner/analyzer/graph_join/join_generation.rs`'s
//! schema-driven join-ordering walk, re-targeted at the fixed two-table
//! `nodes`/`edges` schema.

use std::collections::{HashMap, HashSet};

use crate::ast::{Expr, ProjectionClause, Value};
use crate::error::CypherError;
use crate::planner::PlanningContext;
use crate::value::value_to_sql_param;

use super::expr::ExprRenderer;
use super::functions;
use super::vlp::build_vlp_cte;
use super::{SqlParam, Statement};

/// Builds a full SELECT statement from everything registered on `ctx` plus a
/// trailing projection. Consumes `ctx` mutably because join assembly rewires
/// variable-length edge bindings onto their generated CTE columns.
pub fn build_select(
    ctx: &mut PlanningContext,
    projection: &ProjectionClause,
    query_params: &HashMap<String, Value>,
) -> Result<Statement, CypherError> {
    let mut params = Vec::new();
    let (mut from_sql, join_conditions) = build_from_clause(ctx, query_params, &mut params)?;
    from_sql.push_str(&build_unwind_joins(ctx, query_params, &mut params)?);

    let mut where_parts = join_conditions;
    for cond in &ctx.where_required.clone() {
        let mut r = ExprRenderer::new(ctx, query_params);
        where_parts.push(r.render(cond)?);
        params.extend(r.params);
    }
    for (alias, cond) in &ctx.where_optional.clone() {
        let mut r = ExprRenderer::new(ctx, query_params);
        let rendered = r.render(cond)?;
        where_parts.push(format!("({alias}.id IS NULL OR {rendered})"));
        params.extend(r.params);
    }
    // WITH's own WHERE (ProjectionClause::where_ is only meaningful there)
    // filters the rows this segment hands to the next one.
    if let Some(cond) = &projection.where_ {
        let mut r = ExprRenderer::new(ctx, query_params);
        where_parts.push(r.render(cond)?);
        params.extend(r.params);
    }

    let select_list = build_select_list(ctx, projection, query_params, &mut params)?;
    let group_by = build_group_by(ctx, projection, query_params, &mut params)?;

    let mut sql = format!("SELECT {}", select_list.join(", "));
    if !from_sql.is_empty() {
        sql.push_str(&format!(" FROM {from_sql}"));
    }
    if !where_parts.is_empty() {
        sql.push_str(&format!(" WHERE {}", where_parts.join(" AND ")));
    }
    if !group_by.is_empty() {
        sql.push_str(&format!(" GROUP BY {}", group_by.join(", ")));
    }
    if projection.distinct {
        sql = sql.replacen("SELECT", "SELECT DISTINCT", 1);
    }
    if !projection.order_by.is_empty() {
        let mut parts = Vec::new();
        for (expr, asc) in &projection.order_by {
            let mut r = ExprRenderer::new(ctx, query_params);
            let rendered = r.render(expr)?;
            params.extend(r.params);
            parts.push(format!("{rendered} {}", if *asc { "ASC" } else { "DESC" }));
        }
        sql.push_str(&format!(" ORDER BY {}", parts.join(", ")));
    }
    if let Some(skip) = &projection.skip {
        let mut r = ExprRenderer::new(ctx, query_params);
        let rendered = r.render(skip)?;
        params.extend(r.params);
        sql.push_str(&format!(" LIMIT -1 OFFSET {rendered}"));
    }
    if let Some(limit) = &projection.limit {
        let mut r = ExprRenderer::new(ctx, query_params);
        let rendered = r.render(limit)?;
        params.extend(r.params);
        if sql.contains("OFFSET") {
            // Rebuild as `LIMIT n OFFSET m` (SQLite requires LIMIT to precede OFFSET).
            let offset_part = sql.split("LIMIT -1 OFFSET ").nth(1).unwrap().to_string();
            sql = sql.replace(&format!("LIMIT -1 OFFSET {offset_part}"), &format!("LIMIT {rendered} OFFSET {offset_part}"));
        } else {
            sql.push_str(&format!(" LIMIT {rendered}"));
        }
    }

    Ok(Statement { sql, params })
}

/// UNWIND compiles to a `json_each` join rather than an executor-side loop
/// (spec §4.3.1): `UNWIND list AS x` becomes `, json_each(list) AS __unwind_x`
/// with `x` rebound to `__unwind_x.value` for the rest of the statement.
fn build_unwind_joins(
    ctx: &mut PlanningContext,
    query_params: &HashMap<String, Value>,
    params: &mut Vec<SqlParam>,
) -> Result<String, CypherError> {
    let mut sql = String::new();
    let pending = ctx.unwind_stack.clone();
    let mut have_from = !ctx.nodes.is_empty();
    for (alias, expr) in pending {
        let rendered = {
            let mut r = ExprRenderer::new(ctx, query_params);
            let rendered = r.render(&expr)?;
            params.extend(r.params);
            rendered
        };
        let join_alias = format!("__unwind_{alias}");
        if have_from {
            sql.push_str(&format!(", json_each({rendered}) AS {join_alias}"));
        } else {
            sql.push_str(&format!("json_each({rendered}) AS {join_alias}"));
            have_from = true;
        }
        ctx.vars.insert(
            alias,
            crate::planner::VarBinding {
                kind: crate::planner::VarKind::Scalar,
                alias: format!("{join_alias}.value"),
                path_cte_name: None,
            },
        );
    }
    Ok(sql)
}

fn build_from_clause(
    ctx: &mut PlanningContext,
    query_params: &HashMap<String, Value>,
    params: &mut Vec<SqlParam>,
) -> Result<(String, Vec<String>), CypherError> {
    if ctx.nodes.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut joined: HashSet<String> = HashSet::new();
    let mut extra_where = Vec::new();
    let first_alias = ctx.nodes[0].alias.clone();
    let mut from_sql = format!("nodes {first_alias}");
    joined.insert(first_alias.clone());
    extra_where.extend(node_constraints(ctx, &first_alias, query_params, params)?);

    let mut remaining: Vec<usize> = (0..ctx.rels.len()).collect();
    let mut progress = true;
    while !remaining.is_empty() && progress {
        progress = false;
        let mut next_remaining = Vec::new();
        for idx in remaining {
            let (source_alias, target_alias, optional, hop_range, edge_alias, types, direction, rel_props) = {
                let r = &ctx.rels[idx];
                (
                    r.source_alias.clone(),
                    r.target_alias.clone(),
                    r.optional,
                    r.hop_range,
                    r.edge_alias.clone(),
                    r.types.clone(),
                    r.direction,
                    r.properties.clone(),
                )
            };
            let source_joined = joined.contains(&source_alias);
            let target_joined = joined.contains(&target_alias);
            if !source_joined && !target_joined {
                next_remaining.push(idx);
                continue;
            }
            let join_kw = if optional { "LEFT JOIN" } else { "JOIN" };

            if let Some(_hop) = hop_range {
                let cte_name = ctx.fresh_cte_name();
                let vlp = build_vlp_cte(&ctx.rels[idx], &cte_name);
                params.extend(vlp.params);
                let (anchor, other, other_is_target) = if source_joined {
                    (source_alias.clone(), target_alias.clone(), true)
                } else {
                    (target_alias.clone(), source_alias.clone(), false)
                };
                let (anchor_col, other_col) = if other_is_target {
                    ("start_id", "end_id")
                } else {
                    ("end_id", "start_id")
                };
                from_sql.push_str(&format!(
                    " {join_kw} ({}) AS {cte_name} ON {cte_name}.{anchor_col} = {anchor}.id",
                    vlp.sql
                ));
                from_sql.push_str(&format!(
                    " {join_kw} nodes {other} ON {other}.id = {cte_name}.{other_col}"
                ));
                ctx.rels[idx].vlp_cte_name = Some(cte_name.clone());
                if let Some(binding) = ctx.vars.get_mut(&edge_alias) {
                    binding.alias = format!("{cte_name}.edge_ids");
                }
                joined.insert(anchor);
                joined.insert(other.clone());
                extra_where.extend(node_constraints(ctx, &other, query_params, params)?);
            } else {
                let (anchor, other, anchor_is_source) = if source_joined {
                    (source_alias.clone(), target_alias.clone(), true)
                } else {
                    (target_alias.clone(), source_alias.clone(), false)
                };
                from_sql.push_str(&format!(" {join_kw} edges {edge_alias} ON "));
                from_sql.push_str(&edge_join_condition(&edge_alias, &anchor, anchor_is_source, direction));
                from_sql.push_str(&format!(" {join_kw} nodes {other} ON {other}.id = "));
                from_sql.push_str(&edge_other_endpoint(&edge_alias, &anchor, direction, anchor_is_source));

                if !types.is_empty() {
                    extra_where.push(type_condition(&edge_alias, &types, params));
                }
                if let Some(props) = &rel_props {
                    extra_where.extend(property_conditions(&edge_alias, props, ctx, query_params, params)?);
                }
                extra_where.extend(rel_constraints(ctx, &edge_alias, params));
                joined.insert(anchor);
                joined.insert(other.clone());
                extra_where.extend(node_constraints(ctx, &other, query_params, params)?);
            }
            progress = true;
        }
        remaining = next_remaining;
    }

    // Disjoint patterns (comma-separated MATCH with no shared variable)
    // cross-join the remaining unvisited nodes.
    for node in ctx.nodes.clone() {
        if !joined.contains(&node.alias) {
            from_sql.push_str(&format!(", nodes {}", node.alias));
            joined.insert(node.alias.clone());
            extra_where.extend(node_constraints(ctx, &node.alias, query_params, params)?);
        }
    }

    Ok((from_sql, extra_where))
}

fn edge_join_condition(edge_alias: &str, anchor: &str, anchor_is_source: bool, direction: crate::ast::Direction) -> String {
    use crate::ast::Direction::*;
    let col = match (direction, anchor_is_source) {
        (Right, true) | (Left, false) => "source_id",
        (Right, false) | (Left, true) => "target_id",
        (Either, _) => {
            return format!(
                "({edge_alias}.source_id = {anchor}.id OR {edge_alias}.target_id = {anchor}.id)"
            )
        }
    };
    format!("{edge_alias}.{col} = {anchor}.id")
}

fn edge_other_endpoint(edge_alias: &str, anchor: &str, direction: crate::ast::Direction, anchor_is_source: bool) -> String {
    use crate::ast::Direction::*;
    match (direction, anchor_is_source) {
        (Right, true) | (Left, false) => format!("{edge_alias}.target_id"),
        (Right, false) | (Left, true) => format!("{edge_alias}.source_id"),
        (Either, _) => format!(
            "(CASE WHEN {edge_alias}.source_id = {anchor}.id THEN {edge_alias}.target_id ELSE {edge_alias}.source_id END)"
        ),
    }
}

fn type_condition(edge_alias: &str, types: &[String], params: &mut Vec<SqlParam>) -> String {
    if types.len() == 1 {
        params.push(value_to_sql_param(&Value::Str(types[0].clone())));
        format!("{edge_alias}.type = ?")
    } else {
        let placeholders = types.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        for t in types {
            params.push(value_to_sql_param(&Value::Str(t.clone())));
        }
        format!("{edge_alias}.type IN ({placeholders})")
    }
}

fn node_constraints(
    ctx: &PlanningContext,
    alias: &str,
    query_params: &HashMap<String, Value>,
    params: &mut Vec<SqlParam>,
) -> Result<Vec<String>, CypherError> {
    let Some(node) = ctx.node(alias) else {
        return Ok(Vec::new());
    };
    let mut conds = Vec::new();
    if let Some(id) = &node.bound_id {
        params.push(value_to_sql_param(&Value::Str(id.clone())));
        conds.push(format!("{alias}.id = ?"));
    }
    for label in &node.labels {
        params.push(value_to_sql_param(&Value::Str(label.clone())));
        conds.push(format!(
            "EXISTS (SELECT 1 FROM json_each({alias}.label) WHERE json_each.value = ?)"
        ));
    }
    if let Some(props) = node.properties.clone() {
        conds.extend(property_conditions(alias, &props, ctx, query_params, params)?);
    }
    Ok(conds)
}

/// Anchors an already-bound edge carried across a WITH boundary to its exact
/// row, mirroring `node_constraints`'s `bound_id` handling.
fn rel_constraints(
    ctx: &PlanningContext,
    edge_alias: &str,
    params: &mut Vec<SqlParam>,
) -> Vec<String> {
    let Some(rel) = ctx.rels.iter().find(|r| r.edge_alias == edge_alias) else {
        return Vec::new();
    };
    match &rel.bound_id {
        Some(id) => {
            params.push(value_to_sql_param(&Value::Str(id.clone())));
            vec![format!("{edge_alias}.id = ?")]
        }
        None => Vec::new(),
    }
}

fn property_conditions(
    alias: &str,
    props: &[(String, Expr)],
    ctx: &PlanningContext,
    query_params: &HashMap<String, Value>,
    params: &mut Vec<SqlParam>,
) -> Result<Vec<String>, CypherError> {
    let mut conds = Vec::new();
    for (key, expr) in props {
        let mut r = ExprRenderer::new(ctx, query_params);
        let rendered = r.render(expr)?;
        params.extend(r.params);
        conds.push(format!("json_extract(coalesce({alias}.properties,'{{}}'), '$.{key}') = {rendered}"));
    }
    Ok(conds)
}

fn build_select_list(
    ctx: &PlanningContext,
    projection: &ProjectionClause,
    query_params: &HashMap<String, Value>,
    params: &mut Vec<SqlParam>,
) -> Result<Vec<String>, CypherError> {
    let mut out = Vec::new();
    if projection.star {
        for node in &ctx.nodes {
            out.push(render_named(ctx, query_params, &Expr::Variable(node.alias.clone()), &node.alias, params)?);
        }
        for rel in &ctx.rels {
            out.push(render_named(ctx, query_params, &Expr::Variable(rel.edge_alias.clone()), &rel.edge_alias, params)?);
        }
    }
    for (i, item) in projection.items.iter().enumerate() {
        let alias = item.alias.clone().unwrap_or_else(|| match &item.expr {
            Expr::Variable(v) => v.clone(),
            Expr::Property(_, p) => p.clone(),
            _ => format!("col{i}"),
        });
        out.push(render_named(ctx, query_params, &item.expr, &alias, params)?);
    }
    if out.is_empty() {
        out.push("1".to_string());
    }
    Ok(out)
}

fn render_named(
    ctx: &PlanningContext,
    query_params: &HashMap<String, Value>,
    expr: &Expr,
    alias: &str,
    params: &mut Vec<SqlParam>,
) -> Result<String, CypherError> {
    let mut r = ExprRenderer::new(ctx, query_params);
    let rendered = r.render(expr)?;
    params.extend(r.params);
    Ok(format!("{rendered} AS {alias}"))
}

fn build_group_by(
    ctx: &PlanningContext,
    projection: &ProjectionClause,
    query_params: &HashMap<String, Value>,
    params: &mut Vec<SqlParam>,
) -> Result<Vec<String>, CypherError> {
    let has_aggregate = projection.items.iter().any(|i| expr_contains_aggregate(&i.expr));
    if !has_aggregate || projection.star {
        return Ok(Vec::new());
    }
    let mut keys = Vec::new();
    for item in &projection.items {
        if !expr_contains_aggregate(&item.expr) {
            let mut r = ExprRenderer::new(ctx, query_params);
            let rendered = r.render(&item.expr)?;
            params.extend(r.params);
            keys.push(rendered);
        }
    }
    Ok(keys)
}

pub(crate) fn expr_contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::FunctionCall { name, args, .. } => {
            functions::is_aggregate(name) || args.iter().any(expr_contains_aggregate)
        }
        Expr::Binary(_, l, r) | Expr::Compare(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) | Expr::Xor(l, r) => {
            expr_contains_aggregate(l) || expr_contains_aggregate(r)
        }
        Expr::Neg(e) | Expr::Not(e) => expr_contains_aggregate(e),
        Expr::Property(e, _) => expr_contains_aggregate(e),
        Expr::Case { subject, whens, else_ } => {
            subject.as_ref().map(|s| expr_contains_aggregate(s)).unwrap_or(false)
                || whens.iter().any(|(c, r)| expr_contains_aggregate(c) || expr_contains_aggregate(r))
                || else_.as_ref().map(|e| expr_contains_aggregate(e)).unwrap_or(false)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ProjectionItem;
    use crate::parser::parse;
    use crate::ast::{Clause, CypherStatement};

    fn ctx_for(src: &str) -> (PlanningContext, ProjectionClause) {
        let ast = parse(src).unwrap();
        let CypherStatement::Query(q) = ast else { panic!() };
        let mut ctx = PlanningContext::new();
        let mut proj = ProjectionClause::default();
        for clause in &q.parts[0].clauses {
            match clause {
                Clause::Match { patterns, .. } => {
                    for p in patterns {
                        ctx.register_pattern(p, false).unwrap();
                    }
                }
                Clause::Return(p) => proj = p.clone(),
                _ => {}
            }
        }
        (ctx, proj)
    }

    #[test]
    fn builds_simple_select_with_join() {
        let (mut ctx, proj) = ctx_for("MATCH (a:User)-[:FOLLOWS]->(b:User) RETURN a, b");
        let stmt = build_select(&mut ctx, &proj, &HashMap::new()).unwrap();
        assert!(stmt.sql.contains("FROM nodes"));
        assert!(stmt.sql.contains("JOIN edges"));
    }

    #[test]
    fn group_by_added_when_aggregate_present() {
        let (mut ctx, _) = ctx_for("MATCH (a:User) RETURN a");
        let proj = ProjectionClause {
            items: vec![
                ProjectionItem { expr: Expr::Variable("a".into()), alias: None },
                ProjectionItem {
                    expr: Expr::FunctionCall { name: "count".into(), args: vec![Expr::Variable("a".into())], distinct: false },
                    alias: Some("c".into()),
                },
            ],
            ..Default::default()
        };
        let stmt = build_select(&mut ctx, &proj, &HashMap::new()).unwrap();
        assert!(stmt.sql.contains("GROUP BY"));
    }
}
