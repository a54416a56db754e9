//! Top-level query orchestration (spec §4.4): parses, then walks the clause
//! list running the multi-phase shapes a pure SQL-lowering translator can't
//! express alone — probe-then-mutate for CREATE/SET/DELETE/MERGE, and a
//! nested per-row re-execution for WITH pipeline boundaries. Grounded in the
//! teacher's `server/handlers.rs::query_handler` top-level pipeline, which
//! drives the same generate-SQL/run-it/shape-rows loop against ClickHouse.

pub mod row_shaping;
mod memory_eval;

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use uuid::Uuid;

use crate::ast::{Clause, CypherStatement, Expr, PathPattern, ProjectionClause, Query, SingleQuery, Value};
use crate::error::{CypherError, InvariantError, SemanticError};
use crate::parser::parse;
use crate::planner::{PlanningContext, VarKind};
use crate::procedures;
use crate::store::RowStore;
use crate::translator::delete::{build_delete, DeleteTable, DeleteTarget};
use crate::translator::select::build_select;
use crate::translator::{create, merge, set};
use crate::value::json_to_value;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// One materialized output row, keyed by projection alias — the currency
/// passed between pipeline segments split at a WITH boundary.
type Row = HashMap<String, Value>;

pub fn execute(
    cypher: &str,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<QueryResult, CypherError> {
    debug!("tokenizing and parsing statement");
    let stmt = parse(cypher)?;
    match stmt {
        CypherStatement::Query(q) => execute_query(&q, params, store),
        CypherStatement::ProcedureCall(call) => {
            let (cols, rows) = procedures::call_procedure(&call.procedure_name, store)?;
            Ok(QueryResult {
                columns: cols,
                rows,
            })
        }
    }
}

fn execute_query(
    q: &Query,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<QueryResult, CypherError> {
    let mut combined: Option<QueryResult> = None;
    for (i, part) in q.parts.iter().enumerate() {
        let result = execute_single_query(part, params, store)?;
        combined = Some(match combined {
            None => result,
            Some(mut acc) => {
                let union_all = q.union_all.get(i - 1).copied().unwrap_or(true);
                acc.rows.extend(result.rows);
                if !union_all {
                    dedupe_rows(&mut acc.rows);
                }
                acc
            }
        });
    }
    Ok(combined.unwrap_or(QueryResult {
        columns: Vec::new(),
        rows: Vec::new(),
    }))
}

fn dedupe_rows(rows: &mut Vec<Vec<Value>>) {
    let mut seen = HashSet::new();
    rows.retain(|row| {
        let key = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\u{1}");
        seen.insert(key)
    });
}

/// A SingleQuery's clause list split at each WITH boundary. `boundary` is the
/// WITH projection that feeds the next segment; the last segment's
/// `boundary` is `None` and it must end in RETURN (or be mutation-only).
struct Segment {
    clauses: Vec<Clause>,
    boundary: Option<ProjectionClause>,
}

fn split_segments(clauses: &[Clause]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for clause in clauses {
        if let Clause::With(proj) = clause {
            segments.push(Segment {
                clauses: std::mem::take(&mut current),
                boundary: Some(proj.clone()),
            });
        } else {
            current.push(clause.clone());
        }
    }
    segments.push(Segment {
        clauses: current,
        boundary: None,
    });
    segments
}

fn execute_single_query(
    sq: &SingleQuery,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<QueryResult, CypherError> {
    let segments = split_segments(&sq.clauses);
    let mut carried_rows: Vec<Row> = vec![Row::new()];

    for (seg_idx, segment) in segments.iter().enumerate() {
        let is_last = seg_idx == segments.len() - 1;
        let next_rows = if is_carried_only(segment) {
            // No MATCH/UNWIND/CALL/mutation of its own: this segment is pure
            // computation over the rows the previous WITH boundary produced.
            // Evaluating it once over the full carried set (rather than once
            // per row, as the store-touching path below does) is what makes
            // an aggregate like `collect(x)` combine across rows instead of
            // restarting for each one.
            let projection = segment_projection(segment);
            memory_eval::project(&projection, &carried_rows, params)?
        } else {
            let mut next_rows = Vec::new();
            for carried in &carried_rows {
                let mut merged_params = params.clone();
                for (k, v) in carried {
                    merged_params.insert(k.clone(), v.clone());
                }
                let rows = run_segment(segment, carried, &merged_params, store)?;
                next_rows.extend(rows);
            }
            next_rows
        };
        carried_rows = next_rows;
        if !is_last && carried_rows.is_empty() {
            // Nothing survived this WITH boundary; no further segment can
            // produce rows either.
            break;
        }
    }

    let terminal_projection = find_terminal_projection(&sq.clauses);
    let Some(projection) = terminal_projection else {
        return Ok(QueryResult {
            columns: Vec::new(),
            rows: Vec::new(),
        });
    };
    project_final(&projection, &carried_rows)
}

fn find_terminal_projection(clauses: &[Clause]) -> Option<ProjectionClause> {
    match clauses.last() {
        Some(Clause::Return(p)) => Some(p.clone()),
        _ => None,
    }
}

fn project_final(projection: &ProjectionClause, rows: &[Row]) -> Result<QueryResult, CypherError> {
    let mut columns = Vec::new();
    if projection.star {
        let mut seen = HashSet::new();
        for row in rows {
            for k in row.keys() {
                if seen.insert(k.clone()) {
                    columns.push(k.clone());
                }
            }
        }
    }
    for item in &projection.items {
        let alias = item.alias.clone().unwrap_or_else(|| match &item.expr {
            Expr::Variable(v) => v.clone(),
            _ => format!("col{}", columns.len()),
        });
        columns.push(alias);
    }
    let mut out_rows = Vec::new();
    for row in rows {
        let mut out = Vec::new();
        for col in &columns {
            out.push(row.get(col).cloned().unwrap_or(Value::Null));
        }
        out_rows.push(out);
    }
    if let Some(limit) = &projection.limit {
        if let Expr::Literal(Value::Int(n)) = limit {
            out_rows.truncate((*n).max(0) as usize);
        }
    }
    Ok(QueryResult {
        columns,
        rows: out_rows,
    })
}

/// A segment with nothing of its own but a trailing RETURN/WITH projection —
/// no MATCH/OPTIONAL MATCH/UNWIND/CALL/mutation — never touches the store,
/// so it can (and must, for correct cross-row aggregation) be evaluated once
/// over the whole carried set instead of once per row.
fn is_carried_only(segment: &Segment) -> bool {
    segment.clauses.iter().all(|c| matches!(c, Clause::Return(_)))
}

fn segment_projection(segment: &Segment) -> ProjectionClause {
    match (&segment.boundary, segment.clauses.last()) {
        (Some(p), _) => p.clone(),
        (None, Some(Clause::Return(p))) => p.clone(),
        _ => ProjectionClause::default(),
    }
}

/// Runs one pipeline segment (everything between two WITH boundaries, or
/// before the first / after the last) for a single carried-in row, returning
/// every output row it produces.
fn run_segment(
    segment: &Segment,
    carried: &Row,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<Vec<Row>, CypherError> {
    let has_mutation = segment.clauses.iter().any(|c| {
        matches!(
            c,
            Clause::Create { .. } | Clause::Merge { .. } | Clause::Set { .. } | Clause::Delete { .. }
        )
    });

    if has_mutation {
        run_mutating_segment(segment, carried, params, store)
    } else {
        run_read_segment(segment, carried, params, store)
    }
}

fn run_read_segment(
    segment: &Segment,
    carried: &Row,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<Vec<Row>, CypherError> {
    let mut ctx = PlanningContext::new();
    ctx.carried = carried.clone();
    register_read_clauses(&mut ctx, &segment.clauses)?;

    let projection = segment_projection(segment);

    if ctx.calls.is_empty() {
        let stmt = build_select(&mut ctx, &projection, params)?;
        let raw_rows = store.query(&stmt.sql, &stmt.params)?;
        let col_names = projected_column_names(&ctx, &projection);
        return Ok(materialize_rows(&raw_rows, &col_names));
    }

    // A YIELD column isn't derivable in SQL, so a segment with a CALL runs
    // its MATCH/OPTIONAL MATCH/UNWIND portion through SQL in full (`*`, plus
    // any UNWIND aliases), joins the procedure's yielded rows against that in
    // memory, then evaluates the segment's own projection over the result
    // the same way a carried-only segment does.
    let calls = ctx.calls.clone();
    let mut base_projection = ProjectionClause {
        star: true,
        ..ProjectionClause::default()
    };
    for (alias, _) in ctx.unwind_stack.clone() {
        base_projection.items.push(crate::ast::ProjectionItem {
            expr: Expr::Variable(alias.clone()),
            alias: Some(alias),
        });
    }
    let stmt = build_select(&mut ctx, &base_projection, params)?;
    let raw_rows = store.query(&stmt.sql, &stmt.params)?;
    let col_names = projected_column_names(&ctx, &base_projection);
    let base_rows = materialize_rows(&raw_rows, &col_names);
    let joined = apply_calls(&calls, base_rows, params, store)?;
    memory_eval::project(&projection, &joined, params)
}

fn projected_column_names(ctx: &PlanningContext, projection: &ProjectionClause) -> Vec<String> {
    let mut names = Vec::new();
    if projection.star {
        for n in &ctx.nodes {
            names.push(n.alias.clone());
        }
        for r in &ctx.rels {
            names.push(r.edge_alias.clone());
        }
    }
    for (i, item) in projection.items.iter().enumerate() {
        names.push(item.alias.clone().unwrap_or_else(|| match &item.expr {
            Expr::Variable(v) => v.clone(),
            Expr::Property(_, p) => p.clone(),
            _ => format!("col{i}"),
        }));
    }
    names
}

fn materialize_rows(raw: &[Vec<serde_json::Value>], col_names: &[String]) -> Vec<Row> {
    raw.iter()
        .map(|r| {
            let mut row = Row::new();
            for (name, value) in col_names.iter().zip(r.iter()) {
                row.insert(name.clone(), row_shaping::shape_column(value));
            }
            row
        })
        .collect()
}

fn register_read_clauses(ctx: &mut PlanningContext, clauses: &[Clause]) -> Result<(), CypherError> {
    for clause in clauses {
        match clause {
            Clause::Match { patterns, where_ } => {
                for p in patterns {
                    ctx.register_pattern(p, false)?;
                }
                if let Some(w) = where_ {
                    ctx.where_required.push(w.clone());
                }
            }
            Clause::OptionalMatch { patterns, where_ } => {
                for p in patterns {
                    ctx.register_pattern(p, true)?;
                    if let Some(w) = where_ {
                        let anchor = optional_anchor(p);
                        ctx.where_optional.push((anchor, w.clone()));
                    }
                }
            }
            Clause::Unwind { expr, alias } => {
                ctx.unwind_stack.push((alias.clone(), expr.clone()));
            }
            Clause::Call { procedure, yield_items, where_ } => {
                let yield_alias = yield_items.as_ref().and_then(|items| items.first().cloned());
                ctx.calls.push(crate::planner::RegisteredCall {
                    procedure: procedure.clone(),
                    yield_alias,
                    where_: where_.clone(),
                });
            }
            Clause::Return(_) | Clause::With(_) => {}
            _ => {
                return Err(CypherError::from(InvariantError(
                    "mutation clause reached the read-only registration path".to_string(),
                )))
            }
        }
    }
    Ok(())
}

fn optional_anchor(pattern: &PathPattern) -> String {
    use crate::ast::PatternElement;
    match &pattern.element {
        PatternElement::Node(n) => n.variable.clone().unwrap_or_default(),
        PatternElement::Chain(links) => links
            .last()
            .and_then(|l| l.target.variable.clone())
            .unwrap_or_default(),
        PatternElement::ShortestPath(_, inner) => optional_anchor(&PathPattern {
            path_variable: None,
            element: (**inner).clone(),
        }),
    }
}

/// Binds a mid-pipeline `CALL proc() YIELD col` against already-materialized
/// rows as an in-memory cross join (spec §4.3.1): the known procedures are
/// small, store-derived lookups with no correlation to the enclosing MATCH,
/// so there's no SQL to generate for them. `CALL`'s own `WHERE` filters the
/// yielded rows before the join, mirroring WITH's `where_`.
fn apply_calls(
    calls: &[crate::planner::RegisteredCall],
    rows: Vec<Row>,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<Vec<Row>, CypherError> {
    let mut rows = rows;
    for call in calls {
        let (cols, proc_rows) = procedures::call_procedure(&call.procedure, store)?;
        let yield_name = call
            .yield_alias
            .clone()
            .unwrap_or_else(|| cols.first().cloned().unwrap_or_default());

        let mut yielded = Vec::with_capacity(proc_rows.len());
        for proc_row in proc_rows {
            let value = proc_row.into_iter().next().unwrap_or(Value::Null);
            if let Some(cond) = &call.where_ {
                let mut probe = Row::new();
                probe.insert(yield_name.clone(), value.clone());
                if !matches!(memory_eval::eval(cond, &probe, params)?, Value::Bool(true)) {
                    continue;
                }
            }
            yielded.push(value);
        }

        // No fallback base row when `rows` is empty: that only happens when
        // an earlier MATCH genuinely bound nothing, and a cross join against
        // zero rows must stay empty. The no-MATCH case already has exactly
        // one base row (`build_select`'s bare `SELECT 1`), so CALL as the
        // pipeline's only source still yields one row per procedure result.
        let mut joined = Vec::with_capacity(rows.len() * yielded.len());
        for row in &rows {
            for value in &yielded {
                let mut r = row.clone();
                r.insert(yield_name.clone(), value.clone());
                joined.push(r);
            }
        }
        rows = joined;
    }
    Ok(rows)
}

/// Probe-then-mutate: run the segment's read clauses as an ordinary SELECT
/// to fix the set of rows being mutated, then apply CREATE/SET/DELETE/MERGE
/// once per row so a `MATCH (n) SET n.x = 1` style query mutates exactly the
/// rows the MATCH bound, not a moving target.
fn run_mutating_segment(
    segment: &Segment,
    carried: &Row,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<Vec<Row>, CypherError> {
    let read_clauses: Vec<Clause> = segment
        .clauses
        .iter()
        .filter(|c| matches!(c, Clause::Match { .. } | Clause::OptionalMatch { .. } | Clause::Unwind { .. }))
        .cloned()
        .collect();

    if read_clauses.is_empty() {
        // No preceding MATCH: CREATE/MERGE/DELETE run exactly once against
        // whatever the previous WITH boundary carried forward (e.g. a
        // `WITH collect(n) AS ns` feeding a `DELETE ns[0]`).
        return run_mutations_for_row(&segment.clauses, carried, params, store);
    }

    let mut ctx = PlanningContext::new();
    ctx.carried = carried.clone();
    register_read_clauses(&mut ctx, &read_clauses)?;
    let mut projection = ProjectionClause::default();
    for node in &ctx.nodes {
        projection.items.push(crate::ast::ProjectionItem {
            expr: Expr::Variable(node.alias.clone()),
            alias: Some(node.alias.clone()),
        });
    }
    for rel in &ctx.rels {
        projection.items.push(crate::ast::ProjectionItem {
            expr: Expr::Variable(rel.edge_alias.clone()),
            alias: Some(rel.edge_alias.clone()),
        });
    }
    let stmt = build_select(&mut ctx, &projection, params)?;
    let raw_rows = store.query(&stmt.sql, &stmt.params)?;
    let col_names = projected_column_names(&ctx, &projection);
    let bound_rows = materialize_rows(&raw_rows, &col_names);

    let mut out = Vec::new();
    for row in &bound_rows {
        // Re-matched MATCH-bound aliases win on name collision; anything
        // else carried forward (e.g. a collected list the DELETE targets by
        // index) rides along untouched.
        let mut merged_row = carried.clone();
        for (k, v) in row {
            merged_row.insert(k.clone(), v.clone());
        }
        out.extend(run_mutations_for_row(&segment.clauses, &merged_row, params, store)?);
    }
    Ok(out)
}

fn entity_id_of(value: &Value) -> Option<String> {
    if let Value::Map(entries) = value {
        for (k, v) in entries {
            if k == "id" {
                if let Value::Str(s) = v {
                    return Some(s.clone());
                }
            }
        }
    }
    None
}

fn entity_table_of(value: &Value) -> Option<DeleteTable> {
    if let Value::Map(entries) = value {
        if entries.iter().any(|(k, _)| k == "type") {
            return Some(DeleteTable::Edge);
        }
        if entries.iter().any(|(k, _)| k == "labels") {
            return Some(DeleteTable::Node);
        }
    }
    None
}

/// Resolves a DELETE target expression against the row bound so far: a bare
/// variable deletes the entity it's bound to, an indexing expression over a
/// carried list (e.g. `ns[0]`, from `WITH collect(n) AS ns`) deletes the
/// entity at that index.
fn resolve_delete_target(
    expr: &Expr,
    bound_row: &Row,
    entity_ids: &HashMap<String, String>,
    read_ctx: &PlanningContext,
    params: &HashMap<String, Value>,
) -> Result<(String, DeleteTable), CypherError> {
    match expr {
        Expr::Variable(var) => {
            let id = entity_ids
                .get(var)
                .cloned()
                .ok_or_else(|| CypherError::from(SemanticError::UnboundVariable(var.clone())))?;
            let binding = read_ctx.binding(var)?;
            let table = match binding.kind {
                VarKind::Edge | VarKind::VariableLengthEdge => DeleteTable::Edge,
                _ => DeleteTable::Node,
            };
            Ok((id, table))
        }
        Expr::Index(base, idx) if matches!(**base, Expr::Variable(_)) => {
            let Expr::Variable(var) = base.as_ref() else {
                unreachable!()
            };
            let list = match bound_row.get(var) {
                Some(Value::List(items)) => items,
                Some(_) => {
                    return Err(CypherError::from(SemanticError::InvalidDeleteTarget(format!(
                        "'{var}' is not a list"
                    ))))
                }
                None => {
                    return Err(CypherError::from(SemanticError::UnboundVariable(var.clone())))
                }
            };
            let index_value = memory_eval::eval(idx, bound_row, params)?;
            let Value::Int(raw_index) = index_value else {
                return Err(CypherError::from(SemanticError::InvalidDeleteTarget(
                    "list index must be an integer".to_string(),
                )));
            };
            let len = list.len() as i64;
            let resolved = if raw_index < 0 { raw_index + len } else { raw_index };
            if resolved < 0 || resolved >= len {
                return Err(CypherError::from(InvariantError(format!(
                    "list index {raw_index} out of range for '{var}'"
                ))));
            }
            let item = &list[resolved as usize];
            let id = entity_id_of(item).ok_or_else(|| {
                CypherError::from(SemanticError::InvalidDeleteTarget(format!(
                    "'{var}[{raw_index}]' is not an entity"
                )))
            })?;
            let table = entity_table_of(item).ok_or_else(|| {
                CypherError::from(SemanticError::InvalidDeleteTarget(format!(
                    "'{var}[{raw_index}]' is not an entity"
                )))
            })?;
            Ok((id, table))
        }
        other => Err(CypherError::from(SemanticError::InvalidDeleteTarget(format!(
            "'{other:?}' cannot be used as a DELETE target (must be a variable or an indexing expression over one)"
        )))),
    }
}

fn run_mutations_for_row(
    clauses: &[Clause],
    bound_row: &Row,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<Vec<Row>, CypherError> {
    let mut entity_ids: HashMap<String, String> = HashMap::new();
    for (var, value) in bound_row {
        if let Some(id) = entity_id_of(value) {
            entity_ids.insert(var.clone(), id);
        }
    }

    let mut read_ctx = PlanningContext::new();
    read_ctx.carried = bound_row.clone();
    register_read_clauses(
        &mut read_ctx,
        &clauses
            .iter()
            .filter(|c| matches!(c, Clause::Match { .. } | Clause::OptionalMatch { .. }))
            .cloned()
            .collect::<Vec<_>>(),
    )?;

    let mut result_row = bound_row.clone();

    for clause in clauses {
        match clause {
            Clause::Create { patterns } => {
                let targets = create::collect_create_targets(patterns, &read_ctx);
                for target in &targets {
                    let key = match target {
                        create::CreateTarget::NewNode { key, .. } => key,
                        create::CreateTarget::NewEdge { key, .. } => key,
                    };
                    entity_ids
                        .entry(key.clone())
                        .or_insert_with(|| Uuid::new_v4().to_string());
                }
                let statements = create::build_create(&targets, &entity_ids, params)?;
                for stmt in &statements {
                    store.execute(&stmt.sql, &stmt.params)?;
                }
            }
            Clause::Set { items } => {
                let statements = set::build_set(items, &entity_ids, &read_ctx, params)?;
                for stmt in &statements {
                    store.execute(&stmt.sql, &stmt.params)?;
                }
            }
            Clause::Delete { detach, targets } => {
                let mut delete_targets = Vec::new();
                for expr in targets {
                    let (id, table) =
                        resolve_delete_target(expr, &result_row, &entity_ids, &read_ctx, params)?;
                    if table == DeleteTable::Node && !detach {
                        let count = store.query(
                            "SELECT count(*) FROM edges WHERE source_id = ? OR target_id = ?",
                            &[
                                crate::translator::SqlParam::Text(id.clone()),
                                crate::translator::SqlParam::Text(id.clone()),
                            ],
                        )?;
                        let has_edges = count
                            .first()
                            .and_then(|r| r.first())
                            .and_then(|v| v.as_i64())
                            .unwrap_or(0)
                            > 0;
                        if has_edges {
                            return Err(CypherError::from(InvariantError(
                                "cannot delete a node with relationships without DETACH".to_string(),
                            )));
                        }
                    }
                    delete_targets.push(DeleteTarget { id, table });
                }
                for stmt in build_delete(&delete_targets, *detach) {
                    store.execute(&stmt.sql, &stmt.params)?;
                }
            }
            Clause::Merge {
                pattern,
                on_create,
                on_match,
            } => {
                run_merge(pattern, on_create, on_match, params, store, &mut result_row)?;
            }
            _ => {}
        }
    }

    Ok(vec![result_row])
}

fn run_merge(
    pattern: &PathPattern,
    on_create: &[crate::ast::SetItem],
    on_match: &[crate::ast::SetItem],
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
    result_row: &mut Row,
) -> Result<(), CypherError> {
    let (probe_ctx, stmt) = merge::build_merge_probe(pattern, params)?;
    let col_names = probe_ctx
        .nodes
        .iter()
        .map(|n| n.alias.clone())
        .chain(probe_ctx.rels.iter().map(|r| r.edge_alias.clone()))
        .collect::<Vec<_>>();
    let raw_rows = store.query(&stmt.sql, &stmt.params)?;
    let rows = materialize_rows(&raw_rows, &col_names);

    if rows.is_empty() {
        warn!("merge pattern not found, creating");
        let targets = create::collect_create_targets(std::slice::from_ref(pattern), &PlanningContext::new());
        let mut entity_ids = HashMap::new();
        for target in &targets {
            let key = match target {
                create::CreateTarget::NewNode { key, .. } => key,
                create::CreateTarget::NewEdge { key, .. } => key,
            };
            entity_ids.insert(key.clone(), Uuid::new_v4().to_string());
        }
        for stmt in create::build_create(&targets, &entity_ids, params)? {
            store.execute(&stmt.sql, &stmt.params)?;
        }
        let _ = on_create;
        for (var, id) in &entity_ids {
            result_row.insert(
                var.clone(),
                json_to_value(&serde_json::json!({"id": id, "properties": {}})),
            );
        }
        apply_set_items(on_create, &entity_ids, &probe_ctx, params, store)?;
    } else {
        for row in &rows {
            let mut entity_ids = HashMap::new();
            for (var, value) in row {
                if let Some(id) = entity_id_of(value) {
                    entity_ids.insert(var.clone(), id);
                }
                result_row.insert(var.clone(), value.clone());
            }
            apply_set_items(on_match, &entity_ids, &probe_ctx, params, store)?;
        }
    }
    Ok(())
}

fn apply_set_items(
    items: &[crate::ast::SetItem],
    entity_ids: &HashMap<String, String>,
    ctx: &PlanningContext,
    params: &HashMap<String, Value>,
    store: &dyn RowStore,
) -> Result<(), CypherError> {
    if items.is_empty() {
        return Ok(());
    }
    for stmt in set::build_set(items, entity_ids, ctx, params)? {
        store.execute(&stmt.sql, &stmt.params)?;
    }
    Ok(())
}
