//! In-Rust evaluator for pipeline segments that carry a WITH-boundary row
//! forward without touching the store (spec §3 "WITH stack"): once a
//! segment's own clauses are nothing but a trailing RETURN/WITH projection —
//! no MATCH/OPTIONAL MATCH/UNWIND/CALL/mutation of its own — there is no SQL
//! to generate. Running such a segment once per carried row (as the
//! store-touching path does) would compute any aggregate independently per
//! row instead of across the whole carried set, so this module evaluates the
//! projection directly over the full `&[Row]` at once, mirroring
//! `translator::select`'s SELECT-list/GROUP BY/ORDER BY assembly but against
//! already-materialized rows instead of generated SQL text.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::ast::{BinaryOp, CompareOp, Expr, ProjectionClause, StringPredicateKind, Value};
use crate::error::{CypherError, SemanticError};
use crate::translator::functions;
use crate::translator::select::expr_contains_aggregate;

use super::Row;

pub fn project(
    projection: &ProjectionClause,
    rows: &[Row],
    params: &HashMap<String, Value>,
) -> Result<Vec<Row>, CypherError> {
    let mut rows: Vec<Row> = rows.to_vec();

    if let Some(cond) = &projection.where_ {
        let mut kept = Vec::new();
        for row in rows {
            if is_truthy(&eval(cond, &row, params)?) {
                kept.push(row);
            }
        }
        rows = kept;
    }

    let has_aggregate = projection.items.iter().any(|i| expr_contains_aggregate(&i.expr));
    let mut out = if !has_aggregate {
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(project_row(projection, row, params)?);
        }
        out
    } else {
        project_aggregated(projection, &rows, params)?
    };

    if projection.distinct {
        dedupe(&mut out);
    }

    if !projection.order_by.is_empty() {
        let mut keyed = Vec::with_capacity(out.len());
        for row in out {
            let mut key = Vec::with_capacity(projection.order_by.len());
            for (expr, _) in &projection.order_by {
                key.push(eval(expr, &row, params)?);
            }
            keyed.push((key, row));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, (av, bv)) in a.iter().zip(b.iter()).enumerate() {
                let ord = compare_values(av, bv);
                if ord != Ordering::Equal {
                    return if projection.order_by[i].1 { ord } else { ord.reverse() };
                }
            }
            Ordering::Equal
        });
        out = keyed.into_iter().map(|(_, row)| row).collect();
    }

    if let Some(skip) = &projection.skip {
        if let Value::Int(n) = eval(skip, &Row::new(), params)? {
            out = out.into_iter().skip(n.max(0) as usize).collect();
        }
    }
    if let Some(limit) = &projection.limit {
        if let Value::Int(n) = eval(limit, &Row::new(), params)? {
            out.truncate(n.max(0) as usize);
        }
    }

    Ok(out)
}

fn dedupe(rows: &mut Vec<Row>) {
    let mut seen: Vec<Row> = Vec::new();
    rows.retain(|row| {
        if seen.iter().any(|s| s == row) {
            false
        } else {
            seen.push(row.clone());
            true
        }
    });
}

fn item_alias(item: &crate::ast::ProjectionItem, fallback_index: usize) -> String {
    item.alias.clone().unwrap_or_else(|| match &item.expr {
        Expr::Variable(v) => v.clone(),
        Expr::Property(_, p) => p.clone(),
        _ => format!("col{fallback_index}"),
    })
}

fn project_row(projection: &ProjectionClause, row: &Row, params: &HashMap<String, Value>) -> Result<Row, CypherError> {
    let mut out = if projection.star { row.clone() } else { Row::new() };
    for (i, item) in projection.items.iter().enumerate() {
        let alias = item_alias(item, i);
        out.insert(alias, eval(&item.expr, row, params)?);
    }
    Ok(out)
}

/// Groups `rows` by the non-aggregate projection items' values, then
/// computes each aggregate item once per group — the in-memory analogue of
/// `select::build_group_by` + SQL's `GROUP BY`.
fn project_aggregated(
    projection: &ProjectionClause,
    rows: &[Row],
    params: &HashMap<String, Value>,
) -> Result<Vec<Row>, CypherError> {
    let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
    for row in rows {
        let mut key = Vec::new();
        for item in &projection.items {
            if !expr_contains_aggregate(&item.expr) {
                key.push(eval(&item.expr, row, params)?);
            }
        }
        match groups.iter_mut().find(|(k, _)| k == &key) {
            Some((_, members)) => members.push(row.clone()),
            None => groups.push((key, vec![row.clone()])),
        }
    }
    if groups.is_empty() {
        // A bare aggregate over zero rows still produces one row
        // (count() = 0, collect() = []).
        groups.push((Vec::new(), Vec::new()));
    }

    let mut out = Vec::with_capacity(groups.len());
    for (_, members) in &groups {
        let mut result_row = Row::new();
        for (i, item) in projection.items.iter().enumerate() {
            let alias = item_alias(item, i);
            let value = if expr_contains_aggregate(&item.expr) {
                eval_aggregate(&item.expr, members, params)?
            } else {
                match members.first() {
                    Some(r) => eval(&item.expr, r, params)?,
                    None => Value::Null,
                }
            };
            result_row.insert(alias, value);
        }
        out.push(result_row);
    }
    Ok(out)
}

fn eval_aggregate(expr: &Expr, members: &[Row], params: &HashMap<String, Value>) -> Result<Value, CypherError> {
    let Expr::FunctionCall { name, args, distinct } = expr else {
        return Err(CypherError::from(SemanticError::UnsupportedCarriedExpr(
            "aggregate expression must be a direct function call".to_string(),
        )));
    };
    let lower = name.to_lowercase();
    if lower == "count" && args.len() == 1 && matches!(&args[0], Expr::Literal(Value::Str(s)) if s == "*") {
        return Ok(Value::Int(members.len() as i64));
    }
    let mut values = Vec::with_capacity(members.len());
    for row in members {
        values.push(eval(&args[0], row, params)?);
    }
    if *distinct {
        dedupe_values(&mut values);
    }
    let non_null: Vec<&Value> = values.iter().filter(|v| !matches!(v, Value::Null)).collect();

    match lower.as_str() {
        "count" => Ok(Value::Int(non_null.len() as i64)),
        "collect" => Ok(Value::List(non_null.into_iter().cloned().collect())),
        "sum" => Ok(sum_values(&non_null)),
        "avg" => {
            if non_null.is_empty() {
                Ok(Value::Null)
            } else {
                let total = as_f64_sum(&non_null);
                Ok(Value::Float(total / non_null.len() as f64))
            }
        }
        "min" => Ok(non_null
            .into_iter()
            .min_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null)),
        "max" => Ok(non_null
            .into_iter()
            .max_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null)),
        other => Err(CypherError::from(SemanticError::UnknownFunction(other.to_string()))),
    }
}

fn dedupe_values(values: &mut Vec<Value>) {
    let mut seen: Vec<Value> = Vec::new();
    values.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}

fn sum_values(values: &[&Value]) -> Value {
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        Value::Int(values.iter().map(|v| match v { Value::Int(i) => *i, _ => 0 }).sum())
    } else {
        Value::Float(as_f64_sum(values))
    }
}

fn as_f64_sum(values: &[&Value]) -> f64 {
    values
        .iter()
        .map(|v| match v {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            _ => 0.0,
        })
        .sum()
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn is_truthy(v: &Value) -> bool {
    matches!(v, Value::Bool(true))
}

fn property_of(value: &Value, prop: &str) -> Value {
    if let Value::Map(entries) = value {
        let has_entity_marker = entries.iter().any(|(k, _)| k == "properties");
        let target = if has_entity_marker {
            entries
                .iter()
                .find(|(k, _)| k == "properties")
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null)
        } else {
            value.clone()
        };
        if let Value::Map(props) = target {
            return props
                .into_iter()
                .find(|(k, _)| k == prop)
                .map(|(_, v)| v)
                .unwrap_or(Value::Null);
        }
    }
    Value::Null
}

fn numeric_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, SemanticError> {
    if op == BinaryOp::Add {
        if let (Value::List(a), Value::List(b)) = (l, r) {
            let mut out = a.clone();
            out.extend(b.clone());
            return Ok(Value::List(out));
        }
        if let Value::Str(a) = l {
            if let Value::Str(b) = r {
                return Ok(Value::Str(format!("{a}{b}")));
            }
        }
    }
    let (lf, rf) = (as_f64(l), as_f64(r));
    let both_int = matches!((l, r), (Value::Int(_), Value::Int(_)));
    let result = match op {
        BinaryOp::Add => lf + rf,
        BinaryOp::Sub => lf - rf,
        BinaryOp::Mul => lf * rf,
        BinaryOp::Div => lf / rf,
        BinaryOp::Mod => lf % rf,
        BinaryOp::Pow => lf.powf(rf),
    };
    if both_int && matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Mod) {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Float(result))
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

pub fn eval(expr: &Expr, row: &Row, params: &HashMap<String, Value>) -> Result<Value, CypherError> {
    Ok(match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Parameter(name) => params.get(name).cloned().unwrap_or(Value::Null),
        Expr::Variable(name) => row
            .get(name)
            .cloned()
            .ok_or_else(|| SemanticError::UnboundVariable(name.clone()))?,
        Expr::Property(base, prop) => {
            let base_val = eval(base, row, params)?;
            property_of(&base_val, prop)
        }
        Expr::ObjectLiteral(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((k.clone(), eval(v, row, params)?));
            }
            Value::Map(out)
        }
        Expr::ListLiteral(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, row, params)?);
            }
            Value::List(out)
        }
        Expr::Binary(op, l, r) => {
            let lv = eval(l, row, params)?;
            let rv = eval(r, row, params)?;
            numeric_binary(*op, &lv, &rv)?
        }
        Expr::Neg(inner) => match eval(inner, row, params)? {
            Value::Int(i) => Value::Int(-i),
            Value::Float(f) => Value::Float(-f),
            other => other,
        },
        Expr::Not(inner) => Value::Bool(!is_truthy(&eval(inner, row, params)?)),
        Expr::And(l, r) => Value::Bool(is_truthy(&eval(l, row, params)?) && is_truthy(&eval(r, row, params)?)),
        Expr::Or(l, r) => Value::Bool(is_truthy(&eval(l, row, params)?) || is_truthy(&eval(r, row, params)?)),
        Expr::Xor(l, r) => {
            let (lv, rv) = (is_truthy(&eval(l, row, params)?), is_truthy(&eval(r, row, params)?));
            Value::Bool(lv ^ rv)
        }
        Expr::Compare(op, l, r) => {
            let lv = eval(l, row, params)?;
            let rv = eval(r, row, params)?;
            if matches!(lv, Value::Null) || matches!(rv, Value::Null) {
                Value::Null
            } else {
                let ord = compare_values(&lv, &rv);
                Value::Bool(match op {
                    CompareOp::Eq => lv == rv,
                    CompareOp::Ne => lv != rv,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Le => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Ge => ord != Ordering::Less,
                })
            }
        }
        Expr::IsNull(inner, negate) => {
            let is_null = matches!(eval(inner, row, params)?, Value::Null);
            Value::Bool(is_null != *negate)
        }
        Expr::InList(item, list) => {
            let item_v = eval(item, row, params)?;
            match eval(list, row, params)? {
                Value::List(items) => Value::Bool(items.contains(&item_v)),
                _ => Value::Bool(false),
            }
        }
        Expr::StringPredicate { kind, subject, pattern } => {
            let s = eval(subject, row, params)?;
            let p = eval(pattern, row, params)?;
            match (s, p) {
                (Value::Str(s), Value::Str(p)) => Value::Bool(match kind {
                    StringPredicateKind::Contains => s.contains(&p),
                    StringPredicateKind::StartsWith => s.starts_with(&p),
                    StringPredicateKind::EndsWith => s.ends_with(&p),
                }),
                _ => Value::Null,
            }
        }
        Expr::FunctionCall { name, args, .. } => eval_scalar_function(name, args, row, params)?,
        Expr::Case { subject, whens, else_ } => {
            let subject_v = match subject {
                Some(s) => Some(eval(s, row, params)?),
                None => None,
            };
            let mut result = None;
            for (cond, value) in whens {
                let matched = match &subject_v {
                    Some(sv) => sv == &eval(cond, row, params)?,
                    None => is_truthy(&eval(cond, row, params)?),
                };
                if matched {
                    result = Some(eval(value, row, params)?);
                    break;
                }
            }
            match result {
                Some(v) => v,
                None => match else_ {
                    Some(e) => eval(e, row, params)?,
                    None => Value::Null,
                },
            }
        }
        Expr::Index(base, idx) => {
            let base_v = eval(base, row, params)?;
            let idx_v = eval(idx, row, params)?;
            match (base_v, idx_v) {
                (Value::List(items), Value::Int(i)) => {
                    let len = items.len() as i64;
                    let idx = if i < 0 { len + i } else { i };
                    if idx >= 0 && idx < len {
                        items[idx as usize].clone()
                    } else {
                        Value::Null
                    }
                }
                _ => Value::Null,
            }
        }
        Expr::Slice(base, lo, hi) => {
            let base_v = eval(base, row, params)?;
            let Value::List(items) = base_v else {
                return Ok(Value::Null);
            };
            let len = items.len() as i64;
            let lo = match lo {
                Some(e) => as_index(&eval(e, row, params)?, len, 0),
                None => 0,
            };
            let hi = match hi {
                Some(e) => as_index(&eval(e, row, params)?, len, len),
                None => len,
            };
            let lo = lo.clamp(0, len) as usize;
            let hi = hi.clamp(0, len) as usize;
            if lo < hi {
                Value::List(items[lo..hi].to_vec())
            } else {
                Value::List(Vec::new())
            }
        }
        Expr::ListComprehension { .. } | Expr::ListPredicate { .. } | Expr::LabelPredicate { .. } | Expr::PatternExists(_) => {
            return Err(CypherError::from(SemanticError::UnsupportedCarriedExpr(
                "list comprehension, list predicate, label predicate, and pattern-exists need a MATCH to evaluate against".to_string(),
            )))
        }
    })
}

fn as_index(v: &Value, len: i64, default: i64) -> i64 {
    match v {
        Value::Int(i) => if *i < 0 { len + i } else { *i },
        _ => default,
    }
}

fn eval_scalar_function(name: &str, args: &[Expr], row: &Row, params: &HashMap<String, Value>) -> Result<Value, CypherError> {
    let lower = name.to_lowercase();
    if functions::is_aggregate(&lower) {
        return Err(CypherError::from(SemanticError::UnsupportedCarriedExpr(format!(
            "aggregate function '{name}' used outside of a RETURN/WITH projection item"
        ))));
    }
    let mut vals = Vec::with_capacity(args.len());
    for a in args {
        vals.push(eval(a, row, params)?);
    }
    Ok(match lower.as_str() {
        "coalesce" => vals.into_iter().find(|v| !matches!(v, Value::Null)).unwrap_or(Value::Null),
        "size" => match &vals[0] {
            Value::List(items) => Value::Int(items.len() as i64),
            Value::Str(s) => Value::Int(s.chars().count() as i64),
            _ => Value::Null,
        },
        "tointeger" => match &vals[0] {
            Value::Int(i) => Value::Int(*i),
            Value::Float(f) => Value::Int(*f as i64),
            Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "tofloat" => match &vals[0] {
            Value::Int(i) => Value::Float(*i as f64),
            Value::Float(f) => Value::Float(*f),
            Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "tostring" => match &vals[0] {
            Value::Str(s) => Value::Str(s.clone()),
            Value::Null => Value::Null,
            other => Value::Str(other.to_string()),
        },
        "abs" => match &vals[0] {
            Value::Int(i) => Value::Int(i.abs()),
            Value::Float(f) => Value::Float(f.abs()),
            _ => Value::Null,
        },
        "head" => match &vals[0] {
            Value::List(items) => items.first().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "last" => match &vals[0] {
            Value::List(items) => items.last().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "tail" => match &vals[0] {
            Value::List(items) => Value::List(items.iter().skip(1).cloned().collect()),
            _ => Value::Null,
        },
        "keys" => match &vals[0] {
            Value::Map(entries) => Value::List(entries.iter().map(|(k, _)| Value::Str(k.clone())).collect()),
            _ => Value::Null,
        },
        "labels" => match &vals[0] {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k == "labels")
                .map(|(_, v)| match v {
                    Value::Str(s) => Value::List(vec![Value::Str(s.clone())]),
                    other => other.clone(),
                })
                .unwrap_or(Value::List(Vec::new())),
            _ => Value::Null,
        },
        "type" => match &vals[0] {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == "type").map(|(_, v)| v.clone()).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "id" => match &vals[0] {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == "id").map(|(_, v)| v.clone()).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "properties" => match &vals[0] {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k == "properties")
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| Value::Map(entries.clone())),
            _ => Value::Null,
        },
        other => {
            if let Some(mapping) = functions::lookup(other) {
                let _ = mapping;
                return Err(CypherError::from(SemanticError::UnsupportedCarriedExpr(format!(
                    "'{name}' isn't evaluable in a carried-only segment"
                ))));
            }
            return Err(CypherError::from(SemanticError::UnknownFunction(name.to_string())));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ProjectionItem;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn filters_then_collects_across_rows() {
        let rows = vec![row(&[("x", Value::Int(1))]), row(&[("x", Value::Int(2))]), row(&[("x", Value::Int(4))])];
        let projection = ProjectionClause {
            items: vec![ProjectionItem {
                expr: Expr::FunctionCall {
                    name: "collect".into(),
                    args: vec![Expr::Variable("x".into())],
                    distinct: false,
                },
                alias: Some("xs".into()),
            }],
            where_: Some(Expr::Compare(
                CompareOp::Eq,
                Box::new(Expr::Binary(BinaryOp::Mod, Box::new(Expr::Variable("x".into())), Box::new(Expr::Literal(Value::Int(2))))),
                Box::new(Expr::Literal(Value::Int(0))),
            )),
            ..Default::default()
        };
        let out = project(&projection, &rows, &HashMap::new()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("xs"), Some(&Value::List(vec![Value::Int(2), Value::Int(4)])));
    }

    #[test]
    fn plain_projection_passes_through_each_row() {
        let rows = vec![row(&[("x", Value::Int(1))]), row(&[("x", Value::Int(2))])];
        let projection = ProjectionClause {
            items: vec![ProjectionItem { expr: Expr::Variable("x".into()), alias: None }],
            ..Default::default()
        };
        let out = project(&projection, &rows, &HashMap::new()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].get("x"), Some(&Value::Int(2)));
    }
}
