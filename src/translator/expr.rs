//! Expression lowering (spec §4.3.5): the single place Cypher `Expr` values
//! become SQL text plus a parallel positional parameter vector. Integer
//! literals are inlined (to preserve integer arithmetic); every other
//! literal and every `$parameter` becomes a positional `?` parameter —
//! nothing else is ever interpolated into the SQL string.

use std::collections::HashMap;

use crate::ast::{BinaryOp, CompareOp, Expr, ListPredicateKind, StringPredicateKind, Value};
use crate::error::SemanticError;
use crate::planner::{PlanningContext, VarKind};
use crate::value::value_to_sql_param;

use super::functions;
use super::SqlParam;

pub struct ExprRenderer<'a> {
    pub ctx: &'a PlanningContext,
    pub query_params: &'a HashMap<String, Value>,
    pub params: Vec<SqlParam>,
}

impl<'a> ExprRenderer<'a> {
    pub fn new(ctx: &'a PlanningContext, query_params: &'a HashMap<String, Value>) -> Self {
        ExprRenderer {
            ctx,
            query_params,
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: &Value) -> String {
        self.params.push(value_to_sql_param(v));
        "?".to_string()
    }

    /// Identity-preserving rendering of a bound node/edge variable: the
    /// hidden `_nf_id` (and, for edges, `_nf_type`) survive UNION/GROUP BY
    /// without leaking into user-visible properties (spec §4.3.5, §9).
    fn render_entity_var(&self, alias: &str, kind: VarKind) -> String {
        match kind {
            VarKind::Node => format!(
                "(CASE WHEN {a}.id IS NULL THEN NULL ELSE json_set(coalesce({a}.properties,'{{}}'),'$._nf_id',{a}.id,'$._nf_label',json({a}.label)) END)",
                a = alias
            ),
            VarKind::Edge => format!(
                "(CASE WHEN {a}.id IS NULL THEN NULL ELSE json_set(coalesce({a}.properties,'{{}}'),'$._nf_id',{a}.id,'$._nf_type',{a}.type) END)",
                a = alias
            ),
            _ => alias.to_string(),
        }
    }

    pub fn render(&mut self, expr: &Expr) -> Result<String, SemanticError> {
        match expr {
            Expr::Literal(Value::Int(i)) => Ok(i.to_string()),
            Expr::Literal(v) => Ok(self.push_param(v)),
            Expr::Parameter(name) => {
                let v = self
                    .query_params
                    .get(name)
                    .cloned()
                    .unwrap_or(Value::Null);
                Ok(self.push_param(&v))
            }
            Expr::Variable(name) => match self.ctx.binding(name) {
                Ok(binding) => Ok(self.render_entity_var(&binding.alias, binding.kind)),
                Err(e) => match self.ctx.carried.get(name) {
                    Some(v) => Ok(self.push_param(v)),
                    None => Err(e),
                },
            },
            Expr::Property(base, prop) => {
                let base_sql = self.render_property_base(base)?;
                Ok(format!("json_extract({base_sql}, '$.{prop}')"))
            }
            Expr::ObjectLiteral(entries) => {
                let mut parts = Vec::new();
                for (k, v) in entries {
                    let rendered = self.render(v)?;
                    parts.push(format!("'{k}', {rendered}"));
                }
                Ok(format!("json_object({})", parts.join(", ")))
            }
            Expr::ListLiteral(items) => {
                let mut parts = Vec::new();
                for item in items {
                    parts.push(self.render(item)?);
                }
                Ok(format!("json_array({})", parts.join(", ")))
            }
            Expr::Binary(op, l, r) => self.render_binary(*op, l, r),
            Expr::Neg(inner) => Ok(format!("(-({}))", self.render(inner)?)),
            Expr::Not(inner) => Ok(format!("(NOT ({}))", self.render(inner)?)),
            Expr::And(l, r) => Ok(format!("(({}) AND ({}))", self.render(l)?, self.render(r)?)),
            Expr::Or(l, r) => Ok(format!("(({}) OR ({}))", self.render(l)?, self.render(r)?)),
            Expr::Xor(l, r) => {
                let l = self.render(l)?;
                let r = self.render(r)?;
                Ok(format!("((({l}) AND NOT ({r})) OR (NOT ({l}) AND ({r})))"))
            }
            Expr::Compare(op, l, r) => {
                let l = self.render(l)?;
                let r = self.render(r)?;
                Ok(format!("({l} {} {r})", compare_sql_op(*op)))
            }
            Expr::IsNull(inner, negate) => {
                let inner = self.render(inner)?;
                Ok(if *negate {
                    format!("({inner} IS NOT NULL)")
                } else {
                    format!("({inner} IS NULL)")
                })
            }
            Expr::InList(item, list) => {
                let item_sql = self.render(item)?;
                let list_sql = self.render(list)?;
                Ok(format!(
                    "EXISTS (SELECT 1 FROM json_each({list_sql}) WHERE json_each.value = {item_sql})"
                ))
            }
            Expr::StringPredicate {
                kind,
                subject,
                pattern,
            } => {
                let s = self.render(subject)?;
                let p = self.render(pattern)?;
                Ok(match kind {
                    StringPredicateKind::Contains => format!("({s} LIKE '%' || {p} || '%')"),
                    StringPredicateKind::StartsWith => format!("({s} LIKE {p} || '%')"),
                    StringPredicateKind::EndsWith => format!("({s} LIKE '%' || {p})"),
                })
            }
            Expr::FunctionCall {
                name,
                args,
                distinct,
            } => self.render_function_call(name, args, *distinct),
            Expr::Case {
                subject,
                whens,
                else_,
            } => self.render_case(subject, whens, else_),
            Expr::ListComprehension {
                var,
                source,
                filter,
                map,
            } => self.render_list_comprehension(var, source, filter, map),
            Expr::ListPredicate {
                kind,
                var,
                source,
                filter,
            } => self.render_list_predicate(*kind, var, source, filter),
            Expr::LabelPredicate { var, labels } => {
                let binding = self.ctx.binding(var)?;
                let mut parts = Vec::new();
                for label in labels {
                    parts.push(format!(
                        "EXISTS (SELECT 1 FROM json_each({}.label) WHERE json_each.value = {})",
                        binding.alias,
                        self.push_param(&Value::Str(label.clone()))
                    ));
                }
                Ok(format!("({})", parts.join(" AND ")))
            }
            Expr::Index(base, idx) => {
                let base_sql = self.render(base)?;
                let idx_sql = self.render(idx)?;
                Ok(format!("json_extract({base_sql}, '$[' || cast({idx_sql} as integer) || ']')"))
            }
            Expr::Slice(base, lo, hi) => self.render_slice(base, lo, hi),
            Expr::PatternExists(pattern) => self.render_pattern_exists(pattern),
        }
    }

    /// Property access on the LHS of a `.prop` uses the raw column
    /// (`alias.properties`), not the identity-wrapped variable rendering —
    /// otherwise `_nf_id`/`_nf_label` would pollute `n.someProp` lookups.
    fn render_property_base(&mut self, expr: &Expr) -> Result<String, SemanticError> {
        match expr {
            Expr::Variable(name) => match self.ctx.binding(name) {
                Ok(binding) => match binding.kind {
                    VarKind::Node | VarKind::Edge => {
                        Ok(format!("coalesce({}.properties,'{{}}')", binding.alias))
                    }
                    _ => Ok(binding.alias.clone()),
                },
                Err(e) => match self.ctx.carried.get(name) {
                    Some(Value::Map(entries)) => {
                        let properties = entries
                            .iter()
                            .find(|(k, _)| k == "properties")
                            .map(|(_, v)| v.clone())
                            .unwrap_or_else(|| Value::Map(entries.clone()));
                        Ok(self.push_param(&properties))
                    }
                    Some(v) => Ok(self.push_param(&v.clone())),
                    None => Err(e),
                },
            },
            other => self.render(other),
        }
    }

    fn render_binary(&mut self, op: BinaryOp, l: &Expr, r: &Expr) -> Result<String, SemanticError> {
        if op == BinaryOp::Add && (looks_like_list(l) || looks_like_list(r)) {
            let l_sql = self.render(l)?;
            let r_sql = self.render(r)?;
            return Ok(format!(
                "(SELECT json_group_array(value) FROM (SELECT value FROM json_each({l_sql}) UNION ALL SELECT value FROM json_each({r_sql})))"
            ));
        }
        let l_sql = self.render(l)?;
        let r_sql = self.render(r)?;
        if op == BinaryOp::Add && might_be_list_at_runtime(l) && might_be_list_at_runtime(r) {
            // Runtime dispatch: property accesses can't be classified statically
            // (spec §4.3.5).
            return Ok(format!(
                "(CASE WHEN json_type({l_sql}) = 'array' OR json_type({r_sql}) = 'array' \
                 THEN (SELECT json_group_array(value) FROM (SELECT value FROM json_each({l_sql}) UNION ALL SELECT value FROM json_each({r_sql}))) \
                 ELSE ({l_sql} + {r_sql}) END)"
            ));
        }
        let op_sql = match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => return Ok(format!("power({l_sql}, {r_sql})")),
        };
        Ok(format!("({l_sql} {op_sql} {r_sql})"))
    }

    fn render_case(
        &mut self,
        subject: &Option<Box<Expr>>,
        whens: &[(Expr, Expr)],
        else_: &Option<Box<Expr>>,
    ) -> Result<String, SemanticError> {
        let mut sql = "(CASE".to_string();
        let subject_sql = match subject {
            Some(s) => Some(self.render(s)?),
            None => None,
        };
        if let Some(s) = &subject_sql {
            sql.push_str(&format!(" {s}"));
        }
        for (cond, result) in whens {
            let cond_sql = if subject_sql.is_some() {
                self.render(cond)?
            } else {
                self.render(cond)?
            };
            let result_sql = self.render(result)?;
            if subject_sql.is_some() {
                sql.push_str(&format!(" WHEN {cond_sql} THEN {result_sql}"));
            } else {
                sql.push_str(&format!(" WHEN {cond_sql} THEN {result_sql}"));
            }
        }
        if let Some(e) = else_ {
            let e_sql = self.render(e)?;
            sql.push_str(&format!(" ELSE {e_sql}"));
        }
        sql.push_str(" END)");
        Ok(sql)
    }

    fn render_list_comprehension(
        &mut self,
        var: &str,
        source: &Expr,
        filter: &Option<Box<Expr>>,
        map: &Option<Box<Expr>>,
    ) -> Result<String, SemanticError> {
        let source_sql = self.render(source)?;
        // json_each's output column is named `value`; alias it to the
        // comprehension variable so filter/map expressions can reference it
        // via an ad-hoc scalar binding.
        let item_ref = format!("{var}_item.value");
        let filter_sql = match filter {
            Some(f) => self.render_scoped(var, &item_ref, f)?,
            None => "1".to_string(),
        };
        let map_sql = match map {
            Some(m) => self.render_scoped(var, &item_ref, m)?,
            None => item_ref.clone(),
        };
        Ok(format!(
            "(SELECT json_group_array({map_sql}) FROM json_each({source_sql}) AS {var}_item WHERE {filter_sql})"
        ))
    }

    fn render_list_predicate(
        &mut self,
        kind: ListPredicateKind,
        var: &str,
        source: &Expr,
        filter: &Expr,
    ) -> Result<String, SemanticError> {
        let source_sql = self.render(source)?;
        let item_ref = format!("{var}_pred.value");
        let filter_sql = self.render_scoped(var, &item_ref, filter)?;
        let count_sql = format!(
            "(SELECT count(*) FROM json_each({source_sql}) AS {var}_pred WHERE {filter_sql})"
        );
        let total_sql =
            format!("(SELECT count(*) FROM json_each({source_sql}) AS {var}_pred)");
        // Vacuous-truth values for empty lists: ALL/NONE true, ANY/SINGLE
        // false (spec §8 property 6).
        Ok(match kind {
            ListPredicateKind::All => format!("({count_sql} = {total_sql})"),
            ListPredicateKind::Any => format!("({count_sql} > 0)"),
            ListPredicateKind::None => format!("({count_sql} = 0)"),
            ListPredicateKind::Single => format!("({count_sql} = 1)"),
        })
    }

    /// Renders `expr` with `var` bound to `item_ref` wherever it appears as a
    /// bare variable reference. List comprehensions/predicates introduce a
    /// variable scoped only to the filter/map sub-expression, so this walks
    /// the sub-expression substituting occurrences directly rather than
    /// registering a planner-level binding.
    fn render_scoped(&mut self, var: &str, item_ref: &str, expr: &Expr) -> Result<String, SemanticError> {
        let substituted = substitute_variable(expr, var, item_ref);
        self.render(&substituted)
    }

    fn render_slice(
        &mut self,
        base: &Expr,
        lo: &Option<Box<Expr>>,
        hi: &Option<Box<Expr>>,
    ) -> Result<String, SemanticError> {
        let base_sql = self.render(base)?;
        let lo_sql = match lo {
            Some(e) => self.render(e)?,
            None => "0".to_string(),
        };
        let hi_cond = match hi {
            Some(e) => format!("json_each.key < ({})", self.render(e)?),
            None => "1=1".to_string(),
        };
        Ok(format!(
            "(SELECT json_group_array(json_each.value) FROM json_each({base_sql}) WHERE json_each.key >= ({lo_sql}) AND {hi_cond})"
        ))
    }

    fn render_pattern_exists(&mut self, pattern: &crate::ast::PathPattern) -> Result<String, SemanticError> {
        // EXISTS(pattern): correlated existence check against edges/nodes for
        // a single-hop pattern anchored on an already-bound endpoint
        // (spec §4.3.5). Multi-hop EXISTS patterns are out of this crate's
        // scope (full subquery planning is a CALL{} concern, a Non-goal).
        use crate::ast::PatternElement;
        let crate::ast::PatternElement::Chain(links) = &pattern.element else {
            return Err(SemanticError::UnsupportedMerge);
        };
        let link = links.first().ok_or(SemanticError::UnsupportedMerge)?;
        let source_bound = link
            .source
            .variable
            .as_ref()
            .map(|v| self.ctx.is_bound(v))
            .unwrap_or(false);
        let mut conds = Vec::new();
        if source_bound {
            let alias = self.ctx.binding(link.source.variable.as_ref().unwrap())?.alias.clone();
            let col = match link.edge.direction {
                crate::ast::Direction::Left => "target_id",
                _ => "source_id",
            };
            conds.push(format!("e.{col} = {alias}.id"));
        }
        if let Some(t) = &link.target.variable {
            if self.ctx.is_bound(t) {
                let alias = self.ctx.binding(t)?.alias.clone();
                let col = match link.edge.direction {
                    crate::ast::Direction::Left => "source_id",
                    _ => "target_id",
                };
                conds.push(format!("e.{col} = {alias}.id"));
            }
        }
        if let Some(ty) = link.edge.types.first() {
            conds.push(format!("e.type = {}", self.push_param(&Value::Str(ty.clone()))));
        }
        if conds.is_empty() {
            conds.push("1=1".to_string());
        }
        Ok(format!(
            "EXISTS (SELECT 1 FROM edges e WHERE {})",
            conds.join(" AND ")
        ))
    }

    fn render_function_call(
        &mut self,
        name: &str,
        args: &[Expr],
        distinct: bool,
    ) -> Result<String, SemanticError> {
        let lower = name.to_lowercase();
        match lower.as_str() {
            "count" => {
                if args.len() == 1 && matches!(&args[0], Expr::Literal(Value::Str(s)) if s == "*")
                {
                    return Ok("count(*)".to_string());
                }
                let inner = self.render(&args[0])?;
                Ok(if distinct {
                    format!("count(DISTINCT {inner})")
                } else {
                    format!("count({inner})")
                })
            }
            "sum" | "avg" | "min" | "max" => {
                let inner = self.render(&args[0])?;
                Ok(if distinct {
                    format!("{lower}(DISTINCT {inner})")
                } else {
                    format!("{lower}({inner})")
                })
            }
            "collect" => {
                let inner = self.render(&args[0])?;
                Ok(if distinct {
                    format!("(SELECT json_group_array(value) FROM (SELECT DISTINCT {inner} AS value) WHERE value IS NOT NULL)")
                } else {
                    format!("json_group_array({inner}) FILTER (WHERE {inner} IS NOT NULL)")
                })
            }
            "percentilecont" | "percentiledisc" => {
                let inner = self.render(&args[0])?;
                let pct = self.render(&args[1])?;
                let exact = lower == "percentiledisc";
                Ok(percentile_sql(&inner, &pct, exact))
            }
            "range" => self.render_range(args),
            "split" => self.render_split(args),
            "reverse" if args.len() == 1 && looks_like_string(&args[0]) => self.render_reverse(&args[0]),
            "reverse" => {
                let inner = self.render(&args[0])?;
                Ok(format!(
                    "(SELECT json_group_array(value) FROM (SELECT value, row_number() OVER (ORDER BY key DESC) rn FROM json_each({inner})) ORDER BY rn)"
                ))
            }
            "startnode" => {
                let inner = self.render_property_base(&args[0])?;
                let _ = inner;
                self.render_edge_endpoint(&args[0], "source_id")
            }
            "endnode" => self.render_edge_endpoint(&args[0], "target_id"),
            "nodes" | "relationships" | "length" => self.render_path_function(&lower, args),
            other => {
                if let Some(mapping) = functions::lookup(other) {
                    let mut rendered = Vec::new();
                    for a in args {
                        rendered.push(self.render(a)?);
                    }
                    Ok((mapping.sqlite_expr)(&rendered))
                } else {
                    Err(SemanticError::UnknownFunction(name.to_string()))
                }
            }
        }
    }

    fn render_edge_endpoint(&mut self, edge_expr: &Expr, column: &str) -> Result<String, SemanticError> {
        if let Expr::Variable(v) = edge_expr {
            let binding = self.ctx.binding(v)?;
            return Ok(format!(
                "(SELECT json_set(coalesce(n.properties,'{{}}'),'$._nf_id',n.id) FROM nodes n \
                 JOIN edges ee ON ee.id = {}.id WHERE n.id = ee.{column})",
                binding.alias
            ));
        }
        Err(SemanticError::UnknownFunction("startNode/endNode require a bound edge variable".to_string()))
    }

    /// A path bound by `p = (pattern)` renders `length(p)`/`nodes(p)`/
    /// `relationships(p)` one of two ways (spec §4.3.4, SPEC_FULL §3). A path
    /// that is a single variable-length relationship compiles against that
    /// relationship's recursive CTE columns directly (`depth`, `edge_ids`,
    /// `node_ids`); anything else (a fixed-length chain) is known statically
    /// and is rendered from its node/edge alias sequence as a `json_array`.
    fn render_path_function(&mut self, name: &str, args: &[Expr]) -> Result<String, SemanticError> {
        let Expr::Variable(path_var) = &args[0] else {
            return Err(SemanticError::UnknownFunction(format!("{name}() requires a path variable")));
        };
        let binding = self.ctx.binding(path_var)?;
        if binding.kind != VarKind::Path {
            return Err(SemanticError::UnboundVariable(path_var.clone()));
        }
        let path = self
            .ctx
            .path_expressions
            .iter()
            .find(|p| &p.name == path_var)
            .ok_or_else(|| SemanticError::UnboundVariable(path_var.clone()))?;

        if path.edge_aliases.len() == 1 {
            if let Some(cte_name) = self
                .ctx
                .rels
                .iter()
                .find(|r| r.edge_alias == path.edge_aliases[0])
                .and_then(|r| r.vlp_cte_name.as_ref())
            {
                return Ok(match name {
                    "length" => format!("{cte_name}.depth"),
                    "relationships" => format!("{cte_name}.edge_ids"),
                    "nodes" => format!("{cte_name}.node_ids"),
                    _ => unreachable!(),
                });
            }
        }

        match name {
            "length" => Ok(path.edge_aliases.len().to_string()),
            "nodes" => {
                let mut parts = Vec::new();
                for alias in path.node_aliases.clone() {
                    let binding = self.ctx.binding(&alias)?;
                    parts.push(self.render_entity_var(&binding.alias, binding.kind));
                }
                Ok(format!("json_array({})", parts.join(", ")))
            }
            "relationships" => {
                let mut parts = Vec::new();
                for alias in path.edge_aliases.clone() {
                    let binding = self.ctx.binding(&alias)?;
                    parts.push(self.render_entity_var(&binding.alias, binding.kind));
                }
                Ok(format!("json_array({})", parts.join(", ")))
            }
            _ => unreachable!(),
        }
    }

    fn render_range(&mut self, args: &[Expr]) -> Result<String, SemanticError> {
        let start = self.render(&args[0])?;
        let stop = self.render(&args[1])?;
        let step = if args.len() > 2 {
            self.render(&args[2])?
        } else {
            "1".to_string()
        };
        Ok(format!(
            "(WITH RECURSIVE rng(v) AS (SELECT {start} UNION ALL SELECT v + ({step}) FROM rng WHERE v + ({step}) <= ({stop})) SELECT json_group_array(v) FROM rng)"
        ))
    }

    fn render_split(&mut self, args: &[Expr]) -> Result<String, SemanticError> {
        let subject = self.render(&args[0])?;
        let delim = self.render(&args[1])?;
        Ok(format!(
            "(WITH RECURSIVE sp(rest, piece, done) AS ( \
                SELECT ({subject}) || ({delim}), '', 0 \
                UNION ALL \
                SELECT substr(rest, instr(rest, {delim}) + length({delim})), \
                       substr(rest, 1, instr(rest, {delim}) - 1), \
                       CASE WHEN instr(rest, {delim}) = 0 THEN 1 ELSE 0 END \
                FROM sp WHERE done = 0 \
             ) SELECT json_group_array(piece) FROM sp WHERE rest != ({subject}) || ({delim}))"
        ))
    }

    fn render_reverse(&mut self, arg: &Expr) -> Result<String, SemanticError> {
        let s = self.render(arg)?;
        Ok(format!(
            "(WITH RECURSIVE rev(s, pos, acc) AS ( \
                SELECT ({s}), length({s}), '' \
                UNION ALL \
                SELECT s, pos - 1, acc || substr(s, pos, 1) FROM rev WHERE pos > 0 \
             ) SELECT acc FROM rev WHERE pos = 0)"
        ))
    }
}

fn compare_sql_op(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

fn looks_like_list(e: &Expr) -> bool {
    matches!(
        e,
        Expr::ListLiteral(_) | Expr::ListComprehension { .. }
    ) || matches!(e, Expr::FunctionCall { name, .. } if matches!(name.to_lowercase().as_str(), "range" | "keys" | "tail" | "collect" | "labels" | "nodes" | "relationships"))
}

fn might_be_list_at_runtime(e: &Expr) -> bool {
    matches!(e, Expr::Property(..) | Expr::Variable(_) | Expr::Index(..))
}

fn looks_like_string(e: &Expr) -> bool {
    matches!(e, Expr::Literal(Value::Str(_)) | Expr::Property(..) | Expr::Variable(_))
}

fn percentile_sql(inner: &str, pct: &str, exact: bool) -> String {
    if exact {
        format!(
            "(SELECT value FROM (SELECT {inner} AS value, row_number() OVER (ORDER BY {inner}) - 1 AS rn, count(*) OVER () AS total) \
             WHERE rn = CAST(({pct}) * (total - 1) AS INTEGER))"
        )
    } else {
        format!(
            "(SELECT lo.value + (({pct}) * (total - 1) - FLOOR(({pct}) * (total - 1))) * (hi.value - lo.value) FROM \
             (SELECT {inner} AS value, row_number() OVER (ORDER BY {inner}) - 1 AS rn, count(*) OVER () AS total) lo, \
             (SELECT {inner} AS value, row_number() OVER (ORDER BY {inner}) - 1 AS rn FROM (SELECT {inner}) ) hi \
             WHERE lo.rn = CAST(FLOOR(({pct}) * (lo.total - 1)) AS INTEGER) AND hi.rn = CAST(FLOOR(({pct}) * (lo.total - 1)) AS INTEGER) + 1 \
             LIMIT 1)"
        )
    }
}

/// Substitutes bare `Variable(name)` references with a raw column-reference
/// expression (used for list-comprehension/predicate scoping, where the
/// bound variable is a `json_each` row rather than a planner-registered
/// alias).
fn substitute_variable(expr: &Expr, name: &str, replacement: &str) -> Expr {
    let repl = || Expr::Variable(replacement.to_string());
    match expr {
        Expr::Variable(v) if v == name => repl(),
        Expr::Property(base, prop) => Expr::Property(
            Box::new(substitute_variable(base, name, replacement)),
            prop.clone(),
        ),
        Expr::Binary(op, l, r) => Expr::Binary(
            *op,
            Box::new(substitute_variable(l, name, replacement)),
            Box::new(substitute_variable(r, name, replacement)),
        ),
        Expr::Neg(e) => Expr::Neg(Box::new(substitute_variable(e, name, replacement))),
        Expr::Not(e) => Expr::Not(Box::new(substitute_variable(e, name, replacement))),
        Expr::And(l, r) => Expr::And(
            Box::new(substitute_variable(l, name, replacement)),
            Box::new(substitute_variable(r, name, replacement)),
        ),
        Expr::Or(l, r) => Expr::Or(
            Box::new(substitute_variable(l, name, replacement)),
            Box::new(substitute_variable(r, name, replacement)),
        ),
        Expr::Xor(l, r) => Expr::Xor(
            Box::new(substitute_variable(l, name, replacement)),
            Box::new(substitute_variable(r, name, replacement)),
        ),
        Expr::Compare(op, l, r) => Expr::Compare(
            *op,
            Box::new(substitute_variable(l, name, replacement)),
            Box::new(substitute_variable(r, name, replacement)),
        ),
        Expr::IsNull(e, n) => Expr::IsNull(Box::new(substitute_variable(e, name, replacement)), *n),
        Expr::InList(i, l) => Expr::InList(
            Box::new(substitute_variable(i, name, replacement)),
            Box::new(substitute_variable(l, name, replacement)),
        ),
        Expr::StringPredicate {
            kind,
            subject,
            pattern,
        } => Expr::StringPredicate {
            kind: *kind,
            subject: Box::new(substitute_variable(subject, name, replacement)),
            pattern: Box::new(substitute_variable(pattern, name, replacement)),
        },
        Expr::FunctionCall {
            name: fname,
            args,
            distinct,
        } => Expr::FunctionCall {
            name: fname.clone(),
            args: args
                .iter()
                .map(|a| substitute_variable(a, name, replacement))
                .collect(),
            distinct: *distinct,
        },
        Expr::Index(b, i) => Expr::Index(
            Box::new(substitute_variable(b, name, replacement)),
            Box::new(substitute_variable(i, name, replacement)),
        ),
        Expr::Slice(b, lo, hi) => Expr::Slice(
            Box::new(substitute_variable(b, name, replacement)),
            lo.as_ref()
                .map(|e| Box::new(substitute_variable(e, name, replacement))),
            hi.as_ref()
                .map(|e| Box::new(substitute_variable(e, name, replacement))),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanningContext;

    #[test]
    fn inlines_integer_literal() {
        let ctx = PlanningContext::new();
        let params = HashMap::new();
        let mut r = ExprRenderer::new(&ctx, &params);
        let sql = r.render(&Expr::Literal(Value::Int(42))).unwrap();
        assert_eq!(sql, "42");
        assert!(r.params.is_empty());
    }

    #[test]
    fn parameterizes_string_literal() {
        let ctx = PlanningContext::new();
        let params = HashMap::new();
        let mut r = ExprRenderer::new(&ctx, &params);
        let sql = r.render(&Expr::Literal(Value::Str("hi".into()))).unwrap();
        assert_eq!(sql, "?");
        assert_eq!(r.params, vec![SqlParam::Text("hi".into())]);
    }

    #[test]
    fn unbound_variable_is_semantic_error() {
        let ctx = PlanningContext::new();
        let params = HashMap::new();
        let mut r = ExprRenderer::new(&ctx, &params);
        assert!(r.render(&Expr::Variable("n".into())).is_err());
    }

    #[test]
    fn fixed_length_path_renders_static_length() {
        let patterns = match crate::parser::parse("MATCH p = (a)-[r:R]->(b) RETURN p").unwrap() {
            crate::ast::CypherStatement::Query(q) => match &q.parts[0].clauses[0] {
                crate::ast::Clause::Match { patterns, .. } => patterns.clone(),
                _ => panic!(),
            },
            _ => panic!(),
        };
        let mut ctx = PlanningContext::new();
        ctx.register_pattern(&patterns[0], false).unwrap();
        let params = HashMap::new();
        let mut r = ExprRenderer::new(&ctx, &params);
        let call = Expr::FunctionCall {
            name: "length".into(),
            args: vec![Expr::Variable("p".into())],
            distinct: false,
        };
        assert_eq!(r.render(&call).unwrap(), "1");
    }

    #[test]
    fn vlp_path_length_renders_cte_depth_column() {
        let patterns = match crate::parser::parse("MATCH p = (a)-[r:R*1..3]->(b) RETURN p").unwrap() {
            crate::ast::CypherStatement::Query(q) => match &q.parts[0].clauses[0] {
                crate::ast::Clause::Match { patterns, .. } => patterns.clone(),
                _ => panic!(),
            },
            _ => panic!(),
        };
        let mut ctx = PlanningContext::new();
        ctx.register_pattern(&patterns[0], false).unwrap();
        ctx.rels[0].vlp_cte_name = Some("path_1".to_string());
        let params = HashMap::new();
        let mut r = ExprRenderer::new(&ctx, &params);
        let call = Expr::FunctionCall {
            name: "length".into(),
            args: vec![Expr::Variable("p".into())],
            distinct: false,
        };
        assert_eq!(r.render(&call).unwrap(), "path_1.depth");
    }
}
