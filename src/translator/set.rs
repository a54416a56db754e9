//! SET lowering (spec §4.3.1): per-variable property/label mutation against
//! an already-bound row. Each `SetItem` becomes one `UPDATE ... WHERE id = ?`
//! statement; the executor supplies the bound variable's current id for the
//! row being mutated. The teacher has no write path to ground this on
//! directly; follows the same collect-then-lower shape as `create.rs`,
//! re-targeted at JSON1's `json_set`/`json_patch`.

use std::collections::HashMap;

use crate::ast::{SetItem, Value};
use crate::error::{CypherError, SemanticError};
use crate::planner::{PlanningContext, VarKind};
use crate::value::value_to_sql_param;

use super::expr::ExprRenderer;
use super::{SqlParam, Statement};

pub fn build_set(
    items: &[SetItem],
    entity_ids: &HashMap<String, String>,
    ctx: &PlanningContext,
    query_params: &HashMap<String, Value>,
) -> Result<Vec<Statement>, CypherError> {
    let mut statements = Vec::new();
    for item in items {
        statements.push(build_one(item, entity_ids, ctx, query_params)?);
    }
    Ok(statements)
}

fn table_for(ctx: &PlanningContext, var: &str) -> Result<&'static str, CypherError> {
    let binding = ctx.binding(var)?;
    Ok(match binding.kind {
        VarKind::Edge | VarKind::VariableLengthEdge => "edges",
        _ => "nodes",
    })
}

fn id_param(entity_ids: &HashMap<String, String>, var: &str) -> SqlParam {
    SqlParam::Text(entity_ids.get(var).cloned().unwrap_or_default())
}

fn build_one(
    item: &SetItem,
    entity_ids: &HashMap<String, String>,
    ctx: &PlanningContext,
    query_params: &HashMap<String, Value>,
) -> Result<Statement, CypherError> {
    match item {
        SetItem::SetProperty(var, prop, expr) => {
            let table = table_for(ctx, var)?;
            let mut r = ExprRenderer::new(ctx, query_params);
            let rendered = r.render(expr)?;
            let mut params = r.params;
            params.push(id_param(entity_ids, var));
            Ok(Statement::new(
                format!(
                    "UPDATE {table} SET properties = json_set(coalesce(properties,'{{}}'), '$.{prop}', {rendered}) WHERE id = ?"
                ),
                params,
            ))
        }
        SetItem::ReplaceProperties(var, expr) => {
            let table = table_for(ctx, var)?;
            let mut r = ExprRenderer::new(ctx, query_params);
            let rendered = r.render(expr)?;
            let mut params = r.params;
            params.push(id_param(entity_ids, var));
            Ok(Statement::new(
                format!("UPDATE {table} SET properties = {rendered} WHERE id = ?"),
                params,
            ))
        }
        SetItem::MergeProperties(var, expr) => {
            let table = table_for(ctx, var)?;
            let mut r = ExprRenderer::new(ctx, query_params);
            let rendered = r.render(expr)?;
            let mut params = r.params;
            params.push(id_param(entity_ids, var));
            Ok(Statement::new(
                format!(
                    "UPDATE {table} SET properties = json_patch(coalesce(properties,'{{}}'), {rendered}) WHERE id = ?"
                ),
                params,
            ))
        }
        SetItem::AddLabels(var, labels) => {
            let table = table_for(ctx, var)?;
            if table != "nodes" {
                return Err(CypherError::from(SemanticError::InvalidDeleteTarget(
                    "labels can only be added to nodes".to_string(),
                )));
            }
            let label_json = serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string());
            let params = vec![
                SqlParam::Text(label_json),
                id_param(entity_ids, var),
            ];
            Ok(Statement::new(
                "UPDATE nodes SET label = (SELECT json_group_array(value) FROM \
                 (SELECT DISTINCT value FROM (SELECT value FROM json_each(label) UNION ALL SELECT value FROM json_each(?)))) \
                 WHERE id = ?"
                    .to_string(),
                params,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::planner::{RegisteredNode, VarBinding};

    fn ctx_with_node(var: &str) -> PlanningContext {
        let mut ctx = PlanningContext::new();
        ctx.nodes.push(RegisteredNode {
            alias: var.to_string(),
            labels: vec![],
            properties: None,
            optional: false,
            is_new: false,
            bound_id: None,
        });
        ctx.vars.insert(
            var.to_string(),
            VarBinding {
                kind: VarKind::Node,
                alias: var.to_string(),
                path_cte_name: None,
            },
        );
        ctx
    }

    #[test]
    fn set_property_uses_json_set() {
        let ctx = ctx_with_node("n");
        let mut ids = HashMap::new();
        ids.insert("n".to_string(), "id-1".to_string());
        let items = vec![SetItem::SetProperty("n".into(), "age".into(), Expr::Literal(Value::Int(5)))];
        let stmts = build_set(&items, &ids, &ctx, &HashMap::new()).unwrap();
        assert!(stmts[0].sql.contains("json_set"));
        assert_eq!(stmts[0].sql.starts_with("UPDATE nodes"), true);
    }
}
