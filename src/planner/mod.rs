//! Planning context (spec §3 "Planning context", design note §9): a single
//! mutable struct threaded explicitly through every `translate_*` entry
//! point. All "global" state the teacher keeps as registered-pattern
//! dictionaries, optional-where buffers, counters, and a WITH/UNWIND/CALL
//! stack becomes explicit fields here rather than thread-locals.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::SemanticError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Node,
    Edge,
    VariableLengthEdge,
    Path,
    Scalar,
}

#[derive(Debug, Clone)]
pub struct VarBinding {
    pub kind: VarKind,
    /// SQL table alias (or synthetic identifier for scalars/paths). Cypher
    /// variable names are identifier-shaped by construction (the tokenizer
    /// only ever produces them from identifier tokens), so they double
    /// directly as SQL aliases (design note §9).
    pub alias: String,
    pub path_cte_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisteredNode {
    pub alias: String,
    pub labels: Vec<String>,
    pub properties: Option<Vec<(String, Expr)>>,
    pub optional: bool,
    pub is_new: bool,
    /// Database id of an already-bound entity carried across a WITH boundary
    /// under this alias (spec §3 "WITH stack"). When set, the alias is
    /// anchored to that exact row instead of re-matching by pattern alone.
    pub bound_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisteredRel {
    pub source_alias: String,
    pub target_alias: String,
    pub edge_alias: String,
    pub types: Vec<String>,
    pub properties: Option<Vec<(String, Expr)>>,
    pub direction: Direction,
    pub hop_range: Option<HopRange>,
    pub optional: bool,
    pub source_is_new: bool,
    pub target_is_new: bool,
    pub edge_is_new: bool,
    pub vlp_cte_name: Option<String>,
    /// Set when this relationship came from inside a `shortestPath()` /
    /// `allShortestPaths()` wrapper; restricts the variable-length CTE to the
    /// minimum-depth path(s) per endpoint pair (SPEC_FULL §3).
    pub shortest: Option<ShortestPathMode>,
    /// Database id of an already-bound edge carried across a WITH boundary
    /// under this alias, mirroring `RegisteredNode::bound_id`.
    pub bound_id: Option<String>,
}

/// Extracts the database id from a carried value shaped like a materialized
/// node/edge (`{id, labels|type, properties}`, see `row_shaping::shape_entity`),
/// or `None` if `value` isn't an entity.
fn entity_bound_id(value: &Value) -> Option<String> {
    if let Value::Map(entries) = value {
        let is_entity = entries.iter().any(|(k, _)| k == "labels" || k == "type");
        if !is_entity {
            return None;
        }
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

/// A path variable's component aliases, in pattern order, used to render
/// `length(p)`/`nodes(p)`/`relationships(p)` (spec §4.3.5).
#[derive(Debug, Clone)]
pub struct PathExpression {
    pub name: String,
    pub node_aliases: Vec<String>,
    pub edge_aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegisteredCall {
    pub procedure: String,
    pub yield_alias: Option<String>,
    pub where_: Option<Expr>,
}

#[derive(Default)]
pub struct PlanningContext {
    pub nodes: Vec<RegisteredNode>,
    pub rels: Vec<RegisteredRel>,
    pub vars: HashMap<String, VarBinding>,
    pub where_required: Vec<Expr>,
    /// (the optional endpoint's alias, the condition) — rendered as
    /// `(alias.id IS NULL OR condition)` so an unmatched optional side
    /// doesn't eliminate the row (spec §4.3.1 MATCH/OPTIONAL MATCH).
    pub where_optional: Vec<(String, Expr)>,
    pub unwind_stack: Vec<(String, Expr)>,
    pub calls: Vec<RegisteredCall>,
    /// Row carried forward from the previous WITH boundary (spec §3), keyed
    /// by the alias it was projected under. Consulted by `register_node`/
    /// `register_relationship_inner` to anchor a re-declared alias to the
    /// entity it was already bound to, and by the expression renderer as a
    /// fallback for bare variable resolution.
    pub carried: HashMap<String, Value>,
    /// Path variables bound by `p = (pattern)`, keyed for `length()`/`nodes()`/
    /// `relationships()` rendering (spec §3, SPEC_FULL §3).
    pub path_expressions: Vec<PathExpression>,
    pub alias_counter: usize,
    pub cte_counter: usize,
}

impl PlanningContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_cte_name(&mut self) -> String {
        self.cte_counter += 1;
        format!("path_{}", self.cte_counter)
    }

    pub fn fresh_alias(&mut self, hint: &str) -> String {
        self.alias_counter += 1;
        format!("__{hint}{}", self.alias_counter)
    }

    pub fn is_bound(&self, var: &str) -> bool {
        self.vars.contains_key(var)
    }

    pub fn binding(&self, var: &str) -> Result<&VarBinding, SemanticError> {
        self.vars
            .get(var)
            .ok_or_else(|| SemanticError::UnboundVariable(var.to_string()))
    }

    fn node_mut(&mut self, alias: &str) -> Option<&mut RegisteredNode> {
        self.nodes.iter_mut().find(|n| n.alias == alias)
    }

    pub fn node(&self, alias: &str) -> Option<&RegisteredNode> {
        self.nodes.iter().find(|n| n.alias == alias)
    }

    /// Register (or merge into) a node pattern. Returns the alias actually
    /// used (the pattern's own variable, or a freshly synthesized one for an
    /// anonymous node that still needs a join target).
    pub fn register_node(
        &mut self,
        pattern: &NodePattern,
        optional: bool,
    ) -> Result<String, SemanticError> {
        let alias = match &pattern.variable {
            Some(v) => v.clone(),
            None => self.fresh_alias("n"),
        };

        if let Some(existing) = self.node_mut(&alias) {
            if !pattern.labels.is_empty() && !existing.labels.is_empty()
                && existing.labels != pattern.labels
            {
                return Err(SemanticError::ConflictingRebind(alias));
            }
            for l in &pattern.labels {
                if !existing.labels.contains(l) {
                    existing.labels.push(l.clone());
                }
            }
            existing.optional = existing.optional && optional;
            return Ok(alias);
        }

        let bound_id = self.carried.get(&alias).and_then(entity_bound_id);
        self.nodes.push(RegisteredNode {
            alias: alias.clone(),
            labels: pattern.labels.clone(),
            properties: pattern.properties.clone(),
            optional,
            is_new: false,
            bound_id,
        });
        self.vars.insert(
            alias.clone(),
            VarBinding {
                kind: VarKind::Node,
                alias: alias.clone(),
                path_cte_name: None,
            },
        );
        Ok(alias)
    }

    pub fn register_relationship(
        &mut self,
        link: &RelationshipPattern,
        optional: bool,
    ) -> Result<String, SemanticError> {
        self.register_relationship_inner(link, optional, None)
    }

    fn register_relationship_inner(
        &mut self,
        link: &RelationshipPattern,
        optional: bool,
        shortest: Option<ShortestPathMode>,
    ) -> Result<String, SemanticError> {
        let source_alias = self.register_node(&link.source, optional)?;
        let target_alias = self.register_node(&link.target, optional)?;
        let edge_alias = match &link.edge.variable {
            Some(v) => v.clone(),
            None => self.fresh_alias("e"),
        };
        let is_vlp = link.edge.hop_range.is_some();
        self.vars.insert(
            edge_alias.clone(),
            VarBinding {
                kind: if is_vlp {
                    VarKind::VariableLengthEdge
                } else {
                    VarKind::Edge
                },
                alias: edge_alias.clone(),
                path_cte_name: None,
            },
        );
        let bound_id = self.carried.get(&edge_alias).and_then(entity_bound_id);
        self.rels.push(RegisteredRel {
            source_alias,
            target_alias,
            edge_alias: edge_alias.clone(),
            types: link.edge.types.clone(),
            properties: link.edge.properties.clone(),
            direction: link.edge.direction,
            hop_range: link.edge.hop_range,
            optional,
            source_is_new: false,
            target_is_new: false,
            edge_is_new: false,
            vlp_cte_name: None,
            shortest,
            bound_id,
        });
        Ok(edge_alias)
    }

    pub fn register_pattern(
        &mut self,
        path: &PathPattern,
        optional: bool,
    ) -> Result<(), SemanticError> {
        let shortest_mode = shortest_mode_of(&path.element);
        let mut node_sequence = Vec::new();
        let mut edge_sequence = Vec::new();
        match unwrap_shortest(&path.element) {
            PatternElement::Node(n) => {
                let alias = self.register_node(n, optional)?;
                node_sequence.push(alias);
            }
            PatternElement::Chain(links) => {
                for (i, link) in links.iter().enumerate() {
                    if i == 0 {
                        let source_alias = self.register_node(&link.source, optional)?;
                        node_sequence.push(source_alias);
                    }
                    let edge_alias =
                        self.register_relationship_inner(link, optional, shortest_mode.clone())?;
                    edge_sequence.push(edge_alias);
                    node_sequence.push(link.target.variable.clone().unwrap_or_default());
                }
            }
            PatternElement::ShortestPath(..) => unreachable!("unwrapped above"),
        }
        if let Some(name) = &path.path_variable {
            self.path_expressions.push(PathExpression {
                name: name.clone(),
                node_aliases: node_sequence,
                edge_aliases: edge_sequence,
            });
            self.vars.insert(
                name.clone(),
                VarBinding {
                    kind: VarKind::Path,
                    alias: name.clone(),
                    path_cte_name: None,
                },
            );
        }
        Ok(())
    }
}

fn unwrap_shortest(element: &PatternElement) -> &PatternElement {
    match element {
        PatternElement::ShortestPath(_, inner) => unwrap_shortest(inner),
        other => other,
    }
}

fn shortest_mode_of(element: &PatternElement) -> Option<ShortestPathMode> {
    match element {
        PatternElement::ShortestPath(mode, _) => Some(mode.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::CypherStatement;

    fn first_match_patterns(src: &str) -> Vec<PathPattern> {
        match crate::parser::parse(src).unwrap() {
            CypherStatement::Query(q) => match &q.parts[0].clauses[0] {
                Clause::Match { patterns, .. } => patterns.clone(),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn registers_chain_and_shares_intermediate_alias() {
        let patterns = first_match_patterns("MATCH (a)-[:R]->(b)-[:S]->(c) RETURN a");
        let mut ctx = PlanningContext::new();
        ctx.register_pattern(&patterns[0], false).unwrap();
        assert_eq!(ctx.nodes.len(), 3);
        assert_eq!(ctx.rels.len(), 2);
        assert_eq!(ctx.rels[0].target_alias, ctx.rels[1].source_alias);
    }

    #[test]
    fn conflicting_relabel_is_semantic_error() {
        let patterns = first_match_patterns("MATCH (a:User), (a:Post) RETURN a");
        let mut ctx = PlanningContext::new();
        ctx.register_pattern(&patterns[0], false).unwrap();
        let err = ctx.register_pattern(&patterns[1], false).unwrap_err();
        assert_eq!(err, SemanticError::ConflictingRebind("a".to_string()));
    }

    #[test]
    fn register_node_anchors_to_carried_entity_id() {
        let patterns = first_match_patterns("MATCH (a:User) RETURN a");
        let mut ctx = PlanningContext::new();
        ctx.carried.insert(
            "a".to_string(),
            Value::Map(vec![
                ("id".to_string(), Value::Str("user-42".to_string())),
                ("labels".to_string(), Value::Str("User".to_string())),
                ("properties".to_string(), Value::Map(vec![])),
            ]),
        );
        ctx.register_pattern(&patterns[0], false).unwrap();
        assert_eq!(ctx.node("a").unwrap().bound_id, Some("user-42".to_string()));
    }

    #[test]
    fn register_node_without_carried_entity_has_no_bound_id() {
        let patterns = first_match_patterns("MATCH (a:User) RETURN a");
        let mut ctx = PlanningContext::new();
        ctx.register_pattern(&patterns[0], false).unwrap();
        assert_eq!(ctx.node("a").unwrap().bound_id, None);
    }

    #[test]
    fn path_variable_records_node_and_edge_alias_sequence() {
        let patterns = first_match_patterns("MATCH p = (a)-[r:R]->(b) RETURN p");
        let mut ctx = PlanningContext::new();
        ctx.register_pattern(&patterns[0], false).unwrap();
        assert_eq!(ctx.path_expressions.len(), 1);
        let p = &ctx.path_expressions[0];
        assert_eq!(p.name, "p");
        assert_eq!(p.node_aliases, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(p.edge_aliases, vec!["r".to_string()]);
    }
}
