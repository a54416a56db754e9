//! Variable-length relationship lowering (spec §4.3.4): each `*min..max` hop
//! range compiles to its own `WITH RECURSIVE` CTE with edge-uniqueness
//! enforced via a `json_each`/`NOT EXISTS` membership check against the
//! accumulated edge-id array, grounded in the teacher's
//! `variable_length_cte.rs` recursive-traversal generator.

use crate::ast::{Direction, ShortestPathMode};
use crate::planner::RegisteredRel;
use crate::value::value_to_sql_param;
use crate::ast::Value;

use super::SqlParam;

/// Applied to an unbounded `*` or `*min..` pattern with no upper bound. The
/// teacher's own generator started at 10 and was later tightened to 5 for
/// memory safety; this crate picks 15 as a middle ground generous enough for
/// realistic graphs while still bounding recursion (recorded as an Open
/// Question decision).
pub const DEFAULT_MAX_HOPS: u32 = 15;

pub struct VlpCte {
    pub name: String,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Builds the recursive CTE for one variable-length relationship. `cte_name`
/// is pre-assigned by the caller (planner `fresh_cte_name`) so joins
/// elsewhere in the statement can reference it before this function runs.
pub fn build_vlp_cte(rel: &RegisteredRel, cte_name: &str) -> VlpCte {
    let hop = rel.hop_range.expect("vlp requires a hop_range");
    let min_hops = hop.min.max(1);
    let max_hops = hop.max.unwrap_or(DEFAULT_MAX_HOPS);

    let mut params = Vec::new();
    let type_filter = if rel.types.is_empty() {
        String::new()
    } else if rel.types.len() == 1 {
        params.push(value_to_sql_param(&Value::Str(rel.types[0].clone())));
        " AND e.type = ?".to_string()
    } else {
        let placeholders = rel.types.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        for t in &rel.types {
            params.push(value_to_sql_param(&Value::Str(t.clone())));
        }
        format!(" AND e.type IN ({placeholders})")
    };

    // Undirected traversal doubles each edge as both (source,target) and
    // (target,source) rows before recursing, so the rest of the CTE can
    // treat it like a directed forward walk.
    let base_pairs = match rel.direction {
        Direction::Right => "SELECT e.id AS edge_id, e.source_id AS start_id, e.target_id AS end_id FROM edges e".to_string(),
        Direction::Left => "SELECT e.id AS edge_id, e.target_id AS start_id, e.source_id AS end_id FROM edges e".to_string(),
        Direction::Either => "SELECT e.id AS edge_id, e.source_id AS start_id, e.target_id AS end_id FROM edges e \
             UNION ALL SELECT e.id AS edge_id, e.target_id AS start_id, e.source_id AS end_id FROM edges e".to_string(),
    };

    // `node_ids` tracks the visited node sequence alongside `edge_ids`, used
    // only by `nodes(p)` rendering over a variable-length path (SPEC_FULL §3);
    // it rides along even when unused since no caller reads unreferenced CTE
    // columns.
    let raw_name = format!("{cte_name}_raw");
    let raw_sql = format!(
        "{raw_name}(start_id, end_id, depth, edge_ids, node_ids) AS ( \
            SELECT start_id, end_id, 1, json_array(edge_id), json_array(start_id, end_id) FROM ({base_pairs}) base WHERE 1=1{type_filter} \
            UNION ALL \
            SELECT p.start_id, next.end_id, p.depth + 1, json_insert(p.edge_ids, '$[#]', next.edge_id), \
                   json_insert(p.node_ids, '$[#]', next.end_id) \
            FROM {raw_name} p JOIN ({base_pairs}) next ON next.start_id = p.end_id AND 1=1{type_filter} \
            WHERE p.depth < {max_hops} \
              AND NOT EXISTS (SELECT 1 FROM json_each(p.edge_ids) WHERE json_each.value = next.edge_id) \
        )"
    );

    // Params appear twice (base case, recursive case) in the SQL text above.
    let mut all_params = params.clone();
    all_params.extend(params);

    let bounded_sql = format!(
        "WITH RECURSIVE {raw_sql} SELECT start_id, end_id, depth, edge_ids, node_ids FROM {raw_name} WHERE depth >= {min_hops}"
    );

    // `shortestPath()`/`allShortestPaths()` restrict the candidate set to the
    // minimum-depth path(s) per (start_id, end_id) pair (SPEC_FULL §3).
    // SQLite's bare-column GROUP BY extension returns the row associated with
    // the winning `min(depth)` for each group, which is exactly "a shortest
    // path" for `shortestPath()`; `allShortestPaths()` instead keeps every row
    // tied for that minimum, found via a `min() OVER (PARTITION BY ...)`
    // window so the recursive CTE only has to be evaluated once.
    let full_sql = match rel.shortest {
        None => bounded_sql,
        Some(ShortestPathMode::Shortest) => format!(
            "SELECT start_id, end_id, min(depth) AS depth, edge_ids, node_ids FROM ({bounded_sql}) bounded \
             GROUP BY start_id, end_id"
        ),
        Some(ShortestPathMode::AllShortest) => format!(
            "SELECT start_id, end_id, depth, edge_ids, node_ids FROM ( \
                SELECT start_id, end_id, depth, edge_ids, node_ids, \
                       min(depth) OVER (PARTITION BY start_id, end_id) AS min_depth \
                FROM ({bounded_sql}) bounded \
             ) ranked WHERE depth = min_depth"
        ),
    };

    VlpCte {
        name: cte_name.to_string(),
        sql: full_sql,
        params: all_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::HopRange;
    use crate::planner::RegisteredRel;

    fn rel(min: u32, max: Option<u32>, dir: Direction) -> RegisteredRel {
        RegisteredRel {
            source_alias: "a".into(),
            target_alias: "b".into(),
            edge_alias: "__e1".into(),
            types: vec!["KNOWS".into()],
            properties: None,
            direction: dir,
            hop_range: Some(HopRange { min, max }),
            optional: false,
            source_is_new: false,
            target_is_new: false,
            edge_is_new: false,
            vlp_cte_name: None,
            shortest: None,
            bound_id: None,
        }
    }

    #[test]
    fn bounded_range_uses_explicit_max() {
        let r = rel(1, Some(3), Direction::Right);
        let cte = build_vlp_cte(&r, "path_1");
        assert!(cte.sql.contains("depth < 3"));
        assert!(cte.sql.contains("depth >= 1"));
    }

    #[test]
    fn unbounded_range_uses_default_cap() {
        let r = rel(2, None, Direction::Right);
        let cte = build_vlp_cte(&r, "path_1");
        assert!(cte.sql.contains(&format!("depth < {DEFAULT_MAX_HOPS}")));
    }

    #[test]
    fn undirected_doubles_base_pairs() {
        let r = rel(1, Some(2), Direction::Either);
        let cte = build_vlp_cte(&r, "path_1");
        assert_eq!(cte.sql.matches("UNION ALL SELECT e.id AS edge_id, e.target_id").count(), 2);
    }

    #[test]
    fn shortest_path_groups_to_minimum_depth() {
        let mut r = rel(1, Some(5), Direction::Right);
        r.shortest = Some(ShortestPathMode::Shortest);
        let cte = build_vlp_cte(&r, "path_1");
        assert!(cte.sql.contains("min(depth) AS depth"));
        assert!(cte.sql.contains("GROUP BY start_id, end_id"));
    }

    #[test]
    fn all_shortest_paths_keeps_every_tied_row() {
        let mut r = rel(1, Some(5), Direction::Right);
        r.shortest = Some(ShortestPathMode::AllShortest);
        let cte = build_vlp_cte(&r, "path_1");
        assert!(cte.sql.contains("min(depth) OVER (PARTITION BY start_id, end_id)"));
    }
}
