//! Cypher function name -> SQLite expression registry, grounded in the
//! teacher's `clickhouse_query_generator/function_registry.rs` lazy-static
//! lookup-table-with-argument-transform pattern.

use std::collections::HashMap;

/// Takes already-rendered SQL argument fragments, returns the full rendered
/// SQL expression.
pub type ArgTransform = fn(&[String]) -> String;

#[derive(Clone, Copy)]
pub struct FunctionMapping {
    pub sqlite_expr: ArgTransform,
}

lazy_static::lazy_static! {
    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m: HashMap<&'static str, FunctionMapping> = HashMap::new();

        // ===== strings =====
        m.insert("toupper", FunctionMapping { sqlite_expr: |a| format!("upper({})", a[0]) });
        m.insert("tolower", FunctionMapping { sqlite_expr: |a| format!("lower({})", a[0]) });
        m.insert("trim", FunctionMapping { sqlite_expr: |a| format!("trim({})", a[0]) });
        m.insert("ltrim", FunctionMapping { sqlite_expr: |a| format!("ltrim({})", a[0]) });
        m.insert("rtrim", FunctionMapping { sqlite_expr: |a| format!("rtrim({})", a[0]) });
        // Cypher substring() is 0-based; offset by +1 for SQLite's 1-based substr (spec §4.3.5).
        m.insert("substring", FunctionMapping { sqlite_expr: |a| {
            if a.len() >= 3 {
                format!("substr({}, ({}) + 1, {})", a[0], a[1], a[2])
            } else {
                format!("substr({}, ({}) + 1)", a[0], a[1])
            }
        }});
        m.insert("replace", FunctionMapping { sqlite_expr: |a| format!("replace({}, {}, {})", a[0], a[1], a[2]) });
        m.insert("left", FunctionMapping { sqlite_expr: |a| format!("substr({}, 1, {})", a[0], a[1]) });
        m.insert("right", FunctionMapping { sqlite_expr: |a| format!("substr({}, -({}))", a[0], a[1]) });
        m.insert("tostring", FunctionMapping { sqlite_expr: |a| format!("cast({} as text)", a[0]) });
        m.insert("tointeger", FunctionMapping { sqlite_expr: |a| format!("cast({} as integer)", a[0]) });
        m.insert("tofloat", FunctionMapping { sqlite_expr: |a| format!("cast({} as real)", a[0]) });
        m.insert("toboolean", FunctionMapping { sqlite_expr: |a| {
            format!(
                "(CASE WHEN {a} IS NULL THEN NULL WHEN lower(cast({a} as text)) = 'true' THEN 1 WHEN lower(cast({a} as text)) = 'false' THEN 0 ELSE NULL END)",
                a = a[0]
            )
        }});
        m.insert("coalesce", FunctionMapping { sqlite_expr: |a| format!("coalesce({})", a.join(", ")) });

        // ===== collections =====
        m.insert("size", FunctionMapping { sqlite_expr: |a| format!("(SELECT count(*) FROM json_each({}))", a[0]) });
        m.insert("head", FunctionMapping { sqlite_expr: |a| format!("json_extract({}, '$[0]')", a[0]) });
        m.insert("last", FunctionMapping { sqlite_expr: |a| format!("json_extract({}, '$[#-1]')", a[0]) });
        m.insert("tail", FunctionMapping { sqlite_expr: |a| format!("json_remove({}, '$[0]')", a[0]) });
        m.insert("keys", FunctionMapping { sqlite_expr: |a| {
            format!("(SELECT json_group_array(key) FROM json_each({}))", a[0])
        }});

        // ===== graph accessors (supplemented, spec §3/§4.3.5 + SPEC_FULL §3) =====
        m.insert("id", FunctionMapping { sqlite_expr: |a| format!("json_extract({}, '$._nf_id')", a[0]) });
        m.insert("type", FunctionMapping { sqlite_expr: |a| format!("json_extract({}, '$._nf_type')", a[0]) });
        m.insert("labels", FunctionMapping { sqlite_expr: |a| format!("json_extract({}, '$._nf_label')", a[0]) });
        m.insert("properties", FunctionMapping { sqlite_expr: |a| {
            format!("json_remove({}, '$._nf_id', '$._nf_type', '$._nf_label')", a[0])
        }});

        m
    };
}

pub fn lookup(name: &str) -> Option<FunctionMapping> {
    FUNCTION_MAPPINGS.get(name.to_lowercase().as_str()).copied()
}

/// Aggregate functions need special SQL-shape handling (percentile/collect)
/// rather than a plain name substitution; this set is consulted by the
/// expression renderer to decide whether a FunctionCall participates in
/// implicit GROUP BY (spec §4.3.3).
pub const AGGREGATE_FUNCTIONS: &[&str] = &[
    "count", "sum", "avg", "min", "max", "collect", "percentiledisc", "percentilecont",
];

pub fn is_aggregate(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(&name.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn substring_offsets_by_one() {
        let m = lookup("substring").unwrap();
        assert_eq!(
            (m.sqlite_expr)(&["x".into(), "0".into(), "2".into()]),
            "substr(x, (0) + 1, 2)"
        );
    }

    #[test]
    fn unknown_function_is_not_registered() {
        assert!(lookup("definitelyNotAFunction").is_none());
    }

    #[test_case("toUpper", true; "mixed case")]
    #[test_case("TOLOWER", true; "shouting case")]
    #[test_case("count", true; "aggregate is also a registry lookup target")]
    #[test_case("notAFunction", false; "unknown name")]
    fn lookup_is_case_insensitive(name: &str, should_resolve: bool) {
        assert_eq!(lookup(name).is_some() || is_aggregate(name), should_resolve);
    }

    #[test_case("count"; "count")]
    #[test_case("sum"; "sum")]
    #[test_case("avg"; "avg")]
    #[test_case("collect"; "collect")]
    fn known_aggregates_are_recognized_case_insensitively(name: &str) {
        assert!(is_aggregate(name));
        assert!(is_aggregate(&name.to_uppercase()));
    }
}
