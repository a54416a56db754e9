//! End-to-end scenarios from spec §8, run against a fresh in-memory store
//! per test via the public `graphcypher::run` entry point.

use std::collections::HashMap;

use graphcypher::{run, SqliteStore, Value};

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

fn no_params() -> HashMap<String, Value> {
    HashMap::new()
}

#[test]
fn scenario_a_create_and_return_follows_edge() {
    let db = store();
    let result = run(
        "CREATE (a:User {name:'Alice'})-[:FOLLOWS]->(b:User {name:'Bob'}) RETURN a.name, b.name",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Str("Alice".to_string()));
    assert_eq!(result.rows[0][1], Value::Str("Bob".to_string()));

    let nodes = run("MATCH (n) RETURN count(n) AS c", &no_params(), &db).unwrap();
    assert_eq!(nodes.rows[0][0], Value::Int(2));
    let edges = run("MATCH (:User)-[r:FOLLOWS]->(:User) RETURN count(r) AS c", &no_params(), &db).unwrap();
    assert_eq!(edges.rows[0][0], Value::Int(1));
}

#[test]
fn scenario_b_variable_length_follows_has_no_duplicates() {
    let db = store();
    run(
        "CREATE (a:User {name:'Alice'})-[:FOLLOWS]->(b:User {name:'Bob'})",
        &no_params(),
        &db,
    )
    .unwrap();
    let result = run(
        "MATCH (u:User)-[:FOLLOWS*1..3]->(v:User) RETURN u.name, v.name ORDER BY u.name, v.name",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Str("Alice".to_string()));
    assert_eq!(result.rows[0][1], Value::Str("Bob".to_string()));
}

#[test]
fn scenario_c_unwind_filter_collect() {
    let db = store();
    let result = run(
        "UNWIND [1,2,3,4] AS x WITH x WHERE x % 2 = 0 RETURN collect(x) AS xs",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(
        result.rows[0][0],
        Value::List(vec![Value::Int(2), Value::Int(4)])
    );
}

#[test]
fn scenario_d_optional_match_on_empty_and_single_node_graph() {
    let db = store();
    let empty = run(
        "MATCH (n) OPTIONAL MATCH (n)-[:KNOWS]->(m) RETURN n, m",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(empty.rows.len(), 0);

    run("CREATE (:X)", &no_params(), &db).unwrap();
    let result = run(
        "MATCH (n) OPTIONAL MATCH (n)-[:KNOWS]->(m) RETURN n, m",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][1], Value::Null);
}

#[test]
fn scenario_e_merge_is_idempotent_with_on_create_and_on_match() {
    let db = store();
    let mut params = HashMap::new();
    params.insert("t".to_string(), Value::Str("rust".to_string()));

    for _ in 0..3 {
        run(
            "MERGE (n:Tag {name:$t}) ON CREATE SET n.created = 1 ON MATCH SET n.seen = coalesce(n.seen,0) + 1",
            &params,
            &db,
        )
        .unwrap();
    }

    let count = run("MATCH (n:Tag) RETURN count(n) AS c", &no_params(), &db).unwrap();
    assert_eq!(count.rows[0][0], Value::Int(1));

    let tag = run(
        "MATCH (n:Tag {name:$t}) RETURN n.created, n.seen",
        &params,
        &db,
    )
    .unwrap();
    assert_eq!(tag.rows[0][0], Value::Int(1));
    assert_eq!(tag.rows[0][1], Value::Int(2));
}

#[test]
fn scenario_f_with_boundary_reexecutes_match_after_create() {
    let db = store();
    run(
        "CREATE (:User {name:'Alice'}), (:User {name:'Bob'})",
        &no_params(),
        &db,
    )
    .unwrap();

    let cypher = "MATCH (a:User {name:'Alice'}), (b:User {name:'Bob'}) \
                  CREATE (a)-[:LIKES {since: 2024}]->(b) \
                  WITH a, b MATCH (a)-[r:LIKES]->(b) RETURN r.since";

    let first = run(cypher, &no_params(), &db).unwrap();
    assert_eq!(first.rows.len(), 1);
    assert_eq!(first.rows[0][0], Value::Int(2024));

    let second = run(cypher, &no_params(), &db).unwrap();
    assert_eq!(second.rows.len(), 2);
}

#[test]
fn detach_delete_removes_incident_edges() {
    let db = store();
    run(
        "CREATE (a:User {name:'Alice'})-[:FOLLOWS]->(b:User {name:'Bob'})",
        &no_params(),
        &db,
    )
    .unwrap();
    run("MATCH (a:User {name:'Alice'}) DETACH DELETE a", &no_params(), &db).unwrap();

    let nodes = run("MATCH (n) RETURN count(n) AS c", &no_params(), &db).unwrap();
    assert_eq!(nodes.rows[0][0], Value::Int(1));
    let edges = run("MATCH ()-[r]->() RETURN count(r) AS c", &no_params(), &db).unwrap();
    assert_eq!(edges.rows[0][0], Value::Int(0));
}

#[test]
fn plain_delete_on_node_with_edges_fails() {
    let db = store();
    run(
        "CREATE (a:User {name:'Alice'})-[:FOLLOWS]->(b:User {name:'Bob'})",
        &no_params(),
        &db,
    )
    .unwrap();
    let err = run("MATCH (a:User {name:'Alice'}) DELETE a", &no_params(), &db).unwrap_err();
    assert!(matches!(err, graphcypher::CypherError::Invariant(_)));
}

#[test]
fn union_deduplicates_full_rows_while_union_all_preserves_multiplicity() {
    let db = store();
    run("CREATE (:User {name:'Alice'})", &no_params(), &db).unwrap();

    let union = run(
        "MATCH (n:User) RETURN n.name AS name \
         UNION \
         MATCH (n:User) RETURN n.name AS name",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(union.rows.len(), 1);

    let union_all = run(
        "MATCH (n:User) RETURN n.name AS name \
         UNION ALL \
         MATCH (n:User) RETURN n.name AS name",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(union_all.rows.len(), 2);
}

#[test]
fn list_predicate_identities_hold_for_empty_lists() {
    let db = store();
    let result = run(
        "UNWIND [[]] AS xs \
         RETURN all(v IN xs WHERE v > 0) AS a, none(v IN xs WHERE v > 0) AS n, \
                any(v IN xs WHERE v > 0) AS y, single(v IN xs WHERE v > 0) AS s",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows[0][0], Value::Bool(true));
    assert_eq!(result.rows[0][1], Value::Bool(true));
    assert_eq!(result.rows[0][2], Value::Bool(false));
    assert_eq!(result.rows[0][3], Value::Bool(false));
}

#[test]
fn shortest_path_finds_minimum_hop_route() {
    let db = store();
    run(
        "CREATE (a:City {name:'A'})-[:ROAD]->(b:City {name:'B'})-[:ROAD]->(c:City {name:'C'}), \
                (a)-[:ROAD]->(c)",
        &no_params(),
        &db,
    )
    .unwrap();

    let result = run(
        "MATCH (a:City {name:'A'}), (c:City {name:'C'}), \
               p = shortestPath((a)-[:ROAD*1..5]->(c)) \
         RETURN length(p)",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Int(1));
}

#[test]
fn with_boundary_rematch_anchors_to_previously_bound_entities_not_any_match() {
    let db = store();
    run(
        "CREATE (:User {name:'Alice'}), (:User {name:'Bob'}), (:User {name:'Carol'})",
        &no_params(),
        &db,
    )
    .unwrap();
    run(
        "MATCH (a:User {name:'Alice'}), (b:User {name:'Bob'}) \
         CREATE (a)-[:LIKES {since: 2024}]->(b)",
        &no_params(),
        &db,
    )
    .unwrap();
    run(
        "MATCH (a:User {name:'Alice'}), (c:User {name:'Carol'}) \
         CREATE (a)-[:LIKES {since: 2020}]->(c)",
        &no_params(),
        &db,
    )
    .unwrap();

    // Alice has a LIKES edge to both Bob and Carol. Re-matching the
    // WITH-carried `a`/`b` against a fresh `(a)-[r:LIKES]->(b)` pattern must
    // stay anchored to the specific Alice and Bob rows already bound, not
    // fall through to every LIKES edge out of Alice.
    let result = run(
        "MATCH (a:User {name:'Alice'}) MATCH (b:User {name:'Bob'}) \
         WITH a, b MATCH (a)-[r:LIKES]->(b) RETURN r.since",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Int(2024));
}

#[test]
fn delete_resolves_list_index_target_from_collected_with_boundary() {
    let db = store();
    run(
        "CREATE (:User {name:'Alice'}), (:User {name:'Bob'})",
        &no_params(),
        &db,
    )
    .unwrap();

    run(
        "MATCH (n:User) WITH n ORDER BY n.name WITH collect(n) AS ns DELETE ns[0]",
        &no_params(),
        &db,
    )
    .unwrap();

    let remaining = run("MATCH (n:User) RETURN n.name AS name", &no_params(), &db).unwrap();
    assert_eq!(remaining.rows.len(), 1);
    assert_eq!(remaining.rows[0][0], Value::Str("Bob".to_string()));
}

#[test]
fn mid_pipeline_call_yields_cross_joined_rows() {
    let db = store();
    run(
        "CREATE (:User {name:'Alice'}), (:Admin {name:'Root'})",
        &no_params(),
        &db,
    )
    .unwrap();

    let result = run(
        "MATCH (n:User) CALL db.labels() YIELD label \
         RETURN n.name AS name, label ORDER BY label",
        &no_params(),
        &db,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0][0], Value::Str("Alice".to_string()));
    assert_eq!(result.rows[0][1], Value::Str("Admin".to_string()));
    assert_eq!(result.rows[1][0], Value::Str("Alice".to_string()));
    assert_eq!(result.rows[1][1], Value::Str("User".to_string()));
}
