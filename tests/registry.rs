//! Registry lifecycle tests (spec §5): a file-backed store reopened through
//! the same `"{env}/{project}"` key must see data written by an earlier
//! handle, and distinct keys must not share state.

use std::collections::HashMap;

use graphcypher::{run, StoreRegistry, Value};
use serial_test::serial;

#[test]
#[serial]
fn reopening_the_same_key_sees_prior_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.sqlite3");
    let path_str = path.to_str().unwrap();

    let registry = StoreRegistry::new();
    let handle_a = registry.handle("dev", "acme", path_str).unwrap();
    {
        let store = handle_a.lock().unwrap();
        run("CREATE (:User {name:'Alice'})", &HashMap::new(), &*store).unwrap();
    }

    let handle_b = registry.handle("dev", "acme", path_str).unwrap();
    let store = handle_b.lock().unwrap();
    let result = run("MATCH (n:User) RETURN count(n) AS c", &HashMap::new(), &*store).unwrap();
    assert_eq!(result.rows[0][0], Value::Int(1));
}

#[test]
#[serial]
fn distinct_keys_do_not_share_state() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.sqlite3");
    let path_b = dir.path().join("b.sqlite3");

    let registry = StoreRegistry::new();
    let handle_a = registry.handle("dev", "proj-a", path_a.to_str().unwrap()).unwrap();
    let handle_b = registry.handle("dev", "proj-b", path_b.to_str().unwrap()).unwrap();

    {
        let store = handle_a.lock().unwrap();
        run("CREATE (:User {name:'Alice'})", &HashMap::new(), &*store).unwrap();
    }

    let store_b = handle_b.lock().unwrap();
    let result = run("MATCH (n:User) RETURN count(n) AS c", &HashMap::new(), &*store_b).unwrap();
    assert_eq!(result.rows[0][0], Value::Int(0));
}
