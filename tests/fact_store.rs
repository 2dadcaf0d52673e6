use peek::PeekError;
use peek::store::FactStore;

fn facts(store: &FactStore) -> Vec<&str> {
    store.iter().collect()
}

#[test]
fn keys_are_unique_and_first_value_wins() {
    let mut store = FactStore::new();
    assert!(store.add("k:x=1").expect("valid"));
    assert!(!store.add("k:x=2").expect("valid"), "second add must be refused");
    assert_eq!(facts(&store), vec!["k:x=1"]);
    assert!(store.exists("k:x=99"));
    assert!(store.exists("k:x"));
    assert_eq!(store.get("k:x"), Some("k:x=1"));
}

#[test]
fn invalid_facts_are_refused() {
    let mut store = FactStore::new();
    assert!(matches!(store.add("nocolon"), Err(PeekError::InvalidFact { .. })));
    assert!(matches!(store.add("a:b$"), Err(PeekError::InvalidFact { .. })));
    assert!(store.add("a:b").expect("valid"));
    assert_eq!(store.len(), 1);
}

#[test]
fn iteration_follows_hierarchical_order() {
    let mut store = FactStore::new();
    for raw in ["host:10", "host:2:port:80", "host:2", "host:1=up", "host:", "host:2:port:443", "host:a"] {
        store.add(raw).unwrap();
    }
    assert_eq!(
        facts(&store),
        vec!["host:", "host:1=up", "host:2", "host:2:port:80", "host:2:port:443", "host:10", "host:a"]
    );
    store.check_consistency().expect("index matches sequence");
}

#[test]
fn equal_ranking_keys_are_distinct_identities() {
    let mut store = FactStore::new();
    assert!(store.add("host:2=first").unwrap());
    assert!(store.add("host:02=second").unwrap());
    assert_eq!(store.len(), 2);
    assert_eq!(facts(&store), vec!["host:2=first", "host:02=second"]);
    assert!(store.delete("host:2"));
    assert_eq!(facts(&store), vec!["host:02=second"]);
    store.check_consistency().unwrap();
}

#[test]
fn delete_by_key() {
    let mut store = FactStore::new();
    store.add("a:b=1").unwrap();
    store.add("a:c=2").unwrap();
    assert!(store.delete("a:b=whatever"));
    assert!(!store.delete("a:b"), "second delete is a no-op");
    assert!(!store.exists("a:b"));
    assert_eq!(facts(&store), vec!["a:c=2"]);
    // the key can be added again afterwards
    assert!(store.add("a:b=3").unwrap());
    store.check_consistency().unwrap();
}

#[test]
fn clear_matching_prunes_by_full_text() {
    let mut store = FactStore::new();
    for raw in ["host:db1=up", "host:db2=down", "host:web1=up", "net:lan=up", "net:wan"] {
        store.add(raw).unwrap();
    }
    assert_eq!(store.clear_matching("host:db*"), 2);
    assert_eq!(facts(&store), vec!["host:web1=up", "net:lan=up", "net:wan"]);
    // the value is part of the matched text
    assert_eq!(store.clear_matching("*=up"), 2);
    assert_eq!(facts(&store), vec!["net:wan"]);
    assert_eq!(store.clear_matching("nothing:*"), 0);
    assert!(store.exists("net:wan"));
    store.check_consistency().unwrap();
}

#[test]
fn clear_matching_with_extglob() {
    let mut store = FactStore::new();
    for raw in ["os:linux", "os:bsd", "os:windows", "cpu:x86"] {
        store.add(raw).unwrap();
    }
    assert_eq!(store.clear_matching("os:!(linux)"), 2);
    assert_eq!(facts(&store), vec!["cpu:x86", "os:linux"]);
}

#[test]
fn display_lists_one_fact_per_line() {
    let mut store = FactStore::new();
    store.add("b:1").unwrap();
    store.add("a:1=x").unwrap();
    assert_eq!(store.to_string(), "a:1=x\nb:1\n");
    assert!(FactStore::new().is_empty());
}
