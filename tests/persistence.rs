use std::fs;

use peek::PeekError;
use peek::persist::{LoadPolicy, pending_path};
use peek::store::FactStore;

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state");
    let mut store = FactStore::new();
    for raw in ["host:10", "host:2=up", "host:2:port:22=ssh", "net:lan", "host:"] {
        store.add(raw).unwrap();
    }
    store.save(&path).expect("save");
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "host:\nhost:2=up\nhost:2:port:22=ssh\nhost:10\nnet:lan\n"
    );
    let mut restored = FactStore::new();
    assert_eq!(restored.load(&path, LoadPolicy::Abort).expect("load"), 5);
    assert_eq!(
        restored.iter().collect::<Vec<_>>(),
        store.iter().collect::<Vec<_>>()
    );
    restored.check_consistency().unwrap();
    // no staging file is left behind
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn missing_state_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FactStore::new();
    assert_eq!(store.load(&dir.path().join("absent"), LoadPolicy::Abort).unwrap(), 0);
    assert!(store.is_empty());
}

#[test]
fn last_line_needs_no_terminator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "b:1\na:1=x\n\nc:1").unwrap();
    let mut store = FactStore::new();
    assert_eq!(store.load(&path, LoadPolicy::Abort).unwrap(), 3);
    assert_eq!(store.iter().collect::<Vec<_>>(), vec!["a:1=x", "b:1", "c:1"]);
}

#[test]
fn duplicate_keys_keep_first_occurrence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "a:1=first\na:1=second\n").unwrap();
    let mut store = FactStore::new();
    assert_eq!(store.load(&path, LoadPolicy::Abort).unwrap(), 1);
    assert_eq!(store.get("a:1"), Some("a:1=first"));
}

#[test]
fn invalid_line_aborts_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "a:1\nbroken\nb:1\n").unwrap();
    let mut store = FactStore::new();
    match store.load(&path, LoadPolicy::Abort) {
        Err(PeekError::InvalidStoredFact { line, fact, .. }) => {
            assert_eq!(line, 2);
            assert_eq!(fact, "broken");
        }
        other => panic!("expected an invalid stored fact, got {other:?}"),
    }
}

#[test]
fn invalid_line_can_be_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "a:1\nbroken\nb:1\n").unwrap();
    let mut store = FactStore::new();
    assert_eq!(store.load(&path, LoadPolicy::Skip).unwrap(), 2);
    assert_eq!(store.iter().collect::<Vec<_>>(), vec!["a:1", "b:1"]);
}

#[test]
fn save_replaces_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "old:fact\n").unwrap();
    let mut store = FactStore::new();
    store.add("new:fact").unwrap();
    store.save(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "new:fact\n");
}

#[test]
fn save_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("state");
    let store = FactStore::new();
    assert!(matches!(store.save(&path), Err(PeekError::Persistence { .. })));
}

#[test]
fn pending_facts_live_next_to_the_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");
    let pending = pending_path(&state);
    assert_eq!(pending, dir.path().join("state.pending"));

    let mut unfinished = FactStore::new();
    unfinished.add("host:x:port:22").unwrap();
    unfinished.save_or_remove(&pending).unwrap();
    let mut restored = FactStore::new();
    assert_eq!(restored.load(&pending, LoadPolicy::Abort).unwrap(), 1);

    // once nothing is left unresolved the file goes away
    FactStore::new().save_or_remove(&pending).unwrap();
    assert!(!pending.exists());
    FactStore::new().save_or_remove(&pending).unwrap();
}
