use std::fs;
use std::path::Path;

use peek::PeekError;
use peek::rule::{Rule, RuleSet, pattern_to_regex};

#[test]
fn empty_segments_and_open_suffix() {
    assert_eq!(pattern_to_regex("host::port:"), "^host:[^:]*:port:[^:]*$");
    assert_eq!(pattern_to_regex("host:"), "^host:[^:]*$");
    assert_eq!(pattern_to_regex("host:db"), "^host:db$");
    assert_eq!(pattern_to_regex("a::"), "^a:[^:]*:[^:]*$");
}

#[test]
fn compiled_rule_matches_whole_keys() {
    let rule = Rule::compile("/usr/share/peek/web:host::port:").expect("valid rule");
    assert_eq!(rule.name(), "web");
    assert_eq!(rule.path(), Path::new("/usr/share/peek/web:host::port:"));
    assert_eq!(rule.expression(), "^host:[^:]*:port:[^:]*$");
    assert!(rule.matches("host:db1:port:5432"));
    assert!(rule.matches("host:db1:port:5432=open"), "values are not part of the match");
    assert!(!rule.matches("host:db1:5432"));
    assert!(!rule.matches("host:db1:port:5432:banner"));
    assert!(!rule.matches("xhost:db1:port:5432"));
}

#[test]
fn name_is_split_at_first_separator() {
    let rule = Rule::compile("scan:net:lan:").unwrap();
    assert_eq!(rule.name(), "scan");
    assert!(rule.matches("net:lan:10"));
    assert!(!rule.matches("net:wan:10"));
}

#[test]
fn malformed_file_names_are_rejected() {
    for path in ["noseparator", "bad:host.name", "bad:host:*", "dir/with space:x"] {
        assert!(
            matches!(Rule::compile(path), Err(PeekError::RuleCompile { .. })),
            "{path} should be rejected"
        );
    }
}

#[test]
fn command_passes_fact_as_argument() {
    let rule = Rule::compile("/rules/web:host:").unwrap();
    let command = rule.command("host:db1=up");
    assert_eq!(command.get_program(), "/rules/web:host:");
    assert_eq!(command.get_args().collect::<Vec<_>>(), vec!["host:db1=up"]);
}

#[test]
fn rule_set_matches_in_load_order() {
    let rules = RuleSet::from_paths(["/r/b:host:", "/r/invalid", "/r/a:host::", "/r/c:host:db1"]);
    assert_eq!(rules.len(), 3, "the invalid rule is discarded");
    let names: Vec<&str> = rules.matching("host:db1").map(|(_, rule)| rule.name()).collect();
    assert_eq!(names, vec!["b", "c"]);
    let ids: Vec<usize> = rules.matching("host:db1:x").map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(rules.get(1).map(Rule::name), Some("a"));
}

#[test]
fn directory_load_considers_regular_files_only() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("zeta:host:"), "#!/bin/sh\n").unwrap();
    fs::write(dir.path().join("alpha:host::port:"), "#!/bin/sh\n").unwrap();
    fs::write(dir.path().join("README.md"), "not a rule\n").unwrap();
    fs::create_dir(dir.path().join("nested:host:")).unwrap();
    let rules = RuleSet::load(dir.path());
    let names: Vec<&str> = rules.iter().map(Rule::name).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn unreadable_directory_yields_no_rules() {
    let dir = tempfile::tempdir().unwrap();
    let rules = RuleSet::load(&dir.path().join("absent"));
    assert!(rules.is_empty());
}
