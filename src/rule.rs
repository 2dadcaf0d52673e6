//! Rules and the rule set.
//!
//! A rule is an executable whose file name encodes `<name>:<pattern>`. The
//! pattern is a hierarchical glob over fact keys: an empty segment (`::`)
//! stands for any single segment, and a trailing `:` leaves the last segment
//! open. For example `web:host::port:` is compiled to
//! `^host:[^:]*:port:[^:]*$`.

use std::fs;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{PeekError, Result};
use crate::fact;

lazy_static! {
    static ref RULE_FILE_NAME: Regex = Regex::new(r"^[A-Za-z0-9_:-]+$").unwrap();
}

const ANY_SEGMENT: &str = "[^:]*";

/// Translates the pattern part of a rule file name into an anchored regular expression.
pub fn pattern_to_regex(pattern: &str) -> String {
    let mut expression = String::from("^");
    expression += &pattern.replace("::", &format!(":{ANY_SEGMENT}:"));
    if expression.ends_with(':') {
        expression += ANY_SEGMENT;
    }
    expression.push('$');
    expression
}

// ------------- Rule -------------
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    path: PathBuf,
    matcher: Regex,
}

impl Rule {
    /// Compiles the rule whose resolver lives at `path`.
    pub fn compile(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rejected = |reason: &str| PeekError::RuleCompile {
            path: path.clone(),
            reason: reason.to_owned(),
        };
        let base = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| rejected("file name is not valid UTF-8"))?;
        if !RULE_FILE_NAME.is_match(base) {
            return Err(rejected("file name contains characters outside [A-Za-z0-9_:-]"));
        }
        let (name, pattern) = base
            .split_once(':')
            .ok_or_else(|| rejected("file name has no ':' separating name and pattern"))?;
        let matcher = Regex::new(&pattern_to_regex(pattern)).map_err(|e| rejected(&e.to_string()))?;
        Ok(Self {
            name: name.to_owned(),
            path: path.clone(),
            matcher,
        })
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn expression(&self) -> &str {
        self.matcher.as_str()
    }
    /// Whole-key match; any `=value` suffix of `fact` is ignored.
    pub fn matches(&self, fact: &str) -> bool {
        self.matcher.is_match(fact::key(fact))
    }
    /// The resolver invocation for `fact`: `<path> <fact>`, with the file's
    /// base name as `argv[0]`.
    pub fn command(&self, fact: &str) -> Command {
        let mut command = Command::new(&self.path);
        if let Some(base) = self.path.file_name() {
            command.arg0(base);
        }
        command.arg(fact);
        command
    }
}

// ------------- RuleSet -------------
pub type RuleId = usize;

/// Valid rules in load order.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }
    /// Loads every regular file in `dir`, in file name order.
    ///
    /// An unreadable directory yields an empty rule set and a warning.
    pub fn load(dir: &Path) -> Self {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unable to read rules directory");
                let rules = Self::new();
                rules.report();
                return rules;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.path())
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Self::from_paths(paths)
    }
    /// Compiles the given resolver paths; invalid ones are discarded with a warning.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut rules = Self::new();
        for path in paths {
            let path = path.into();
            debug!(path = %path.display(), "loading rule");
            match Rule::compile(&path) {
                Ok(rule) => rules.rules.push(rule),
                Err(e) => warn!(error = %e, "discarding rule {}", path.display()),
            }
        }
        rules.report();
        rules
    }
    fn report(&self) {
        info!(count = self.rules.len(), "loaded rules");
        if self.rules.is_empty() {
            warn!("no rules loaded");
        }
    }
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }
    /// Rules matching `fact`'s key, in load order.
    pub fn matching<'a>(&'a self, fact: &'a str) -> impl Iterator<Item = (RuleId, &'a Rule)> + 'a {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.matches(fact))
    }
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
    pub fn len(&self) -> usize {
        self.rules.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
