//! Resolver scheduling.
//!
//! Every accepted fact is matched against the rule set, and each match becomes
//! a resolution task that moves `Pending -> Running -> done`. At most
//! `max_resolvers` tasks run at once; the rest wait in a FIFO queue and are
//! promoted as soon as a slot frees up. Output lines of a running resolver are
//! submitted as facts themselves, so discovery recurses until no rule matches
//! anything new.
//!
//! A fact with outstanding tasks sits in the queued partition. It moves to the
//! resolved partition when its last task completes, whether that task was
//! running or still pending behind the ceiling when its siblings finished.
//!
//! The scheduler is plain state: starting processes is delegated to a
//! [`Launcher`], and the owner feeds back output chunks and exit statuses
//! through [`Scheduler::on_output`] and [`Scheduler::on_exit`]. Facts are
//! echoed to the output writer; dry run reports go to a separate writer so
//! they never mix with the fact stream.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::process::ExitStatus;

use tracing::{debug, warn};

use crate::error::{PeekError, Result};
use crate::fact;
use crate::rule::{Rule, RuleId, RuleSet};
use crate::store::{FactStore, KeyHasher};

pub const DEFAULT_MAX_RESOLVERS: usize = 10;

pub type TaskId = u64;

/// Starts resolver processes on behalf of the scheduler.
pub trait Launcher {
    /// Starts `rule`'s resolver for `fact`.
    ///
    /// Errors are resource failures and abort discovery. A resolver that
    /// cannot be executed should instead be reported later as a failed exit.
    fn launch(&mut self, task: TaskId, rule: &Rule, fact: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
}

#[derive(Debug)]
pub struct Task {
    rule: RuleId,
    fact: String,
    state: TaskState,
    // unterminated tail of the resolver's output
    partial: Vec<u8>,
}
impl Task {
    pub fn rule(&self) -> RuleId {
        self.rule
    }
    pub fn fact(&self) -> &str {
        &self.fact
    }
    pub fn state(&self) -> TaskState {
        self.state
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub max_resolvers: usize,
    /// Resubmitting a known fact replaces it and resolves it again.
    pub override_existing: bool,
    /// Only report which rules a fact would trigger.
    pub dry_run: bool,
}
impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_resolvers: DEFAULT_MAX_RESOLVERS,
            override_existing: false,
            dry_run: false,
        }
    }
}

/// What became of a submitted fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The fact is not grammatical.
    Rejected,
    /// A fact with the same key is already resolved.
    Known,
    /// A fact with the same key is still being resolved.
    InProgress,
    /// Dry run: the number of rules the fact matches.
    DryRun { rules: usize },
    /// Stored, with this many resolution tasks created for it.
    Accepted { tasks: usize },
}

/// The facts a scheduler leaves behind.
#[derive(Debug, Default)]
pub struct Partitions {
    pub resolved: FactStore,
    /// Facts whose resolution never finished. Submitting them again resumes it.
    pub queued: FactStore,
}

pub struct Scheduler<L: Launcher, W: Write, R: Write> {
    rules: RuleSet,
    resolved: FactStore,
    queued: FactStore,
    tasks: HashMap<TaskId, Task>,
    pending: VecDeque<TaskId>,
    running: HashSet<TaskId>,
    // fact key -> number of tasks not yet done
    outstanding: HashMap<String, usize, KeyHasher>,
    next_task: TaskId,
    options: SchedulerOptions,
    launcher: L,
    output: W,
    reports: R,
}

impl<L: Launcher, W: Write, R: Write> Scheduler<L, W, R> {
    pub fn new(
        rules: RuleSet,
        resolved: FactStore,
        options: SchedulerOptions,
        launcher: L,
        output: W,
        reports: R,
    ) -> Self {
        Self {
            rules,
            resolved,
            queued: FactStore::new(),
            tasks: HashMap::new(),
            pending: VecDeque::new(),
            running: HashSet::new(),
            outstanding: HashMap::default(),
            next_task: 0,
            options,
            launcher,
            output,
            reports,
        }
    }

    /// Feeds a fact into discovery.
    pub fn submit(&mut self, raw: &str) -> Result<Submission> {
        if !fact::is_valid(raw) {
            warn!(fact = %raw, "invalid value");
            return Ok(Submission::Rejected);
        }
        if self.queued.exists(raw) {
            debug!(fact = %raw, "value is already being resolved");
            return Ok(Submission::InProgress);
        }
        if self.resolved.exists(raw) && !self.options.override_existing {
            debug!(fact = %raw, "found existing value");
            return Ok(Submission::Known);
        }
        if self.options.dry_run {
            let names: Vec<String> = self
                .rules
                .matching(raw)
                .map(|(_, rule)| rule.name().to_owned())
                .collect();
            for name in &names {
                if let Err(e) = writeln!(self.reports, "rule: {name} {raw}") {
                    warn!(error = %e, "unable to write report");
                }
            }
            return Ok(Submission::DryRun { rules: names.len() });
        }
        let matches: Vec<RuleId> = self.rules.matching(raw).map(|(id, _)| id).collect();
        self.resolved.delete(raw);
        let partition = if matches.is_empty() {
            &mut self.resolved
        } else {
            &mut self.queued
        };
        if !partition.add(raw)? {
            return Err(PeekError::Invariant(format!("{raw:?} was refused after its key was checked")));
        }
        self.emit(raw);
        for &rule in &matches {
            self.next_task += 1;
            let id = self.next_task;
            debug!(task = id, rule = ?self.rules.get(rule).map(Rule::name), fact = %raw, "applying rule");
            self.tasks.insert(
                id,
                Task {
                    rule,
                    fact: raw.to_owned(),
                    state: TaskState::Pending,
                    partial: Vec::new(),
                },
            );
            self.pending.push_back(id);
        }
        if !matches.is_empty() {
            self.outstanding.insert(fact::key(raw).to_owned(), matches.len());
        }
        self.schedule()?;
        Ok(Submission::Accepted { tasks: matches.len() })
    }

    /// Promotes pending tasks until the concurrency ceiling is reached.
    pub fn schedule(&mut self) -> Result<()> {
        let ceiling = self.options.max_resolvers.max(1);
        while self.running.len() < ceiling {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let task = self
                .tasks
                .get_mut(&id)
                .ok_or_else(|| PeekError::Invariant(format!("pending task {id} is unknown")))?;
            let rule = self
                .rules
                .get(task.rule)
                .ok_or_else(|| PeekError::Invariant(format!("task {id} refers to a missing rule")))?;
            self.launcher.launch(id, rule, &task.fact)?;
            debug!(task = id, rule = rule.name(), fact = %task.fact, "running resolver");
            task.state = TaskState::Running;
            self.running.insert(id);
        }
        Ok(())
    }

    /// Handles a chunk of a running resolver's standard output.
    ///
    /// Every completed line is submitted as a fact; an unterminated tail is
    /// kept until more output arrives.
    pub fn on_output(&mut self, id: TaskId, chunk: &[u8]) -> Result<()> {
        let task = self.running_task(id)?;
        task.partial.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(end) = task.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = task.partial.drain(..=end).collect();
            lines.push(line);
        }
        for line in lines {
            self.submit_line(id, &line)?;
        }
        Ok(())
    }

    /// Handles the termination of a resolver whose output has been fully read.
    pub fn on_exit(&mut self, id: TaskId, status: ExitStatus) -> Result<()> {
        let tail = std::mem::take(&mut self.running_task(id)?.partial);
        if !tail.is_empty() {
            self.submit_line(id, &tail)?;
        }
        self.running.remove(&id);
        let task = self
            .tasks
            .remove(&id)
            .ok_or_else(|| PeekError::Invariant(format!("running task {id} is unknown")))?;
        let rule = self.rules.get(task.rule).map(Rule::name).unwrap_or_default();
        if status.success() {
            debug!(task = id, rule, fact = %task.fact, "resolver finished");
        } else {
            warn!(task = id, rule, fact = %task.fact, %status, "resolver failed");
        }
        self.complete(&task.fact)?;
        self.schedule()
    }

    fn complete(&mut self, raw: &str) -> Result<()> {
        let key = fact::key(raw);
        match self.outstanding.entry(key.to_owned()) {
            Entry::Occupied(mut e) if *e.get() > 1 => {
                *e.get_mut() -= 1;
                return Ok(());
            }
            Entry::Occupied(e) => {
                e.remove();
            }
            Entry::Vacant(_) => {
                return Err(PeekError::Invariant(format!("no outstanding tasks for {raw:?}")));
            }
        }
        self.queued.delete(raw);
        if !self.resolved.add(raw)? {
            warn!(fact = %raw, "resolved value collides with an existing one");
        }
        debug!(fact = %raw, "value resolved");
        Ok(())
    }

    fn running_task(&mut self, id: TaskId) -> Result<&mut Task> {
        match self.tasks.get_mut(&id) {
            Some(task) if task.state == TaskState::Running => Ok(task),
            _ => Err(PeekError::Invariant(format!("task {id} is not running"))),
        }
    }

    fn submit_line(&mut self, id: TaskId, line: &[u8]) -> Result<()> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Ok(());
        }
        debug!(task = id, fact = %line, "resolver output");
        self.submit(line).map(|_| ())
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.output, "{line}").and_then(|_| self.output.flush()) {
            warn!(error = %e, "unable to write output");
        }
    }

    /// True when no task is pending or running.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.running.is_empty()
    }
    pub fn running(&self) -> usize {
        self.running.len()
    }
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }
    /// Facts with at least one outstanding task.
    pub fn queued(&self) -> &FactStore {
        &self.queued
    }
    /// Facts with no outstanding task.
    pub fn resolved(&self) -> &FactStore {
        &self.resolved
    }
    pub fn launcher(&self) -> &L {
        &self.launcher
    }
    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }
    pub fn output(&self) -> &W {
        &self.output
    }
    pub fn reports(&self) -> &R {
        &self.reports
    }
    pub fn into_partitions(self) -> Partitions {
        Partitions {
            resolved: self.resolved,
            queued: self.queued,
        }
    }
}
