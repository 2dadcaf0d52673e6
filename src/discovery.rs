//! The discovery loop.
//!
//! A single task owns the scheduler and waits on three things at once:
//! resolver events, facts streamed on an input (typically standard input) and
//! termination signals. The loop ends once the input is closed and no
//! resolution task is pending or running.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::error::{PeekError, Result};
use crate::process::{Event, ProcessLauncher};
use crate::rule::RuleSet;
use crate::scheduler::{Partitions, Scheduler, SchedulerOptions, Submission};
use crate::store::FactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every resolution task ran to completion.
    Finished,
    /// A termination signal arrived; live resolvers were killed.
    Interrupted,
}

pub struct Discovery<W: Write> {
    scheduler: Scheduler<ProcessLauncher, W, io::Stderr>,
    events: UnboundedReceiver<Event>,
}

async fn next_line<R: AsyncBufRead + Unpin>(input: &mut Option<Lines<R>>) -> Option<io::Result<String>> {
    match input {
        Some(lines) => lines.next_line().await.transpose(),
        None => std::future::pending().await,
    }
}

impl<W: Write> Discovery<W> {
    /// Must be called from within a tokio runtime. Dry run reports go to
    /// standard error.
    pub fn new(rules: RuleSet, facts: FactStore, options: SchedulerOptions, output: W) -> Self {
        let (launcher, events) = ProcessLauncher::new();
        Self {
            scheduler: Scheduler::new(rules, facts, options, launcher, output, io::stderr()),
            events,
        }
    }
    pub fn submit(&mut self, fact: &str) -> Result<Submission> {
        self.scheduler.submit(fact)
    }
    pub fn scheduler(&self) -> &Scheduler<ProcessLauncher, W, io::Stderr> {
        &self.scheduler
    }

    /// Runs until all work is done, or until a termination signal.
    ///
    /// Every line read from `input` is submitted as a fact.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: Option<R>) -> Result<Completion> {
        let mut input = input.map(|reader| reader.lines());
        let mut interrupt =
            signal(SignalKind::interrupt()).map_err(|e| PeekError::resource("installing SIGINT handler", e))?;
        let mut terminate =
            signal(SignalKind::terminate()).map_err(|e| PeekError::resource("installing SIGTERM handler", e))?;
        loop {
            if input.is_none() && self.scheduler.is_idle() {
                debug!("no outstanding work");
                return Ok(Completion::Finished);
            }
            tokio::select! {
                Some(event) = self.events.recv() => self.dispatch(event)?,
                line = next_line(&mut input) => match line {
                    Some(Ok(line)) => {
                        self.scheduler.submit(line.trim_end_matches('\r'))?;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "unable to read input");
                        input = None;
                    }
                    None => {
                        debug!("input closed");
                        input = None;
                    }
                },
                _ = interrupt.recv() => return self.interrupted().await,
                _ = terminate.recv() => return self.interrupted().await,
            }
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Output(task, chunk) => self.scheduler.on_output(task, &chunk),
            Event::Exited(task, status) => self.scheduler.on_exit(task, status),
            Event::Failed(task, e) => Err(PeekError::resource(&format!("supervising resolver task {task}"), e)),
        }
    }

    async fn interrupted(&mut self) -> Result<Completion> {
        info!(
            running = self.scheduler.running(),
            pending = self.scheduler.pending(),
            "interrupted"
        );
        self.scheduler.launcher_mut().terminate().await;
        Ok(Completion::Interrupted)
    }

    /// The resolved facts, and the facts still queued when discovery stopped.
    pub fn into_partitions(self) -> Partitions {
        self.scheduler.into_partitions()
    }
}
