//! Child process supervision on top of `tokio::process`.
//!
//! Each launched resolver gets a reader task that forwards its standard output
//! in chunks and then reports its exit status, always in that order, through
//! one channel shared by all resolvers. The discovery loop is the single
//! consumer of that channel.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{PeekError, Result};
use crate::rule::Rule;
use crate::scheduler::{Launcher, TaskId};

const CHUNK_SIZE: usize = 4096;
// what a shell reports when a command cannot be executed
const NOT_EXECUTABLE: i32 = 127;

#[derive(Debug)]
pub enum Event {
    Output(TaskId, Vec<u8>),
    Exited(TaskId, ExitStatus),
    /// Reading from or reaping the resolver failed.
    Failed(TaskId, io::Error),
}

/// Launches resolvers as child processes with a piped standard output.
///
/// Children are killed when their reader task is dropped, so aborting the
/// launcher never leaves orphans behind.
pub struct ProcessLauncher {
    events: UnboundedSender<Event>,
    readers: JoinSet<()>,
}

impl ProcessLauncher {
    pub fn new() -> (Self, UnboundedReceiver<Event>) {
        let (events, receiver) = unbounded_channel();
        let launcher = Self {
            events,
            readers: JoinSet::new(),
        };
        (launcher, receiver)
    }
    /// Number of resolvers whose reader has not finished yet.
    pub fn active(&mut self) -> usize {
        while self.readers.try_join_next().is_some() {}
        self.readers.len()
    }
    /// Kills every live resolver and waits for the readers to wind down.
    pub async fn terminate(&mut self) {
        let live = self.active();
        if live > 0 {
            warn!(live, "terminating resolvers");
        }
        self.readers.shutdown().await;
    }
}

// Only running out of processes, memory or descriptors stops discovery. Any
// other spawn error (missing, busy or malformed resolver) ends that task alone.
fn is_exhaustion(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::OutOfMemory | io::ErrorKind::WouldBlock)
        || matches!(
            e.raw_os_error(),
            Some(libc::EAGAIN | libc::ENOMEM | libc::EMFILE | libc::ENFILE)
        )
}

async fn forward(task: TaskId, mut child: tokio::process::Child, events: UnboundedSender<Event>) {
    let Some(mut stdout) = child.stdout.take() else {
        let _ = events.send(Event::Failed(task, io::Error::other("stdout was not captured")));
        return;
    };
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if events.send(Event::Output(task, chunk[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = events.send(Event::Failed(task, e));
                return;
            }
        }
    }
    drop(stdout);
    let event = match child.wait().await {
        Ok(status) => Event::Exited(task, status),
        Err(e) => Event::Failed(task, e),
    };
    let _ = events.send(event);
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, task: TaskId, rule: &Rule, fact: &str) -> Result<()> {
        while self.readers.try_join_next().is_some() {}
        let mut command = Command::from(rule.command(fact));
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        match command.spawn() {
            Ok(child) => {
                debug!(task, pid = ?child.id(), path = %rule.path().display(), "spawned resolver");
                self.readers.spawn(forward(task, child, self.events.clone()));
                Ok(())
            }
            Err(e) if is_exhaustion(&e) => Err(PeekError::resource("spawning resolver", e)),
            Err(e) => {
                warn!(task, path = %rule.path().display(), error = %e, "unable to execute resolver");
                let status = ExitStatus::from_raw(NOT_EXECUTABLE << 8);
                let _ = self.events.send(Event::Exited(task, status));
                Ok(())
            }
        }
    }
}
