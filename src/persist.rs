// used for persistence of the fact store as a line-oriented state file
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PeekError, Result};
use crate::store::FactStore;

/// What to do with a line of the state file that is not a valid fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Stop loading and report the offending line.
    #[default]
    Abort,
    /// Warn about the offending line and carry on.
    Skip,
}

impl FactStore {
    /// Adds every fact found in the state file at `path`, returning how many were accepted.
    ///
    /// A missing file is an empty state. Blank lines are ignored, and a fact
    /// whose key was already loaded keeps its first occurrence.
    pub fn load(&mut self, path: &Path, policy: LoadPolicy) -> Result<usize> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file yet");
                return Ok(0);
            }
            Err(e) => return Err(PeekError::persistence(path, e)),
        };
        let mut accepted = 0;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| PeekError::persistence(path, e))?;
            if line.is_empty() {
                continue;
            }
            match self.add(&line) {
                Ok(true) => accepted += 1,
                Ok(false) => debug!(fact = %line, "duplicate key in state file"),
                Err(PeekError::InvalidFact { fact }) => {
                    let e = PeekError::InvalidStoredFact {
                        path: path.to_path_buf(),
                        line: number + 1,
                        fact,
                    };
                    match policy {
                        LoadPolicy::Abort => return Err(e),
                        LoadPolicy::Skip => warn!(error = %e, "skipping line"),
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(accepted)
    }

    /// Writes the facts in sorted order, one per line.
    ///
    /// The file is written next to `path` first and then renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let staging = sibling(path, ".tmp");
        let write = || -> io::Result<()> {
            let mut out = BufWriter::new(File::create(&staging)?);
            for raw in self.iter() {
                writeln!(out, "{raw}")?;
            }
            out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            fs::rename(&staging, path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&staging);
            PeekError::persistence(path, e)
        })
    }

    /// Like [`FactStore::save`], except that an empty store removes `path`.
    pub fn save_or_remove(&self, path: &Path) -> Result<()> {
        if !self.is_empty() {
            return self.save(path);
        }
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed empty state file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PeekError::persistence(path, e)),
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(suffix);
    path.with_file_name(name)
}

/// Where the facts of an unfinished run are kept next to the state file `path`.
pub fn pending_path(path: &Path) -> PathBuf {
    sibling(path, ".pending")
}
