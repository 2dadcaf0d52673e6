//! Layered configuration.
//!
//! Later layers win: built-in defaults, then an optional configuration file,
//! then `PEEK_*` environment variables (for example `PEEK_MAX_RESOLVERS=4`),
//! then command line flags.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{PeekError, Result};
use crate::persist::LoadPolicy;
use crate::scheduler::{DEFAULT_MAX_RESOLVERS, SchedulerOptions};

pub const DEFAULT_RULES_DIR: &str = "/usr/share/peek";
const STATE_FILE_NAME: &str = ".peek";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Directory holding the resolver executables.
    pub rules: PathBuf,
    /// File the facts are persisted in between runs.
    pub state: PathBuf,
    pub max_resolvers: usize,
    pub load_policy: LoadPolicy,
    #[serde(rename = "override")]
    pub override_existing: bool,
    pub dry_run: bool,
}

/// Values given on the command line; `None` and `false` leave lower layers alone.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub rules: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub max_resolvers: Option<usize>,
    pub override_existing: bool,
    pub dry_run: bool,
}

fn default_state() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_else(|| "/".into());
    Path::new(&home).join(STATE_FILE_NAME)
}

fn path_value(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().into_owned())
}

impl Settings {
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("rules", DEFAULT_RULES_DIR)?
            .set_default("state", default_state().to_string_lossy().into_owned())?
            .set_default("max_resolvers", DEFAULT_MAX_RESOLVERS as i64)?
            .set_default("load_policy", "abort")?
            .set_default("override", false)?
            .set_default("dry_run", false)?;
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(true));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("PEEK"))
            .set_override_option("rules", path_value(&overrides.rules))?
            .set_override_option("state", path_value(&overrides.state))?
            .set_override_option("max_resolvers", overrides.max_resolvers.map(|n| n as i64))?
            .set_override_option("override", overrides.override_existing.then_some(true))?
            .set_override_option("dry_run", overrides.dry_run.then_some(true))?
            .build()?
            .try_deserialize()?;
        if settings.max_resolvers == 0 {
            return Err(PeekError::Config("max_resolvers must be at least 1".into()));
        }
        Ok(settings)
    }
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            max_resolvers: self.max_resolvers,
            override_existing: self.override_existing,
            dry_run: self.dry_run,
        }
    }
}
