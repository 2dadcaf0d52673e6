use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeekError {
    #[error("Invalid fact: {fact:?}")]
    InvalidFact { fact: String },
    #[error("Invalid fact on line {line} of {path}: {fact:?}")]
    InvalidStoredFact { path: PathBuf, line: usize, fact: String },
    #[error("Rule compile error for {path}: {reason}")]
    RuleCompile { path: PathBuf, reason: String },
    #[error("Resource error: {0}")]
    Resource(String),
    #[error("Persistence error for {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, PeekError>;

// Helper conversions
impl From<config::ConfigError> for PeekError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl PeekError {
    pub fn resource(what: &str, e: std::io::Error) -> Self {
        Self::Resource(format!("{what}: {e}"))
    }
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
