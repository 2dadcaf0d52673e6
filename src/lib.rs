//! Peek – an incremental discovery engine.
//!
//! Peek keeps a set of *facts* (data points) about an environment. A fact is
//! a hierarchical key with an optional value, such as `host:db1:port=5432`.
//! Newly learned facts are matched against a library of *rules*; every match
//! runs the rule's resolver executable with the fact as its argument, and each
//! line the resolver prints is learned as a new fact in turn. Discovery stops
//! when no rule produces new work, and the facts are kept for the next run so
//! that discovery is incremental.
//!
//! ## Modules
//! * [`fact`] – Fact grammar and the hierarchical, numeric-aware key order.
//! * [`store`] – The [`store::FactStore`], an ordered set of facts unique by key.
//! * [`persist`] – Line-oriented state file loading and saving.
//! * [`glob`] – Extended shell globs used to prune facts in bulk.
//! * [`rule`] – Rules compiled from resolver file names, and the [`rule::RuleSet`].
//! * [`scheduler`] – The resolution task state machine with its concurrency ceiling.
//! * [`process`] – Resolver processes supervised with `tokio::process`.
//! * [`discovery`] – The event loop tying input, resolvers and signals together.
//! * [`settings`] – Layered configuration.
//!
//! ## Rules
//! A rule is an executable named `<name>:<pattern>`. The pattern is matched
//! against fact keys; an empty segment (`::`) stands for any single segment
//! and a trailing `:` leaves the last segment open, so `web:host::port:`
//! matches `host:db1:port:5432` but not `host:db1:5432`.
//!
//! ## Quick Start
//! ```
//! use peek::store::FactStore;
//! let mut facts = FactStore::new();
//! assert!(facts.add("host:10").unwrap());
//! assert!(facts.add("host:2=up").unwrap());
//! assert!(!facts.add("host:2=down").unwrap());
//! assert_eq!(facts.iter().collect::<Vec<_>>(), vec!["host:2=up", "host:10"]);
//! ```

pub mod discovery;
pub mod error;
pub mod fact;
pub mod glob;
pub mod persist;
pub mod process;
pub mod rule;
pub mod scheduler;
pub mod settings;
pub mod store;

pub use error::{PeekError, Result};
