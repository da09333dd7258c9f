//! High-level operations the CLI commands delegate to.

pub mod run;
