//! Core data model: libraries, source files, and the project manifest.

pub mod library;
pub mod project;
pub mod source_file;

pub use library::Library;
pub use project::{Project, Testbench};
pub use source_file::{HdlKind, SourceFile};
