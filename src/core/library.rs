//! Logical HDL libraries.

use std::path::PathBuf;

/// A logical library and its on-disk location.
///
/// A `None` directory means "resolve by name only", used for libraries
/// precompiled into the simulator's own library store, which must be named
/// on the command line without a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    /// Logical library name (unique within a project)
    pub name: String,
    /// Directory holding the compiled artifacts, if mapped
    pub directory: Option<PathBuf>,
}

impl Library {
    /// Create a library mapped to a directory.
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Library {
            name: name.into(),
            directory: Some(directory.into()),
        }
    }

    /// Create a name-only library (simulator-builtin precompiled).
    pub fn builtin(name: impl Into<String>) -> Self {
        Library {
            name: name.into(),
            directory: None,
        }
    }
}
