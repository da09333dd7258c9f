//! CLI command implementations.

pub mod compile;
pub mod completions;
pub mod plan;
pub mod sim;

use std::path::Path;

use anyhow::{bail, Result};

use drydock::core::project::MANIFEST_FILE;
use drydock::Project;

/// Load the project from `--manifest` or `./Drydock.toml`.
pub fn load_project(manifest: Option<&Path>) -> Result<Project> {
    let path = match manifest {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?.join(MANIFEST_FILE),
    };

    if !path.exists() {
        bail!(
            "no {} found at {}\n\
             help: run inside a project directory or pass --manifest",
            MANIFEST_FILE,
            path.display()
        );
    }

    Project::load(&path)
}
