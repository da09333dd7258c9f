//! The project manifest (`Drydock.toml`) and the read-only project model
//! the simulator backend consumes.
//!
//! A manifest declares ordered libraries (with glob file patterns) and
//! testbenches. File order within the manifest is the compile order;
//! drydock does not scan HDL content to discover dependencies.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::sim::options::SimOptions;
use crate::util::fs::glob_files;

use super::library::Library;
use super::source_file::SourceFile;

/// Manifest file name expected at the project root.
pub const MANIFEST_FILE: &str = "Drydock.toml";

#[derive(Debug, Deserialize)]
struct Manifest {
    project: ProjectSection,
    #[serde(default, rename = "library")]
    libraries: Vec<LibrarySection>,
    #[serde(default, rename = "testbench")]
    testbenches: Vec<TestbenchSection>,
}

#[derive(Debug, Deserialize)]
struct ProjectSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LibrarySection {
    name: String,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    include_dirs: Vec<PathBuf>,
    #[serde(default)]
    defines: toml::Table,
}

#[derive(Debug, Deserialize)]
struct TestbenchSection {
    name: String,
    library: String,
    top: String,
    #[serde(default)]
    resources: Vec<PathBuf>,
    #[serde(default)]
    generics: toml::Table,
    #[serde(default)]
    options: toml::Table,
}

/// One testbench declaration from the manifest.
#[derive(Debug, Clone)]
pub struct Testbench {
    /// Testbench name (the `sim` argument)
    pub name: String,
    /// Library holding the top-level unit
    pub library: String,
    /// Top-level unit name
    pub top: String,
    /// Elaboration generics, in manifest order
    pub generics: Vec<(String, String)>,
    /// Resource files staged into the run directory, resolved against root
    pub resources: Vec<PathBuf>,
    /// Namespaced simulator options
    pub options: SimOptions,
}

/// A loaded project: ordered libraries, source files, and testbenches.
#[derive(Debug)]
pub struct Project {
    /// Project name from the manifest
    pub name: String,
    /// Directory containing the manifest
    pub root: PathBuf,
    /// Library names, in manifest order
    pub library_names: Vec<String>,
    /// Source files in compile order (manifest order)
    pub source_files: Vec<SourceFile>,
    /// Declared testbenches
    pub testbenches: Vec<Testbench>,
}

impl Project {
    /// Load a project from its manifest file.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(manifest_path)
            .with_context(|| format!("failed to read manifest: {}", manifest_path.display()))?;
        let manifest: Manifest = toml::from_str(&contents)
            .with_context(|| format!("failed to parse manifest: {}", manifest_path.display()))?;

        let root = manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let mut library_names = Vec::new();
        let mut source_files = Vec::new();

        for lib in &manifest.libraries {
            library_names.push(lib.name.clone());

            let include_dirs: Vec<PathBuf> = lib
                .include_dirs
                .iter()
                .map(|d| resolve(&root, d))
                .collect();
            let defines = table_to_pairs(&lib.defines);

            let files = glob_files(&root, &lib.files)?;
            if files.is_empty() && !lib.files.is_empty() {
                tracing::warn!("library `{}` matched no source files", lib.name);
            }

            for path in files {
                let mut file = SourceFile::new(path, &lib.name);
                file.include_dirs = include_dirs.clone();
                file.defines = defines.clone();
                source_files.push(file);
            }
        }

        let mut testbenches = Vec::new();
        for tb in &manifest.testbenches {
            if !library_names.iter().any(|n| n == &tb.library) {
                bail!(
                    "testbench `{}` references unknown library `{}`",
                    tb.name,
                    tb.library
                );
            }
            testbenches.push(Testbench {
                name: tb.name.clone(),
                library: tb.library.clone(),
                top: tb.top.clone(),
                generics: table_to_pairs(&tb.generics),
                resources: tb.resources.iter().map(|r| resolve(&root, r)).collect(),
                options: SimOptions::from_toml_table(&tb.options),
            });
        }

        Ok(Project {
            name: manifest.project.name,
            root,
            library_names,
            source_files,
            testbenches,
        })
    }

    /// Materialize the library table with directories under `dir`.
    pub fn libraries_under(&self, dir: &Path) -> Vec<Library> {
        self.library_names
            .iter()
            .map(|name| Library::new(name.clone(), dir.join(name)))
            .collect()
    }

    /// Look up a testbench by name.
    pub fn find_testbench(&self, name: &str) -> Option<&Testbench> {
        self.testbenches.iter().find(|tb| tb.name == name)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Flatten a TOML table into ordered name/value string pairs.
fn table_to_pairs(table: &toml::Table) -> Vec<(String, String)> {
    table
        .iter()
        .map(|(k, v)| {
            let value = match v {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
