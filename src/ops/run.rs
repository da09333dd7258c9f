//! Compile a project and run its testbenches.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::core::{Project, Testbench};
use crate::sim::xsim::{find_prefix, RunOptions, XsimSimulator, STARTUP_SCRIPT};
use crate::sim::SimulationConfig;
use crate::util::fs::ensure_dir;
use crate::util::process::ProcessError;

/// Where a project's simulation artifacts live.
///
/// ```text
/// <root>/libraries/<name>         compiled library directories
/// <root>/test_output/<tb>/xsim    per-testbench run directories
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Root of the output tree
    pub root: PathBuf,
}

impl OutputLayout {
    /// Compute the layout: explicit override, else `drydock_out` under the
    /// project root.
    pub fn new(project_root: &Path, override_dir: Option<&Path>) -> Self {
        let root = match override_dir {
            Some(dir) => dir.to_path_buf(),
            None => project_root.join("drydock_out"),
        };
        OutputLayout { root }
    }

    /// Directory holding the compiled libraries.
    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    /// Run directory for one testbench.
    pub fn test_dir(&self, testbench: &str) -> PathBuf {
        self.root.join("test_output").join(testbench).join("xsim")
    }
}

/// Resolve the toolchain, build the simulator, and map the project's
/// libraries into the output layout.
pub fn create_simulator(
    project: &Project,
    layout: &OutputLayout,
    prefix: Option<&Path>,
    options: &RunOptions,
) -> Result<XsimSimulator> {
    let prefix = find_prefix(prefix, &project.root)?;
    let mut simulator = XsimSimulator::new(&prefix, options)?;
    simulator.map_libraries(project.libraries_under(&layout.libraries_dir()))?;
    Ok(simulator)
}

/// Compile every source file of the project, in manifest order.
///
/// Any compiler failure aborts the run: a broken unit makes everything
/// after it in the dependency order meaningless.
pub fn compile_project(
    simulator: &XsimSimulator,
    project: &Project,
    layout: &OutputLayout,
    verbose: bool,
) -> Result<()> {
    let start = Instant::now();

    ensure_dir(&layout.root)?;
    for library in simulator.libraries().entries() {
        if let Some(directory) = &library.directory {
            ensure_dir(directory)?;
        }
    }

    let total = project.source_files.len();
    let pb = if !verbose && total > 1 {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    for file in &project.source_files {
        if verbose {
            eprintln!("   Compiling {}", file.path.display());
        }
        if let Some(pb) = &pb {
            pb.set_message(
                file.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }

        let command = simulator
            .compile_command(file)
            .with_context(|| format!("cannot compile {}", file.path.display()))?;
        tracing::debug!("compile: {}", command.display());

        match command.to_process().cwd(&layout.root).stream_output() {
            Ok(()) => {}
            Err(ProcessError::NonZeroExit { command, status }) => {
                bail!(
                    "compilation of {} failed: `{}` exited with {}",
                    file.path.display(),
                    command,
                    status
                );
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("cannot compile {}", file.path.display()));
            }
        }

        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    eprintln!(
        "    Finished compiling {} file(s) in {:.2}s",
        total,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Build the simulation configuration for a testbench declaration.
pub fn simulation_config(testbench: &Testbench) -> SimulationConfig {
    SimulationConfig {
        library_name: testbench.library.clone(),
        top: testbench.top.clone(),
        generics: testbench.generics.clone(),
        sim_options: testbench.options.clone(),
        resources: testbench.resources.clone(),
    }
}

/// Run one testbench; returns whether both phases succeeded.
pub fn run_testbench(
    simulator: &XsimSimulator,
    project: &Project,
    testbench: &str,
    layout: &OutputLayout,
    elaborate_only: bool,
) -> Result<bool> {
    let tb = project.find_testbench(testbench).with_context(|| {
        format!(
            "no testbench named `{}` in project `{}`",
            testbench, project.name
        )
    })?;

    let config = simulation_config(tb);
    let output = layout.test_dir(&tb.name);
    let suite = format!("{}.{}", tb.library, tb.name);
    simulator.simulate(&output, &suite, &config, elaborate_only)
}

/// Every command drydock would run for this project, as JSON.
pub fn plan_json(
    simulator: &XsimSimulator,
    project: &Project,
    layout: &OutputLayout,
) -> Result<serde_json::Value> {
    let compile = project
        .source_files
        .iter()
        .map(|file| {
            let command = simulator
                .compile_command(file)
                .with_context(|| format!("cannot compile {}", file.path.display()))?;
            Ok(serde_json::json!({
                "file": file.path.display().to_string(),
                "library": file.library_name,
                "command": command.display(),
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    let testbenches: Vec<_> = project
        .testbenches
        .iter()
        .map(|tb| {
            let config = simulation_config(tb);
            let script = layout.test_dir(&tb.name).join(STARTUP_SCRIPT);
            serde_json::json!({
                "name": tb.name,
                "elaborate": simulator.elaborate_command(&config).display(),
                "simulate": simulator.simulate_command(&script, None).display(),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "compile": compile,
        "testbench": testbenches,
    }))
}
