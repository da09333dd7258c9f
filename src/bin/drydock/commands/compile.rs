//! `drydock compile` command

use std::path::Path;

use anyhow::Result;

use crate::cli::CompileArgs;
use drydock::ops::run::{compile_project, create_simulator, OutputLayout};
use drydock::RunOptions;

pub fn execute(args: CompileArgs, manifest: Option<&Path>, verbose: bool) -> Result<()> {
    let project = super::load_project(manifest)?;
    let layout = OutputLayout::new(&project.root, args.toolchain.output_dir.as_deref());

    let simulator = create_simulator(
        &project,
        &layout,
        args.toolchain.prefix.as_deref(),
        &RunOptions::default(),
    )?;

    compile_project(&simulator, &project, &layout, verbose)
}
