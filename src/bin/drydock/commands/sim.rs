//! `drydock sim` command

use std::path::Path;

use anyhow::{bail, Result};

use crate::cli::SimArgs;
use drydock::ops::run::{compile_project, create_simulator, run_testbench, OutputLayout};
use drydock::RunOptions;

pub fn execute(args: SimArgs, manifest: Option<&Path>, verbose: bool) -> Result<()> {
    let project = super::load_project(manifest)?;
    let layout = OutputLayout::new(&project.root, args.toolchain.output_dir.as_deref());

    let options = RunOptions {
        gui: args.gui,
        vcd_path: args.vcd_path.clone(),
        vcd_enable: args.vcd,
        serialize_elaboration: args.xelab_limit,
        view: args.view.clone(),
    };

    let simulator = create_simulator(
        &project,
        &layout,
        args.toolchain.prefix.as_deref(),
        &options,
    )?;

    if !args.no_compile {
        compile_project(&simulator, &project, &layout, verbose)?;
    }

    let passed = run_testbench(
        &simulator,
        &project,
        &args.testbench,
        &layout,
        args.elaborate_only,
    )?;

    if !passed {
        bail!("testbench `{}` failed", args.testbench);
    }

    eprintln!("    Finished {}", args.testbench);
    Ok(())
}
