//! `drydock plan` command
//!
//! Prints every command a run would execute, without invoking anything.

use std::path::Path;

use anyhow::Result;

use crate::cli::PlanArgs;
use drydock::ops::run::{create_simulator, plan_json, OutputLayout};
use drydock::RunOptions;

pub fn execute(args: PlanArgs, manifest: Option<&Path>) -> Result<()> {
    let project = super::load_project(manifest)?;
    let layout = OutputLayout::new(&project.root, args.toolchain.output_dir.as_deref());

    let simulator = create_simulator(
        &project,
        &layout,
        args.toolchain.prefix.as_deref(),
        &RunOptions::default(),
    )?;

    let plan = plan_json(&simulator, &project, &layout)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
