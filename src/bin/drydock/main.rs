//! drydock CLI - an HDL testbench runner for Vivado XSim

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("drydock=debug")
    } else {
        EnvFilter::new("drydock=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Compile(args) => commands::compile::execute(args, cli.manifest.as_deref(), cli.verbose),
        Commands::Sim(args) => commands::sim::execute(args, cli.manifest.as_deref(), cli.verbose),
        Commands::Plan(args) => commands::plan::execute(args, cli.manifest.as_deref()),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
