//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// drydock - An HDL testbench runner for the Xilinx Vivado XSim simulator
#[derive(Parser)]
#[command(name = "drydock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the project manifest (defaults to ./Drydock.toml)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the project's HDL sources into their libraries
    Compile(CompileArgs),

    /// Compile, elaborate, and simulate a testbench
    Sim(SimArgs),

    /// Print the commands a run would execute, as JSON
    Plan(PlanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Flags shared by every command that touches the toolchain.
#[derive(Args)]
pub struct ToolchainOpts {
    /// Vivado bin directory holding the xsim executables
    #[arg(long)]
    pub prefix: Option<PathBuf>,

    /// Output directory (defaults to <project>/drydock_out)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompileArgs {
    #[command(flatten)]
    pub toolchain: ToolchainOpts,
}

#[derive(Args)]
pub struct SimArgs {
    /// Testbench to run (as named in Drydock.toml)
    pub testbench: String,

    #[command(flatten)]
    pub toolchain: ToolchainOpts,

    /// Open the simulator GUI instead of running batch
    #[arg(long)]
    pub gui: bool,

    /// Stop after elaboration
    #[arg(long)]
    pub elaborate_only: bool,

    /// Enable VCD waveform capture
    #[arg(long)]
    pub vcd: bool,

    /// VCD output path (absolute, or relative to the project root)
    #[arg(long)]
    pub vcd_path: Option<PathBuf>,

    /// Serialize xelab invocations across concurrent runs
    #[arg(long)]
    pub xelab_limit: bool,

    /// Wave configuration file to load on GUI startup
    #[arg(long)]
    pub view: Option<PathBuf>,

    /// Skip compilation and reuse existing libraries
    #[arg(long)]
    pub no_compile: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub toolchain: ToolchainOpts,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
