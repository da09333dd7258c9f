//! drydock - An HDL testbench runner for the Xilinx Vivado XSim simulator
//!
//! This crate provides the core library functionality for drydock: the
//! project model, the XSim command-construction and invocation pipeline,
//! and the operations the CLI commands delegate to.

pub mod core;
pub mod ops;
pub mod sim;
pub mod util;

pub use self::core::{HdlKind, Library, Project, SourceFile, Testbench};
pub use self::sim::{RunOptions, SimulationConfig, XsimSimulator};
