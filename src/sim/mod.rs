//! Simulator backend: options, platform command formatting, and the XSim
//! adapter itself.

pub mod options;
pub mod platform;
pub mod xsim;

pub use options::{OptionValue, SimOptions, SimulationConfig};
pub use platform::{format_for_host, CommandSpec, HostPlatform, Invocation};
pub use xsim::{find_prefix, LibraryTable, RunOptions, SimError, XsimSimulator};
