//! Host-platform command formatting.
//!
//! xsim on Windows only understands the quoted arguments produced by the
//! library-mapping code if the whole command reaches it through the shell as
//! a single line; handing the vector to CreateProcess re-escapes the quotes
//! and the tool rejects its own arguments. Everywhere else the argument
//! vector is executed directly.
//!
//! Formatting is pure and must be applied exactly once, immediately before
//! the command is handed to process execution; a joined string no longer
//! composes with further argument appends.

use std::path::PathBuf;

use crate::util::process::ProcessBuilder;

/// The host operating-system family, as far as xsim quirks are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Unix,
    Windows,
}

impl HostPlatform {
    /// Detect the platform this process is running on.
    pub fn current() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Unix
        }
    }

    /// Whether xsim's library-path and quoting workarounds apply.
    pub fn has_library_path_quirk(self) -> bool {
        matches!(self, HostPlatform::Windows)
    }
}

/// A command under construction: program plus argument vector.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }
}

/// A command formatted for execution on a specific host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Direct execution of program + argument vector
    Argv { program: PathBuf, args: Vec<String> },
    /// One shell line (Windows: the quoting workaround depends on it)
    Shell(String),
}

impl Invocation {
    /// Turn the invocation into a runnable process builder.
    pub fn to_process(&self) -> ProcessBuilder {
        match self {
            Invocation::Argv { program, args } => ProcessBuilder::new(program).args(args),
            Invocation::Shell(line) => ProcessBuilder::shell(line.clone()),
        }
    }

    /// Render the command for logging and `plan` output.
    pub fn display(&self) -> String {
        match self {
            Invocation::Argv { program, args } => {
                let mut parts = vec![program.display().to_string()];
                parts.extend(args.iter().cloned());
                parts.join(" ")
            }
            Invocation::Shell(line) => line.clone(),
        }
    }
}

/// Normalize a command into the form the host's execution path expects.
pub fn format_for_host(spec: CommandSpec, host: HostPlatform) -> Invocation {
    match host {
        HostPlatform::Windows => {
            let mut parts = vec![spec.program.display().to_string()];
            parts.extend(spec.args);
            Invocation::Shell(parts.join(" "))
        }
        HostPlatform::Unix => Invocation::Argv {
            program: spec.program,
            args: spec.args,
        },
    }
}
