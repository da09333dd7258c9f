//! Subprocess execution utilities.

use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

/// Errors from running an external tool.
///
/// `NonZeroExit` is the one condition callers are expected to recover from;
/// everything else is a hard failure (missing executable, broken pipe).
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}")]
    NonZeroExit { command: String, status: ExitStatus },

    #[error("failed to read output of `{command}`")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Create a builder that runs a single command line through the
    /// platform shell (`cmd /C` on Windows, `sh -c` elsewhere).
    pub fn shell(line: impl Into<String>) -> Self {
        let (program, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        ProcessBuilder {
            program: PathBuf::from(program),
            args: vec![flag.to_string(), line.into()],
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command, forwarding its stdout line by line as it is
    /// produced. Stderr goes straight to the terminal. Blocks until the
    /// child exits; a non-zero exit is reported as
    /// [`ProcessError::NonZeroExit`].
    pub fn stream_output(&self) -> Result<(), ProcessError> {
        let mut child = self
            .build_command()
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: self.display_command(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let line = line.map_err(|source| ProcessError::Io {
                    command: self.display_command(),
                    source,
                })?;
                println!("{}", line);
            }
        }

        let status = child.wait().map_err(|source| ProcessError::Io {
            command: self.display_command(),
            source,
        })?;

        if !status.success() {
            return Err(ProcessError::NonZeroExit {
                command: self.display_command(),
                status,
            });
        }

        Ok(())
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}
