//! Backend for the Xilinx Vivado XSim simulator.
//!
//! Drives the four toolchain executables: `xvhdl`/`xvlog` compile sources
//! into libraries, `xelab` links compiled units into an executable snapshot,
//! and `xsim` loads and runs the snapshot under a generated Tcl session
//! script.
//!
//! Two Windows-specific quirks shape this module. xsim resolves a library
//! given as `-L name=path` by looking in `path/xsim.dir/work`, which means
//! precompiled libraries shipped with the tool must be named *without* a
//! path (see [`LibraryTable::strip_precompiled`]). And the quoting those
//! rewritten arguments need only survives when the whole command is handed
//! to the shell as a single line (see [`crate::sim::platform`]).

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context, Result};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::{HdlKind, Library, SourceFile};
use crate::sim::options::SimulationConfig;
use crate::sim::platform::{format_for_host, CommandSpec, HostPlatform, Invocation};
use crate::util::config::{
    global_toolchain_config_path, load_toolchain_config, project_toolchain_config_path,
};
use crate::util::fs::{
    absolute, copy_dir_all, copy_into, ensure_dir, posix_path, read_to_string,
    remove_file_if_exists, write_string,
};
use crate::util::process::ProcessError;

/// Name of the elaborated snapshot xelab produces and xsim loads.
pub const SNAPSHOT_NAME: &str = "drydock_test";

/// Session script file written into the run directory.
pub const STARTUP_SCRIPT: &str = "xsim_startup.tcl";

/// Errors from the simulator backend.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("cannot compile `{path}`: unsupported file type `{kind}`")]
    UnsupportedFileType { path: PathBuf, kind: HdlKind },

    #[error("cannot find `{tool}` under {prefix}")]
    ToolNotFound { tool: String, prefix: PathBuf },
}

/// Run-time switches for a simulator instance, supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Open the simulator GUI instead of running batch
    pub gui: bool,
    /// VCD waveform output path override
    pub vcd_path: Option<PathBuf>,
    /// Enable VCD waveform capture
    pub vcd_enable: bool,
    /// Serialize xelab invocations across concurrent runs
    pub serialize_elaboration: bool,
    /// Wave-viewer configuration file to load on GUI startup
    pub view: Option<PathBuf>,
}

/// Ordered name→directory mapping for the `-L` library arguments.
///
/// Insertion order is what ends up on the command line, and xsim is
/// order-sensitive for library resolution, so this is `Vec`-backed rather
/// than a hash map. Re-inserting a name replaces its directory but keeps
/// its original position.
#[derive(Debug, Clone, Default)]
pub struct LibraryTable {
    entries: Vec<Library>,
}

impl LibraryTable {
    /// Build a table from an ordered library list (last write wins).
    pub fn from_libraries(libraries: impl IntoIterator<Item = Library>) -> Self {
        let mut table = LibraryTable::default();
        for library in libraries {
            table.insert(library);
        }
        table
    }

    /// Insert a library, replacing any previous entry with the same name.
    pub fn insert(&mut self, library: Library) {
        match self.entries.iter_mut().find(|e| e.name == library.name) {
            Some(existing) => existing.directory = library.directory,
            None => self.entries.push(library),
        }
    }

    /// Look up a library by name.
    pub fn get(&self, name: &str) -> Option<&Library> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[Library] {
        &self.entries
    }

    /// Produce a new table with the directory cleared for every library
    /// that is precompiled into the simulator's own store.
    ///
    /// `init_file` is the toolchain's `xsim.ini`; lines of the form
    /// `name = path` name the precompiled libraries. A precompiled library
    /// given with an explicit path would be resolved under
    /// `path/xsim.dir/work`, which does not exist for shipped libraries, so
    /// the path is dropped and the tool resolves the name on its own.
    pub fn strip_precompiled(&self, init_file: &Path) -> Result<LibraryTable> {
        let pattern = Regex::new(r"^(?P<name>\w+)\s*=\s*(?P<path>.+)")
            .expect("static regex is valid");

        let contents = read_to_string(init_file)?;
        let precompiled: Vec<&str> = contents
            .lines()
            .filter_map(|line| pattern.captures(line))
            .map(|caps| caps.name("name").expect("group is mandatory").as_str())
            .collect();

        let entries = self
            .entries
            .iter()
            .map(|library| {
                if precompiled.contains(&library.name.as_str()) {
                    Library::builtin(library.name.clone())
                } else {
                    library.clone()
                }
            })
            .collect();

        Ok(LibraryTable { entries })
    }

    /// The `-L` argument pairs for every mapped library.
    pub fn library_args(&self, host: HostPlatform) -> Vec<String> {
        let mut args = Vec::new();
        for library in &self.entries {
            match &library.directory {
                Some(directory) => {
                    args.push("-L".to_string());
                    args.push(mapping_arg(&library.name, directory, host));
                }
                None => {
                    args.push("-L".to_string());
                    args.push(library.name.clone());
                }
            }
        }
        args
    }
}

/// Render one `name=directory` mapping, applying the Windows rewrite:
/// extra quotes around the whole argument, and the `xsim.dir/work`
/// subdirectory the tool actually reads from.
fn mapping_arg(name: &str, directory: &Path, host: HostPlatform) -> String {
    if host.has_library_path_quirk() {
        let rewritten = directory.join("xsim.dir").join("work");
        format!("\"{}={}\"", name, rewritten.display())
    } else {
        format!("{}={}", name, directory.display())
    }
}

/// The XSim simulator backend.
#[derive(Debug)]
pub struct XsimSimulator {
    prefix: PathBuf,
    host: HostPlatform,
    xvlog: String,
    xvhdl: String,
    xelab: String,
    xsim: String,
    init_file: PathBuf,
    gui: bool,
    vcd_path: Option<PathBuf>,
    vcd_enable: bool,
    view: Option<PathBuf>,
    elab_gate: Option<Mutex<()>>,
    libraries: LibraryTable,
}

impl XsimSimulator {
    /// Create a simulator backend for the toolchain under `prefix`.
    ///
    /// Fails with [`SimError::ToolNotFound`] if any of the four executables
    /// is missing.
    pub fn new(prefix: &Path, options: &RunOptions) -> Result<Self, SimError> {
        Self::with_host(prefix, options, HostPlatform::current())
    }

    /// Like [`XsimSimulator::new`] with an explicit host platform.
    pub fn with_host(
        prefix: &Path,
        options: &RunOptions,
        host: HostPlatform,
    ) -> Result<Self, SimError> {
        let xvlog = check_tool(prefix, "xvlog")?;
        let xvhdl = check_tool(prefix, "xvhdl")?;
        let xelab = check_tool(prefix, "xelab")?;
        let xsim = check_tool(prefix, "xsim")?;
        let init_file = prefix.join("..").join("data").join("xsim").join("xsim.ini");

        Ok(XsimSimulator {
            prefix: prefix.to_path_buf(),
            host,
            xvlog,
            xvhdl,
            xelab,
            xsim,
            init_file,
            gui: options.gui,
            vcd_path: options.vcd_path.clone(),
            vcd_enable: options.vcd_enable,
            view: options.view.clone(),
            elab_gate: options.serialize_elaboration.then(|| Mutex::new(())),
            libraries: LibraryTable::default(),
        })
    }

    /// Set up the library mapping from the project's ordered library list.
    ///
    /// On hosts with the library-path quirk this also strips the paths of
    /// precompiled libraries found in the toolchain's `xsim.ini`.
    pub fn map_libraries(&mut self, libraries: Vec<Library>) -> Result<()> {
        let table = LibraryTable::from_libraries(libraries);
        self.libraries = if self.host.has_library_path_quirk() {
            table.strip_precompiled(&self.init_file)?
        } else {
            table
        };
        Ok(())
    }

    /// The current library table.
    pub fn libraries(&self) -> &LibraryTable {
        &self.libraries
    }

    /// Build the command compiling one source file into its owning library.
    pub fn compile_command(&self, file: &SourceFile) -> Result<Invocation> {
        let spec = match file.kind {
            HdlKind::Vhdl => self.vhdl_compile_spec(file)?,
            HdlKind::Verilog => self.verilog_compile_spec(file, false)?,
            HdlKind::SystemVerilog => self.verilog_compile_spec(file, true)?,
            HdlKind::Unknown => {
                tracing::error!("unknown file type: {}", file.path.display());
                return Err(SimError::UnsupportedFileType {
                    path: file.path.clone(),
                    kind: file.kind,
                }
                .into());
            }
        };
        Ok(format_for_host(spec, self.host))
    }

    fn vhdl_compile_spec(&self, file: &SourceFile) -> Result<CommandSpec> {
        let spec = CommandSpec::new(self.prefix.join(&self.xvhdl))
            .arg(file.path.display().to_string())
            .arg("-2008")
            .args(self.work_library_args(file)?)
            .args(self.libraries.library_args(self.host));
        Ok(spec)
    }

    fn verilog_compile_spec(&self, file: &SourceFile, system_verilog: bool) -> Result<CommandSpec> {
        let mut spec = CommandSpec::new(self.prefix.join(&self.xvlog));
        if system_verilog {
            spec = spec.arg("--sv");
        }
        spec = spec
            .arg(file.path.display().to_string())
            .args(self.work_library_args(file)?)
            .args(self.libraries.library_args(self.host));

        for dir in &file.include_dirs {
            spec = spec.args(["--include".to_string(), dir.display().to_string()]);
        }
        for (name, value) in &file.defines {
            spec = spec.args(["--define".to_string(), format!("{}={}", name, value)]);
        }
        Ok(spec)
    }

    /// The `-work name=directory` argument placing compiled units into the
    /// file's owning library. Same rewrite and quoting as the `-L` table.
    fn work_library_args(&self, file: &SourceFile) -> Result<Vec<String>> {
        let library = self
            .libraries
            .get(&file.library_name)
            .with_context(|| format!("library `{}` is not mapped", file.library_name))?;
        let directory = library
            .directory
            .as_deref()
            .with_context(|| format!("library `{}` has no directory", library.name))?;

        Ok(vec![
            "-work".to_string(),
            mapping_arg(&library.name, directory, self.host),
        ])
    }

    /// Build the xelab command elaborating `config` into the snapshot.
    pub fn elaborate_command(&self, config: &SimulationConfig) -> Invocation {
        let mut spec = CommandSpec::new(self.prefix.join(&self.xelab))
            .args(["-debug", "typical"])
            .args(self.libraries.library_args(self.host))
            .args([
                "--notimingchecks",
                "--nospecify",
                "--nolog",
                "--relax",
                "--incr",
                "--sdfnowarn",
                "--stats",
                "--O0",
            ])
            .args(["--snapshot", SNAPSHOT_NAME])
            .arg(format!("{}.{}", config.library_name, config.top));

        if config.sim_options.get_bool("xsim.enable_glbl").unwrap_or(false) {
            spec = spec.arg(format!("{}.glbl", config.library_name));
        }

        if let Some(timescale) = config.sim_options.get_str("xsim.timescale") {
            spec = spec.args(["-timescale", timescale]);
        }

        for (name, value) in &config.generics {
            let pair = if self.host.has_library_path_quirk() {
                format!("\"{}={}\"", name, value)
            } else {
                format!("{}={}", name, value)
            };
            spec = spec.args(["--generic_top".to_string(), pair]);
        }

        if let Some(extra) = config.sim_options.get_list("xsim.xelab_flags") {
            spec = spec.args(extra.iter().cloned());
        }

        format_for_host(spec, self.host)
    }

    /// Build the xsim command running the snapshot under `script`.
    pub fn simulate_command(&self, script: &Path, view: Option<&Path>) -> Invocation {
        let mut spec = CommandSpec::new(self.prefix.join(&self.xsim)).arg(SNAPSHOT_NAME);
        if self.gui {
            spec = spec.arg("--gui");
        }
        spec = spec.args(["--tclbatch".to_string(), posix_path(script)]);
        if let Some(view) = view {
            spec = spec.args(["--view".to_string(), posix_path(view)]);
        }
        format_for_host(spec, self.host)
    }

    /// Elaborate and run one testbench.
    ///
    /// Returns `Ok(false)` when xelab or xsim exits non-zero; both phases
    /// run (unless `elaborate_only`) and their results AND together, so a
    /// failed elaboration does not skip the simulation attempt. Staging and
    /// I/O errors, and a missing executable, propagate as hard errors.
    pub fn simulate(
        &self,
        output_path: &Path,
        test_suite_name: &str,
        config: &SimulationConfig,
        elaborate_only: bool,
    ) -> Result<bool> {
        info!("running {}", test_suite_name);

        let output_path = absolute(output_path)?;
        let run_root = absolute(&output_path.join("../../../.."))?;

        let vcd_path = self.resolve_vcd_path(&output_path, &run_root);
        let view = self.resolve_view(config, &run_root);

        let elaborate = self.elaborate_command(config);

        self.stage_run_directory(&output_path, config)?;

        debug!("elaborate: {}", elaborate.display());
        let mut status = true;
        let elab_result = {
            let _gate = self.elab_guard();
            elaborate.to_process().cwd(&output_path).stream_output()
        };
        match elab_result {
            Ok(()) => {}
            Err(ProcessError::NonZeroExit { .. }) => status = false,
            Err(err) => return Err(err.into()),
        }

        if !elaborate_only {
            let script = output_path.join(STARTUP_SCRIPT);
            self.write_startup_script(&script, &vcd_path)?;

            let sim_command = self.simulate_command(&script, view.as_deref());
            info!("{}", sim_command.display());
            match sim_command.to_process().cwd(&output_path).stream_output() {
                Ok(()) => {}
                Err(ProcessError::NonZeroExit { .. }) => status = false,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(status)
    }

    /// Explicit override (absolute, or relative to the run root), else the
    /// default `wave.vcd` inside the run directory.
    fn resolve_vcd_path(&self, output_path: &Path, run_root: &Path) -> PathBuf {
        match &self.vcd_path {
            None => output_path.join("wave.vcd"),
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => run_root.join(path),
        }
    }

    /// CLI override wins over the `xsim.view` option; both resolve relative
    /// paths against the run root.
    fn resolve_view(&self, config: &SimulationConfig, run_root: &Path) -> Option<PathBuf> {
        let view = self
            .view
            .clone()
            .or_else(|| config.sim_options.get_str("xsim.view").map(PathBuf::from))?;
        if view.is_absolute() {
            Some(view)
        } else {
            Some(run_root.join(view))
        }
    }

    /// Bring the run directory into the state xelab expects: the compiled
    /// library tree next to it, the directory itself present, and every
    /// declared resource staged under its base name.
    fn stage_run_directory(&self, output_path: &Path, config: &SimulationConfig) -> Result<()> {
        let library = self
            .libraries
            .get(&config.library_name)
            .with_context(|| format!("library `{}` is not mapped", config.library_name))?;
        let directory = library
            .directory
            .as_deref()
            .with_context(|| format!("library `{}` has no directory", library.name))?;

        // xelab reads compiled artifacts relative to the run directory, so
        // the whole parent tree (all sibling libraries) comes along.
        let tree = directory
            .parent()
            .with_context(|| format!("library directory has no parent: {}", directory.display()))?;
        let base = tree
            .file_name()
            .with_context(|| format!("library tree has no base name: {}", tree.display()))?;
        copy_dir_all(tree, &output_path.join(base))?;

        ensure_dir(output_path)?;

        for resource in &config.resources {
            copy_into(resource, output_path)?;
        }

        Ok(())
    }

    /// Write the Tcl session script, deleting any stale waveform first.
    ///
    /// Batch mode appends `run all` and `quit` so the simulator terminates
    /// on its own; GUI mode leaves the session open.
    fn write_startup_script(&self, script: &Path, vcd_path: &Path) -> Result<()> {
        remove_file_if_exists(vcd_path)?;

        let mut contents = String::new();
        if self.vcd_enable {
            contents.push_str(&format!("open_vcd {}\n", vcd_path.display()));
            contents.push_str("log_vcd *\n");
        }
        if !self.gui {
            contents.push_str("run all\n");
            contents.push_str("quit\n");
        }
        write_string(script, &contents)
    }

    fn elab_guard(&self) -> Option<MutexGuard<'_, ()>> {
        self.elab_gate
            .as_ref()
            .map(|gate| gate.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Probe for a tool under the prefix, accepting the `.bat` wrappers Windows
/// Vivado installs use.
fn check_tool(prefix: &Path, tool: &str) -> Result<String, SimError> {
    let bat = format!("{}.bat", tool);
    if prefix.join(&bat).exists() {
        return Ok(bat);
    }
    if prefix.join(tool).exists() {
        return Ok(tool.to_string());
    }
    Err(SimError::ToolNotFound {
        tool: tool.to_string(),
        prefix: prefix.to_path_buf(),
    })
}

/// Locate the Vivado `bin` directory holding the xsim executables.
///
/// Priority: explicit `--prefix` flag, then the project and global
/// `toolchain.toml` files, then the directory of `xsim` on PATH.
pub fn find_prefix(explicit: Option<&Path>, project_root: &Path) -> Result<PathBuf> {
    if let Some(prefix) = explicit {
        return Ok(prefix.to_path_buf());
    }

    let project_path = project_toolchain_config_path(project_root);
    let config = match global_toolchain_config_path() {
        Some(global) => load_toolchain_config(&global, &project_path),
        None => load_toolchain_config(&PathBuf::new(), &project_path),
    };
    if let Some(prefix) = config.toolchain.prefix {
        return Ok(prefix);
    }

    if let Ok(xsim) = which::which("xsim") {
        if let Some(dir) = xsim.parent() {
            return Ok(dir.to_path_buf());
        }
    }

    bail!(
        "no xsim installation found\n\
         \n\
         drydock needs the Vivado simulator executables (xvlog, xvhdl, xelab, xsim).\n\
         Pass --prefix, set `toolchain.prefix` in .drydock/toolchain.toml,\n\
         or put the Vivado bin directory on PATH."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::options::{OptionValue, SimOptions};
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fake_prefix(tmp: &TempDir) -> PathBuf {
        let prefix = tmp.path().join("bin");
        fs::create_dir_all(&prefix).unwrap();
        for tool in ["xvlog", "xvhdl", "xelab", "xsim"] {
            fs::write(prefix.join(tool), "").unwrap();
        }
        // The init file lives at <prefix>/../data/xsim/xsim.ini.
        let data = tmp.path().join("data/xsim");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("xsim.ini"), "").unwrap();
        prefix
    }

    fn simulator(tmp: &TempDir, options: RunOptions, host: HostPlatform) -> XsimSimulator {
        XsimSimulator::with_host(&fake_prefix(tmp), &options, host).unwrap()
    }

    fn config(library: &str, top: &str) -> SimulationConfig {
        SimulationConfig {
            library_name: library.to_string(),
            top: top.to_string(),
            generics: Vec::new(),
            sim_options: SimOptions::new(),
            resources: Vec::new(),
        }
    }

    fn argv(invocation: &Invocation) -> Vec<String> {
        match invocation {
            Invocation::Argv { args, .. } => args.clone(),
            Invocation::Shell(line) => panic!("expected argv, got shell line `{line}`"),
        }
    }

    #[test]
    fn test_check_tool_prefers_bat() {
        let tmp = TempDir::new().unwrap();
        let prefix = fake_prefix(&tmp);
        fs::write(prefix.join("xelab.bat"), "").unwrap();

        assert_eq!(check_tool(&prefix, "xelab").unwrap(), "xelab.bat");
        assert_eq!(check_tool(&prefix, "xvlog").unwrap(), "xvlog");
    }

    #[test]
    fn test_missing_tool_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let prefix = tmp.path().join("empty");
        fs::create_dir_all(&prefix).unwrap();

        let err = XsimSimulator::new(&prefix, &RunOptions::default()).unwrap_err();
        assert!(matches!(err, SimError::ToolNotFound { ref tool, .. } if tool == "xvlog"));
    }

    #[test]
    fn test_table_insert_is_last_write_wins_keeping_position() {
        let mut table = LibraryTable::default();
        table.insert(Library::new("work", "/old"));
        table.insert(Library::new("unisim", "/unisim"));
        table.insert(Library::new("work", "/new"));

        let names: Vec<&str> = table.entries().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["work", "unisim"]);
        assert_eq!(
            table.get("work").unwrap().directory.as_deref(),
            Some(Path::new("/new"))
        );
    }

    #[test]
    fn test_strip_precompiled() {
        let tmp = TempDir::new().unwrap();
        let ini = tmp.path().join("xsim.ini");
        fs::write(
            &ini,
            "-- comment line\nunisim = /tools/xsim/unisim\nsecureip=/tools/xsim/secureip\n",
        )
        .unwrap();

        let table = LibraryTable::from_libraries([
            Library::new("work", "/proj/work"),
            Library::new("unisim", "/proj/unisim"),
            Library::new("secureip", "/proj/secureip"),
        ]);
        let stripped = table.strip_precompiled(&ini).unwrap();

        assert_eq!(
            stripped.get("work").unwrap().directory.as_deref(),
            Some(Path::new("/proj/work"))
        );
        assert!(stripped.get("unisim").unwrap().directory.is_none());
        assert!(stripped.get("secureip").unwrap().directory.is_none());
        // The input table is untouched.
        assert!(table.get("unisim").unwrap().directory.is_some());
    }

    #[test]
    fn test_library_args_unix() {
        let table = LibraryTable::from_libraries([
            Library::new("work", "/proj/work"),
            Library::builtin("unisim"),
        ]);

        assert_eq!(
            table.library_args(HostPlatform::Unix),
            vec!["-L", "work=/proj/work", "-L", "unisim"]
        );
    }

    #[test]
    fn test_library_args_windows_rewrite() {
        let table = LibraryTable::from_libraries([Library::new("work", "/proj/work")]);
        let args = table.library_args(HostPlatform::Windows);

        assert_eq!(args[0], "-L");
        let mapping = &args[1];
        assert!(mapping.starts_with("\"work="));
        assert!(mapping.contains("xsim.dir"));
        assert!(mapping.ends_with("work\""));
        // Never both forms for one name.
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_vhdl_compile_command() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        sim.map_libraries(vec![
            Library::new("rtl_lib", "/out/libraries/rtl_lib"),
            Library::builtin("unisim"),
        ])
        .unwrap();

        let file = SourceFile::new("rtl/fifo.vhd", "rtl_lib");
        let cmd = sim.compile_command(&file).unwrap();
        let args = argv(&cmd);

        assert_eq!(
            args,
            vec![
                "rtl/fifo.vhd",
                "-2008",
                "-work",
                "rtl_lib=/out/libraries/rtl_lib",
                "-L",
                "rtl_lib=/out/libraries/rtl_lib",
                "-L",
                "unisim",
            ]
        );
    }

    #[test]
    fn test_verilog_compile_command_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        sim.map_libraries(vec![Library::new("rtl_lib", "/out/libraries/rtl_lib")])
            .unwrap();

        let mut file = SourceFile::new("rtl/core.v", "rtl_lib");
        file.include_dirs = vec![PathBuf::from("inc/b"), PathBuf::from("inc/a")];
        file.defines = vec![
            ("ZETA".to_string(), "1".to_string()),
            ("ALPHA".to_string(), "2".to_string()),
        ];

        let args = argv(&sim.compile_command(&file).unwrap());
        let include_positions: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--include")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(args[include_positions[0] + 1], "inc/b");
        assert_eq!(args[include_positions[1] + 1], "inc/a");

        let define_positions: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--define")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(args[define_positions[0] + 1], "ZETA=1");
        assert_eq!(args[define_positions[1] + 1], "ALPHA=2");
    }

    #[test]
    fn test_system_verilog_gets_dialect_flag() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        sim.map_libraries(vec![Library::new("tb_lib", "/out/libraries/tb_lib")])
            .unwrap();

        let file = SourceFile::new("tb/tb_top.sv", "tb_lib");
        let args = argv(&sim.compile_command(&file).unwrap());
        assert_eq!(args[0], "--sv");
        assert_eq!(args[1], "tb/tb_top.sv");

        let plain = SourceFile::new("rtl/top.v", "tb_lib");
        let args = argv(&sim.compile_command(&plain).unwrap());
        assert!(!args.contains(&"--sv".to_string()));
    }

    #[test]
    fn test_unsupported_file_type_never_yields_a_command() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        sim.map_libraries(vec![Library::new("lib", "/out/libraries/lib")])
            .unwrap();

        let file = SourceFile::new("constraints/pins.xdc", "lib");
        let err = sim.compile_command(&file).unwrap_err();
        let sim_err = err.downcast_ref::<SimError>().unwrap();
        assert!(matches!(sim_err, SimError::UnsupportedFileType { .. }));
    }

    #[test]
    fn test_compile_command_is_shell_line_on_windows() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Windows);
        sim.map_libraries(vec![Library::new("lib", "/out/libraries/lib")])
            .unwrap();

        let file = SourceFile::new("rtl/fifo.vhd", "lib");
        let cmd = sim.compile_command(&file).unwrap();
        assert!(matches!(cmd, Invocation::Shell(_)));
    }

    #[test]
    fn test_elaborate_command_fixed_flags_and_target() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        sim.map_libraries(vec![Library::new("lib", "/out/libraries/lib")])
            .unwrap();

        let args = argv(&sim.elaborate_command(&config("lib", "top")));

        for flag in [
            "--notimingchecks",
            "--nospecify",
            "--nolog",
            "--relax",
            "--incr",
            "--sdfnowarn",
            "--stats",
            "--O0",
        ] {
            assert_eq!(args.iter().filter(|a| *a == flag).count(), 1, "{flag}");
        }
        assert_eq!(args[0], "-debug");
        assert_eq!(args[1], "typical");

        let snapshot_pos = args.iter().position(|a| a == "--snapshot").unwrap();
        assert_eq!(args[snapshot_pos + 1], SNAPSHOT_NAME);
        assert!(args.contains(&"lib.top".to_string()));
        assert!(!args.iter().any(|a| a.contains("glbl")));
        assert!(!args.contains(&"-timescale".to_string()));
    }

    #[test]
    fn test_elaborate_command_generics_glbl_timescale_extras() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        sim.map_libraries(vec![Library::new("lib", "/out/libraries/lib")])
            .unwrap();

        let mut cfg = config("lib", "top");
        cfg.generics = vec![("WIDTH".to_string(), "8".to_string())];
        cfg.sim_options.set("xsim.enable_glbl", OptionValue::Bool(true));
        cfg.sim_options
            .set("xsim.timescale", OptionValue::Str("1ns/1ps".into()));
        cfg.sim_options.set(
            "xsim.xelab_flags",
            OptionValue::List(vec!["-mt".into(), "off".into()]),
        );

        let args = argv(&sim.elaborate_command(&cfg));

        assert_eq!(args.iter().filter(|a| *a == "lib.top").count(), 1);
        assert_eq!(args.iter().filter(|a| *a == "lib.glbl").count(), 1);
        assert_eq!(args.iter().filter(|a| *a == "WIDTH=8").count(), 1);
        let generic_pos = args.iter().position(|a| a == "--generic_top").unwrap();
        assert_eq!(args[generic_pos + 1], "WIDTH=8");

        let ts_pos = args.iter().position(|a| a == "-timescale").unwrap();
        assert_eq!(args[ts_pos + 1], "1ns/1ps");

        // Extras come last.
        assert_eq!(&args[args.len() - 2..], &["-mt", "off"]);
    }

    #[test]
    fn test_generics_quoted_on_windows() {
        let tmp = TempDir::new().unwrap();
        let mut sim = simulator(&tmp, RunOptions::default(), HostPlatform::Windows);
        sim.map_libraries(vec![Library::new("lib", "/out/libraries/lib")])
            .unwrap();

        let mut cfg = config("lib", "top");
        cfg.generics = vec![("WIDTH".to_string(), "8".to_string())];

        match sim.elaborate_command(&cfg) {
            Invocation::Shell(line) => assert!(line.contains("--generic_top \"WIDTH=8\"")),
            other => panic!("expected shell line, got {other:?}"),
        }
    }

    #[test]
    fn test_simulate_command_batch_vs_gui() {
        let tmp = TempDir::new().unwrap();
        let batch = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        let args = argv(&batch.simulate_command(Path::new("/out/xsim_startup.tcl"), None));
        assert_eq!(args[0], SNAPSHOT_NAME);
        assert!(!args.contains(&"--gui".to_string()));
        assert_eq!(args[1], "--tclbatch");
        assert_eq!(args[2], "/out/xsim_startup.tcl");

        let tmp2 = TempDir::new().unwrap();
        let gui = simulator(
            &tmp2,
            RunOptions {
                gui: true,
                ..RunOptions::default()
            },
            HostPlatform::Unix,
        );
        let args = argv(&gui.simulate_command(
            Path::new("/out/xsim_startup.tcl"),
            Some(Path::new("/proj/waves.wcfg")),
        ));
        assert_eq!(args[1], "--gui");
        let view_pos = args.iter().position(|a| a == "--view").unwrap();
        assert_eq!(args[view_pos + 1], "/proj/waves.wcfg");
    }

    #[test]
    fn test_vcd_path_resolution() {
        let tmp = TempDir::new().unwrap();
        let default = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        assert_eq!(
            default.resolve_vcd_path(Path::new("/out/test"), Path::new("/proj")),
            PathBuf::from("/out/test/wave.vcd")
        );

        let tmp2 = TempDir::new().unwrap();
        let absolute_override = simulator(
            &tmp2,
            RunOptions {
                vcd_path: Some(PathBuf::from("/waves/run.vcd")),
                ..RunOptions::default()
            },
            HostPlatform::Unix,
        );
        assert_eq!(
            absolute_override.resolve_vcd_path(Path::new("/out/test"), Path::new("/proj")),
            PathBuf::from("/waves/run.vcd")
        );

        let tmp3 = TempDir::new().unwrap();
        let relative_override = simulator(
            &tmp3,
            RunOptions {
                vcd_path: Some(PathBuf::from("waves/run.vcd")),
                ..RunOptions::default()
            },
            HostPlatform::Unix,
        );
        assert_eq!(
            relative_override.resolve_vcd_path(Path::new("/out/test"), Path::new("/proj")),
            PathBuf::from("/proj/waves/run.vcd")
        );
    }

    #[test]
    fn test_view_falls_back_to_option_store() {
        let tmp = TempDir::new().unwrap();
        let sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);

        let mut cfg = config("lib", "top");
        assert_eq!(sim.resolve_view(&cfg, Path::new("/proj")), None);

        cfg.sim_options
            .set("xsim.view", OptionValue::Str("waves.wcfg".into()));
        assert_eq!(
            sim.resolve_view(&cfg, Path::new("/proj")),
            Some(PathBuf::from("/proj/waves.wcfg"))
        );

        let tmp2 = TempDir::new().unwrap();
        let with_override = simulator(
            &tmp2,
            RunOptions {
                view: Some(PathBuf::from("/elsewhere/other.wcfg")),
                ..RunOptions::default()
            },
            HostPlatform::Unix,
        );
        assert_eq!(
            with_override.resolve_view(&cfg, Path::new("/proj")),
            Some(PathBuf::from("/elsewhere/other.wcfg"))
        );
    }

    #[test]
    fn test_startup_script_batch_with_capture() {
        let tmp = TempDir::new().unwrap();
        let sim = simulator(
            &tmp,
            RunOptions {
                vcd_enable: true,
                ..RunOptions::default()
            },
            HostPlatform::Unix,
        );

        let out = tmp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let vcd = out.join("wave.vcd");
        fs::write(&vcd, "stale").unwrap();

        let script = out.join("xsim_startup.tcl");
        sim.write_startup_script(&script, &vcd).unwrap();

        // Stale waveform removed before the new run.
        assert!(!vcd.exists());

        let contents = fs::read_to_string(&script).unwrap();
        let open_line = format!("open_vcd {}", vcd.display());
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec![open_line.as_str(), "log_vcd *", "run all", "quit"]);
    }

    #[test]
    fn test_startup_script_gui_stays_open() {
        let tmp = TempDir::new().unwrap();
        let sim = simulator(
            &tmp,
            RunOptions {
                gui: true,
                vcd_enable: true,
                ..RunOptions::default()
            },
            HostPlatform::Unix,
        );

        let script = tmp.path().join("out/xsim_startup.tcl");
        sim.write_startup_script(&script, &tmp.path().join("out/wave.vcd"))
            .unwrap();

        let contents = fs::read_to_string(&script).unwrap();
        assert!(contents.contains("open_vcd"));
        assert!(!contents.contains("run all"));
        assert!(!contents.contains("quit"));
    }

    #[test]
    fn test_startup_script_without_capture_in_batch() {
        let tmp = TempDir::new().unwrap();
        let sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);

        let script = tmp.path().join("out/xsim_startup.tcl");
        sim.write_startup_script(&script, &tmp.path().join("out/wave.vcd"))
            .unwrap();

        let contents = fs::read_to_string(&script).unwrap();
        assert_eq!(contents, "run all\nquit\n");
    }

    #[test]
    fn test_gate_serializes_elaborations() {
        let tmp = TempDir::new().unwrap();
        let sim = Arc::new(simulator(
            &tmp,
            RunOptions {
                serialize_elaboration: true,
                ..RunOptions::default()
            },
            HostPlatform::Unix,
        ));
        assert!(sim.elab_gate.is_some());

        let inside = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let sim = Arc::clone(&sim);
            let inside = Arc::clone(&inside);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let _gate = sim.elab_guard();
                    assert!(!inside.swap(true, Ordering::SeqCst), "overlapping holders");
                    inside.store(false, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_gate_absent_unless_requested() {
        let tmp = TempDir::new().unwrap();
        let sim = simulator(&tmp, RunOptions::default(), HostPlatform::Unix);
        assert!(sim.elab_gate.is_none());
        assert!(sim.elab_guard().is_none());
    }

    #[cfg(unix)]
    mod with_stub_tools {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// A prefix whose xelab/xsim are shell scripts with the given exit
        /// codes; xsim also drops a marker file so the attempt is visible.
        fn scripted_prefix(tmp: &TempDir, xelab_exit: i32, xsim_exit: i32) -> PathBuf {
            let prefix = tmp.path().join("bin");
            fs::create_dir_all(&prefix).unwrap();
            for (tool, body) in [
                ("xvlog", "exit 0".to_string()),
                ("xvhdl", "exit 0".to_string()),
                ("xelab", format!("exit {}", xelab_exit)),
                ("xsim", format!("touch sim_ran\nexit {}", xsim_exit)),
            ] {
                let path = prefix.join(tool);
                fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            }
            prefix
        }

        fn project_layout(tmp: &TempDir) -> (PathBuf, PathBuf) {
            let libraries = tmp.path().join("work/libraries");
            fs::create_dir_all(libraries.join("lib")).unwrap();
            fs::write(libraries.join("lib/unit.db"), "compiled").unwrap();
            let output = tmp.path().join("work/test_output/tb/xsim");
            (libraries, output)
        }

        fn scripted_simulator(tmp: &TempDir, xelab_exit: i32, xsim_exit: i32) -> XsimSimulator {
            let prefix = scripted_prefix(tmp, xelab_exit, xsim_exit);
            let mut sim =
                XsimSimulator::with_host(&prefix, &RunOptions::default(), HostPlatform::Unix)
                    .unwrap();
            let (libraries, _) = project_layout(tmp);
            sim.map_libraries(vec![Library::new("lib", libraries.join("lib"))])
                .unwrap();
            sim
        }

        #[test]
        fn test_simulate_success() {
            let tmp = TempDir::new().unwrap();
            let sim = scripted_simulator(&tmp, 0, 0);
            let (_, output) = project_layout(&tmp);

            let ok = sim.simulate(&output, "lib.tb", &config("lib", "tb"), false).unwrap();
            assert!(ok);
            assert!(output.join("xsim_startup.tcl").exists());
            assert!(output.join("sim_ran").exists());
            // The library tree was staged next to the run directory.
            assert!(output.join("libraries/lib/unit.db").exists());
        }

        #[test]
        fn test_failed_elaboration_still_attempts_simulation() {
            let tmp = TempDir::new().unwrap();
            let sim = scripted_simulator(&tmp, 1, 0);
            let (_, output) = project_layout(&tmp);

            let ok = sim.simulate(&output, "lib.tb", &config("lib", "tb"), false).unwrap();
            assert!(!ok);
            assert!(output.join("sim_ran").exists());
        }

        #[test]
        fn test_failed_simulation_folds_into_result() {
            let tmp = TempDir::new().unwrap();
            let sim = scripted_simulator(&tmp, 0, 2);
            let (_, output) = project_layout(&tmp);

            let ok = sim.simulate(&output, "lib.tb", &config("lib", "tb"), false).unwrap();
            assert!(!ok);
        }

        #[test]
        fn test_elaborate_only_skips_simulation() {
            let tmp = TempDir::new().unwrap();
            let sim = scripted_simulator(&tmp, 0, 0);
            let (_, output) = project_layout(&tmp);

            let ok = sim.simulate(&output, "lib.tb", &config("lib", "tb"), true).unwrap();
            assert!(ok);
            assert!(!output.join("xsim_startup.tcl").exists());
            assert!(!output.join("sim_ran").exists());
        }

        #[test]
        fn test_resources_staged_under_base_name() {
            let tmp = TempDir::new().unwrap();
            let sim = scripted_simulator(&tmp, 0, 0);
            let (_, output) = project_layout(&tmp);

            let stim = tmp.path().join("data/stim.txt");
            fs::create_dir_all(stim.parent().unwrap()).unwrap();
            fs::write(&stim, "101010").unwrap();

            let mut cfg = config("lib", "tb");
            cfg.resources = vec![stim];

            let ok = sim.simulate(&output, "lib.tb", &cfg, false).unwrap();
            assert!(ok);
            assert_eq!(
                fs::read_to_string(output.join("stim.txt")).unwrap(),
                "101010"
            );
        }
    }
}
