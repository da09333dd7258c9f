//! Source files and HDL kind detection.

use std::path::{Path, PathBuf};

/// The HDL dialect of a source file, detected from its extension.
///
/// Files are opaque to drydock; the kind only selects which compiler
/// front-end gets invoked. `Unknown` is a real state: a manifest can match
/// a file no simulator front-end accepts, and compiling one is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HdlKind {
    /// VHDL (.vhd, .vhdl)
    Vhdl,
    /// Verilog (.v)
    Verilog,
    /// SystemVerilog (.sv)
    SystemVerilog,
    /// Anything else
    Unknown,
}

impl HdlKind {
    /// Detect the kind from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("vhd") | Some("vhdl") => HdlKind::Vhdl,
            Some("v") => HdlKind::Verilog,
            Some("sv") => HdlKind::SystemVerilog,
            _ => HdlKind::Unknown,
        }
    }

    /// Get the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HdlKind::Vhdl => "vhdl",
            HdlKind::Verilog => "verilog",
            HdlKind::SystemVerilog => "systemverilog",
            HdlKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HdlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HDL source file as seen by the simulator backend.
///
/// Read-only input owned by the project model. `defines` is an ordered
/// sequence because define order is visible on the compile command line.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path to the file
    pub path: PathBuf,
    /// Detected HDL dialect
    pub kind: HdlKind,
    /// Name of the owning library
    pub library_name: String,
    /// Include directories, in manifest order (Verilog kinds only)
    pub include_dirs: Vec<PathBuf>,
    /// Preprocessor defines, in manifest order (Verilog kinds only)
    pub defines: Vec<(String, String)>,
}

impl SourceFile {
    /// Create a source file entry, detecting the kind from the path.
    pub fn new(path: impl Into<PathBuf>, library_name: impl Into<String>) -> Self {
        let path = path.into();
        let kind = HdlKind::from_path(&path);
        SourceFile {
            path,
            kind,
            library_name: library_name.into(),
            include_dirs: Vec::new(),
            defines: Vec::new(),
        }
    }
}
