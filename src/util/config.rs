//! Configuration file support for drydock.
//!
//! Toolchain overrides are stored in:
//! - Global: `~/.drydock/toolchain.toml`
//! - Project: `.drydock/toolchain.toml`
//!
//! Project config takes precedence over global config. The only setting is
//! the Vivado `bin` directory holding the xsim executables; when neither
//! file sets it (and no `--prefix` flag is given), the prefix is discovered
//! by locating `xsim` on PATH.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Toolchain configuration for simulator overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain settings
    pub toolchain: ToolchainSettings,
}

/// Toolchain settings for the XSim installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Directory containing the xsim executables
    /// (e.g., /opt/Xilinx/Vivado/2023.2/bin)
    pub prefix: Option<PathBuf>,
}

impl ToolchainConfig {
    /// Load toolchain configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read toolchain config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse toolchain config: {}", path.display()))
    }

    /// Load toolchain configuration with fallback to defaults if the file
    /// doesn't exist or fails to parse.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to load toolchain config from {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainConfig) {
        if other.toolchain.prefix.is_some() {
            self.toolchain.prefix = other.toolchain.prefix;
        }
    }
}

/// Load merged toolchain configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.drydock/toolchain.toml)
/// 2. Global config (~/.drydock/toolchain.toml)
/// 3. Defaults
pub fn load_toolchain_config(global_path: &Path, project_path: &Path) -> ToolchainConfig {
    let mut config = ToolchainConfig::default();

    if global_path.exists() {
        let global = ToolchainConfig::load_or_default(global_path);
        config.merge(global);
    }

    if project_path.exists() {
        let project = ToolchainConfig::load_or_default(project_path);
        config.merge(project);
    }

    config
}

/// Get the global drydock config directory (~/.drydock).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".drydock"))
}

/// Get the global toolchain config path (~/.drydock/toolchain.toml).
pub fn global_toolchain_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("toolchain.toml"))
}

/// Get the project toolchain config path (.drydock/toolchain.toml).
pub fn project_toolchain_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".drydock").join("toolchain.toml")
}
