//! Simulator options and per-testbench simulation configuration.

use std::collections::HashMap;
use std::path::PathBuf;

/// A value in the simulator option store.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

/// Free-form key→value store queried by namespaced keys.
///
/// The xsim backend recognizes `xsim.timescale`, `xsim.enable_glbl`,
/// `xsim.xelab_flags`, and `xsim.view`; anything else is carried but never
/// queried. A typed getter on a key holding a different value type returns
/// `None`.
#[derive(Debug, Clone, Default)]
pub struct SimOptions {
    values: HashMap<String, OptionValue>,
}

impl SimOptions {
    /// Create an empty option store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option.
    pub fn set(&mut self, key: impl Into<String>, value: OptionValue) {
        self.values.insert(key.into(), value);
    }

    /// Query a boolean option.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(OptionValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Query a string option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(OptionValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Query a list option.
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.values.get(key) {
            Some(OptionValue::List(l)) => Some(l.as_slice()),
            _ => None,
        }
    }

    /// Build an option store from a manifest `options` table.
    ///
    /// Booleans, strings, and arrays of strings map to their obvious
    /// `OptionValue`; other value types are ignored with a warning.
    pub fn from_toml_table(table: &toml::Table) -> Self {
        let mut options = SimOptions::new();
        for (key, value) in table {
            match value {
                toml::Value::Boolean(b) => options.set(key, OptionValue::Bool(*b)),
                toml::Value::String(s) => options.set(key, OptionValue::Str(s.clone())),
                toml::Value::Array(items) => {
                    let list = items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                    options.set(key, OptionValue::List(list));
                }
                other => {
                    tracing::warn!("ignoring option `{}` with unsupported value {}", key, other);
                }
            }
        }
        options
    }
}

/// Everything the backend needs to elaborate and run one testbench.
///
/// Immutable once constructed; one instance per simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Library holding the top-level unit
    pub library_name: String,
    /// Top-level unit name
    pub top: String,
    /// Elaboration generics, in manifest order
    pub generics: Vec<(String, String)>,
    /// Namespaced simulator options
    pub sim_options: SimOptions,
    /// Resource files staged into the run directory
    pub resources: Vec<PathBuf>,
}
