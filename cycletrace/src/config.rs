//! Optional TOML configuration layer.
//!
//! Command-line flags always win; the config file only moves the
//! defaults. A missing or unparsable file silently falls back to the
//! built-in defaults.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "cycletrace.toml";
const ENV_CONFIG_PATH: &str = "CYCLETRACE_CONFIG";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

impl Config {
    /// Load configuration from file. The path can be overridden with
    /// the `CYCLETRACE_CONFIG` environment variable.
    pub fn load() -> Self {
        let path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(path);
        match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
            Err(_) => Config::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraceConfig {
    #[serde(default = "default_trace_file")]
    pub file: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            file: default_trace_file(),
        }
    }
}

fn default_trace_file() -> String {
    "trace.bin".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ResolverConfig {
    /// Path to the address-to-name tool; the toolchain default is
    /// used when unset.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_graph_output")]
    pub output: String,
    #[serde(default)]
    pub percent_threshold: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            output: default_graph_output(),
            percent_threshold: 0.0,
        }
    }
}

fn default_graph_output() -> String {
    "graph.dot".to_string()
}
