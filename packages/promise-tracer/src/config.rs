//! Tracer configuration.
//!
//! Read from a TOML file (either a `[tracer]` table or top-level keys), then
//! overridden by `PROMISE_TRACER_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TracerError;
use crate::sink::{EventSink, JsonLinesSink, NullSink};

pub const ENV_OUTPUT: &str = "PROMISE_TRACER_OUTPUT";
pub const ENV_VERBOSE: &str = "PROMISE_TRACER_VERBOSE";
pub const ENV_TRUNCATE: &str = "PROMISE_TRACER_TRUNCATE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// JSON-lines output file; events are dropped when unset.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Truncate the output file instead of appending to it.
    #[serde(default = "default_truncate")]
    pub truncate: bool,

    #[serde(default)]
    pub verbose: bool,

    /// Print promise expressions into creation events. Off by default:
    /// printing is expensive and the records carry a placeholder instead.
    #[serde(default)]
    pub compute_promise_expressions: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            output: None,
            truncate: default_truncate(),
            verbose: false,
            compute_promise_expressions: false,
        }
    }
}

fn default_truncate() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    tracer: Option<TracerConfig>,
}

impl TracerConfig {
    /// Parse TOML text.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, TracerError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|err| TracerError::config(origin, err))?;
        if let Some(config) = file.tracer {
            return Ok(config);
        }
        toml::from_str(content).map_err(|err| TracerError::config(origin, err))
    }

    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, TracerError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml_str(&content, path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `PROMISE_TRACER_*` overrides read through `var`.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(output) = var(ENV_OUTPUT) {
            self.output = if output.is_empty() {
                None
            } else {
                Some(PathBuf::from(output))
            };
        }
        if let Some(verbose) = var(ENV_VERBOSE).and_then(|v| parse_flag(&v)) {
            self.verbose = verbose;
        }
        if let Some(truncate) = var(ENV_TRUNCATE).and_then(|v| parse_flag(&v)) {
            self.truncate = truncate;
        }
    }

    /// Install the logger at the level `verbose` selects.
    pub fn init_logging(&self) {
        crate::logging::init_logging(self.verbose);
    }

    /// Sink described by this configuration.
    pub fn open_sink(&self) -> Result<Box<dyn EventSink>, TracerError> {
        match &self.output {
            Some(path) => Ok(Box::new(JsonLinesSink::create(path, self.truncate)?)),
            None => Ok(Box::new(NullSink)),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            log::warn!("ignoring unrecognised flag value {:?}", other);
            None
        }
    }
}
