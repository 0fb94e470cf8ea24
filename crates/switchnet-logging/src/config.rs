//! Where simulator logs go
//!
//! A run logs either to the console or, with a trace directory, to a JSONL
//! file that records every exchange step for later inspection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log destinations of one simulator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    pub console: ConsoleFormat,
    /// JSONL trace file, off unless a directory was given
    pub trace: Option<TraceFile>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::Pretty,
            trace: None,
        }
    }
}

impl LogConfig {
    /// Settings for a command-line run
    ///
    /// `verbose` lowers the level to `debug`. A trace directory moves output
    /// off the console into `<dir>/switchnet.log`.
    pub fn for_run(verbose: bool, trace_dir: Option<PathBuf>) -> Self {
        let level = if verbose { "debug" } else { "info" };
        match trace_dir {
            Some(directory) => Self {
                level: level.to_string(),
                console: ConsoleFormat::Off,
                trace: Some(TraceFile::new(directory)),
            },
            None => Self {
                level: level.to_string(),
                ..Self::default()
            },
        }
    }

    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        if let Some(trace) = &mut self.trace {
            trace.rotation = rotation;
        }
        self
    }
}

/// Console output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsoleFormat {
    Off,
    /// Human-readable, coloured
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// JSONL trace file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFile {
    pub directory: PathBuf,
    /// File name, or prefix of the rolling files
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl TraceFile {
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            prefix: "switchnet".to_string(),
            rotation: RotationStrategy::Never,
        }
    }
}

/// How trace files are split over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RotationStrategy {
    Daily,
    Hourly,
    /// One file per run, truncated at start
    #[default]
    Never,
}

impl FromStr for RotationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown rotation '{other}', expected daily, hourly or never")),
        }
    }
}

impl fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Hourly => write!(f, "hourly"),
            Self::Never => write!(f, "never"),
        }
    }
}
