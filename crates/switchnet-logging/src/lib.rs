//! Structured logging for the switchnet simulator
//!
//! A run logs to the console, pretty by default. With a trace directory the
//! console goes quiet and every event lands in a JSONL file instead, which is
//! the usual way to inspect per-message movement after the fact.
//!
//! # Quick Start
//!
//! ```ignore
//! use switchnet_logging::{LogConfig, SubscriberBuilder};
//!
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::for_run(verbose, log_dir))
//!     .init()?;
//! ```
//!
//! # Node Context
//!
//! Use [`NodeContextGuard`] while processing a node so spans opened in that
//! scope carry the node id and run id:
//!
//! ```ignore
//! let _guard = NodeContextGuard::new(node_id, run_id);
//! let _span = tracing::trace_span!("node", node = %node_id).entered();
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleFormat, LogConfig, RotationStrategy, TraceFile};
pub use context::{NodeContextData, NodeContextGuard};
pub use layers::{NodeContextExtension, NodeContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for configuring and installing the global subscriber
#[derive(Debug, Default)]
pub struct SubscriberBuilder {
    config: LogConfig,
}

impl SubscriberBuilder {
    /// Pretty console output at `info`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    pub fn with_trace_file(mut self, trace: TraceFile) -> Self {
        self.config.trace = Some(trace);
        self
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes the trace file when dropped and must be
    /// kept alive for as long as file output is wanted.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level));

        let pretty_console = (self.config.console == ConsoleFormat::Pretty)
            .then(|| tracing_subscriber::fmt::layer().with_ansi(true).with_target(true));

        let json_console = (self.config.console == ConsoleFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
        });

        let (file_layer, guard) = match &self.config.trace {
            Some(trace) => {
                let (writer, guard) = trace_writer(trace)?;
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(NodeContextLayer::new())
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()?;

        Ok(guard)
    }
}

/// Open the writer for the trace file
///
/// `Never` truncates a single `<prefix>.log`; the other strategies append to
/// rolling files.
fn trace_writer(trace: &TraceFile) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&trace.directory)?;
    let rotation = match trace.rotation {
        RotationStrategy::Never => {
            let path = trace.directory.join(format!("{}.log", trace.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };
    Ok(tracing_appender::non_blocking(RollingFileAppender::new(
        rotation,
        &trace.directory,
        &trace.prefix,
    )))
}
