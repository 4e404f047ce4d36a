//! Structured logging for Shutter
//!
//! Thin layer over `tracing-subscriber` that turns a [`LogConfig`] into a
//! subscriber: JSONL or pretty console output on stderr, plus optional
//! rotating JSONL files.
//!
//! # Quick Start
//!
//! ```ignore
//! use shutter_logging::{LogConfig, ShutterSubscriberBuilder};
//!
//! // JSONL to stderr
//! let _guard = ShutterSubscriberBuilder::new().init();
//!
//! // Human-readable output while developing
//! let _guard = ShutterSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! `RUST_LOG` always takes precedence over the configured default level.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync + 'static>;

/// Errors raised while setting up logging
#[derive(Debug, Error)]
pub enum LogError {
    /// Log file or directory could not be created
    #[error("Log file setup failed: {0}")]
    File(String),

    /// A global subscriber is already installed
    #[error("Subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the Shutter logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct ShutterSubscriberBuilder {
    config: LogConfig,
}

impl ShutterSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch console output between pretty and JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self.config.console.ansi = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration the subscriber will be built from
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the subscriber without installing it
    ///
    /// The returned guard (present when file output is enabled) flushes
    /// buffered lines when dropped and must outlive all logging.
    pub fn build(self) -> Result<(impl Subscriber + Send + Sync, Option<WorkerGuard>), LogError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(self.console_layer());
        }

        if let Some(file_config) = &self.config.file {
            let appender = file_appender(file_config)?;
            let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);
            layers.push(self.json_layer(non_blocking));
            guard = Some(file_guard);
        }

        let subscriber = Registry::default().with(env_filter).with(layers);
        Ok((subscriber, guard))
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if file output can't be set up or a global
    /// subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let (subscriber, guard) = self.build()?;
        subscriber
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    /// Initialize the subscriber globally
    ///
    /// Setup failures are reported on stderr and leave logging disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    fn console_layer(&self) -> BoxedLayer {
        let console = &self.config.console;
        let layer = if console.pretty {
            tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            self.json_layer(std::io::stderr)
        };

        match &console.level {
            Some(level) => layer.with_filter(EnvFilter::new(level)).boxed(),
            None => layer,
        }
    }

    fn json_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let jsonl = &self.config.jsonl;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(jsonl.include_current_span)
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
            .with_thread_ids(jsonl.include_thread_info)
            .with_thread_names(jsonl.include_thread_info)
            .with_writer(writer)
            .boxed()
    }
}

impl Default for ShutterSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn file_appender(file_config: &FileConfig) -> Result<RollingFileAppender, LogError> {
    let rotation = match file_config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };

    std::fs::create_dir_all(&file_config.directory)
        .map_err(|e| LogError::File(format!("{}: {}", file_config.directory.display(), e)))?;

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .filename_suffix("log");
    if let Some(max_files) = file_config.max_files {
        builder = builder.max_log_files(max_files);
    }

    builder
        .build(&file_config.directory)
        .map_err(|e| LogError::File(e.to_string()))
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = ShutterSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
