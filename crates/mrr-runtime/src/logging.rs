//! Logging setup built on `tracing-subscriber`.
//!
//! ```rust,ignore
//! let config = mrr_runtime::config::load_config()?;
//! mrr_runtime::logging::init_from_config(&config.logging);
//! ```
//!
//! Or by hand:
//!
//! ```rust,ignore
//! use mrr_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("mrr_framework=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Which span lifecycle events are written.
///
/// The dispatcher opens one `dispatch` span per inbound message, so
/// [`SpanEvents::LIFECYCLE`] shows each request's start and end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    /// Log when a span is created.
    pub new: bool,
    /// Log every time a span is entered.
    pub enter: bool,
    /// Log every time a span is exited.
    pub exit: bool,
    /// Log when a span closes, with its busy and idle time.
    pub close: bool,
}

impl SpanEvents {
    /// No span events.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Every lifecycle event. Noisy, since handlers may enter a span many
    /// times per message.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    /// Converts to `tracing_subscriber` flags.
    fn to_fmt_span(self) -> FmtSpan {
        let mut span = FmtSpan::NONE;
        if self.new {
            span |= FmtSpan::NEW;
        }
        if self.enter {
            span |= FmtSpan::ENTER;
        }
        if self.exit {
            span |= FmtSpan::EXIT;
        }
        if self.close {
            span |= FmtSpan::CLOSE;
        }
        span
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Builder for the global `tracing` subscriber.
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file_path: Option<PathBuf>,
}

impl LoggingBuilder {
    /// Creates a builder logging compact lines to stdout at INFO, with
    /// targets shown.
    pub fn new() -> Self {
        Self {
            with_target: true,
            ..Default::default()
        }
    }

    /// Creates a builder from the `[logging]` section of an `MrrConfig`.
    ///
    /// Per-module filters become directives, applied in name order.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new();
        builder.level = Some(config.level.to_tracing_level());
        builder.format = config.format;
        builder.output = config.output;
        builder.span_events = SpanEvents::from(&config.span_events);
        builder.with_thread_ids = config.thread_ids;
        builder.with_file = config.file_location;
        builder.with_line_number = config.file_location;
        builder.file_path.clone_from(&config.file_path);

        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));
        for (module, level) in filters {
            builder.directives.push(format!("{module}={}", level.as_str()));
        }
        builder
    }

    /// Sets the base level used when `RUST_LOG` is unset.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a filter directive such as `mrr_framework=trace`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Selects which span lifecycle events are written.
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Sets the line format. `Json` needs the `json-log` feature and
    /// degrades to `Full` without it.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets where log lines go. `File` needs [`file_path`](Self::file_path).
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Include the module path of each event.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Include the thread id of each event.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Includes file and line of each event.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self.with_line_number = enabled;
        self
    }

    /// Log file used by [`LogOutput::File`]. Never rotated.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// `RUST_LOG` wins over the configured level when it parses.
    fn build_filter(&self) -> EnvFilter {
        let base = self
            .level
            .unwrap_or(tracing::Level::INFO)
            .to_string()
            .to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));
        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    /// Picks the sink for `output`.
    fn build_writer(&self) -> BoxMakeWriter {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let appender = tracing_appender::rolling::never(
                    path.parent().unwrap_or_else(|| Path::new(".")),
                    path.file_name().unwrap_or_else(|| OsStr::new("mrr.log")),
                );
                BoxMakeWriter::new(appender)
            }
            // rejected by validation; stdout keeps an unvalidated builder usable
            (LogOutput::File, None) => BoxMakeWriter::new(std::io::stdout),
        }
    }

    fn build_layer(&self) -> BoxedLayer {
        let span_events = self.span_events.to_fmt_span();
        let writer = self.build_writer();

        macro_rules! configure {
            ($layer:expr) => {
                $layer
                    .with_span_events(span_events)
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
                    .with_writer(writer)
                    .boxed()
            };
        }

        match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_writer(writer)
                .boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => configure!(fmt::layer()),
            LogFormat::Full => configure!(fmt::layer()),
            LogFormat::Compact => configure!(fmt::layer().compact()),
            LogFormat::Pretty => configure!(fmt::layer().pretty()),
        }
    }

    /// Installs the subscriber, ignoring a second initialization.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber, failing if one is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let layer = self.build_layer();
        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
    }
}
