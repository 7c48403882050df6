//! Subscriber setup for tarpit diagnostics
//!
//! Every event the crate emits uses the `tarpit` target. Lifecycle reports
//! (start/terminate timing, unused providers) are `info`/`warn`, while
//! registration and resolution details are `debug`/`trace`.
//!
//! # Features
//!
//! - `logging` - Emit tracing events (default)
//! - `logging-json` - JSON output, for log aggregation
//! - `logging-pretty` - Multi-line colored output, for development
//!
//! # Example
//!
//! ```rust,ignore
//! use tarpit::logging;
//!
//! logging::init();
//!
//! // Or driven by the `log` section of the configuration:
//! // { "log": { "level": "debug", "format": "compact" } }
//! logging::LoggingBuilder::from_config(&config).tarpit_only().init();
//! ```
//!
//! The `TARPIT_LOG` environment variable, when set, overrides the level
//! and target filter with an `EnvFilter` directive string.

#[cfg(feature = "logging")]
use crate::config::ConfigData;
#[cfg(feature = "logging")]
use tracing::Level;

/// Environment variable holding an `EnvFilter` directive override.
pub const LOG_ENV: &str = "TARPIT_LOG";

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON objects, one per line
    Json,
    /// Multi-line colored output
    Pretty,
    /// Single-line output
    #[default]
    Compact,
}

impl LogFormat {
    /// Parse `json`, `pretty` or `compact`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Builder for the global subscriber.
#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `log.level` and `log.format` from the configuration.
    ///
    /// Missing or unrecognised values keep the defaults.
    pub fn from_config(config: &ConfigData) -> Self {
        let mut builder = Self::default();
        if let Some(level) = config
            .get("log.level")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Level>().ok())
        {
            builder.level = level;
        }
        if let Some(format) = config
            .get("log.format")
            .and_then(|v| v.as_str())
            .and_then(LogFormat::parse)
        {
            builder.format = format;
        }
        builder
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    /// Only show events from `target`.
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show tarpit's own events.
    pub fn tarpit_only(self) -> Self {
        self.with_target_filter("tarpit")
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{target}={}", self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the global subscriber.
    ///
    /// Returns `false` when a subscriber was already installed. JSON output
    /// falls back to compact without the `logging-json` feature.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(self.directive()));
        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_target(true);
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init().is_ok(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init().is_ok(),
            _ => registry.with(layer.compact()).try_init().is_ok(),
        }
    }

    /// No subscriber backend compiled in.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

/// Create a new logging builder.
#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install a subscriber: JSON with `logging-json`, otherwise pretty.
#[cfg(feature = "logging")]
pub fn init() -> bool {
    if cfg!(feature = "logging-json") {
        builder().json().init()
    } else {
        builder().pretty().init()
    }
}
