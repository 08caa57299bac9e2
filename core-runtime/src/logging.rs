//! # Logging & Tracing Infrastructure
//!
//! Structured logging on top of `tracing`, supporting:
//! - Pretty, JSON and compact output
//! - Per-crate filtering
//! - Source URL redaction (signed query strings never reach the log)
//! - Mirroring into the host's logger through `LoggerSink`
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug);
//! init_logging(config)?;
//!
//! tracing::info!(provider = "hls", "Provider attached");
//! ```
//!
//! ## LoggerSink integration
//!
//! When a [`LoggerSink`] is configured every event that survives filtering is
//! forwarded to it as a [`LogEntry`]. URL-valued fields (`source`, `src`,
//! `url`, `library`) lose their query string on the way. Inside a tokio
//! runtime the sink call is spawned; outside one it is driven inline.

use crate::config::{LOADER_AUDIO, LOADER_GOOGLE_CAST, LOADER_HLS, LOADER_VIDEO};
use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Crates whose level follows [`LoggingConfig::level`] in the default filter.
const WORKSPACE_CRATES: &[&str] = &[
    "bridge_traits",
    "core_runtime",
    "core_provider",
    "provider_hls",
    "provider_cast",
    "core_service",
];

/// Fields holding media URLs; their values are redacted before forwarding.
const URL_FIELDS: &[&str] = &["source", "src", "url", "library"];

/// Output format of the stdout layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level of every workspace crate in the default filter.
    pub level: LogLevel,
    /// Per-loader overrides keyed by loader name (`hls`, `google-cast`, ...).
    pub provider_levels: Vec<(String, LogLevel)>,
    /// Raw `EnvFilter` directives; replaces the generated filter entirely.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    pub enable_spans: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            provider_levels: Vec::new(),
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("provider_levels", &self.provider_levels)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Raise or lower one provider's verbosity, e.g. trace the HLS engine
    /// while the rest of the runtime stays at info.
    pub fn with_provider_level(mut self, loader: impl Into<String>, level: LogLevel) -> Self {
        self.provider_levels.push((loader.into(), level));
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }
}

/// Initialize the global subscriber.
///
/// Call once during startup; a second call returns [`Error::Config`].
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let output = output_layer(&config);
    let sink_layer = LoggerSinkLayer::new(config.logger_sink.clone());

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .with(sink_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn output_layer(config: &LoggingConfig) -> OutputLayer {
    match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.display_target)
            .with_span_events(span_events(config.enable_spans))
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .with_target(config.display_target)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(config.display_target)
            .with_writer(io::stdout)
            .boxed(),
    }
}

fn span_events(enable: bool) -> tracing_subscriber::fmt::format::FmtSpan {
    if enable {
        tracing_subscriber::fmt::format::FmtSpan::ACTIVE
    } else {
        tracing_subscriber::fmt::format::FmtSpan::NONE
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Crate that logs on behalf of a loader.
fn provider_target(loader: &str) -> Result<&'static str> {
    match loader {
        LOADER_HLS => Ok("provider_hls"),
        LOADER_GOOGLE_CAST => Ok("provider_cast"),
        LOADER_VIDEO | LOADER_AUDIO => Ok("core_provider::native"),
        other => Err(Error::Config(format!("Unknown loader '{}' in log levels", other))),
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter_string = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            // Third-party crates stay at warn.
            let mut directives = vec!["warn".to_string()];
            let level = directive(config.level);
            directives.extend(WORKSPACE_CRATES.iter().map(|name| format!("{}={}", name, level)));
            for (loader, level) in &config.provider_levels {
                directives.push(format!("{}={}", provider_target(loader)?, directive(*level)));
            }
            directives.join(",")
        }
    };

    EnvFilter::try_new(filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Layer that forwards events to a `LoggerSink` implementation.
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = sink_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in visitor.fields {
            entry = entry.with_field(key, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_span(span.name());
        }

        let sink = Arc::clone(sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {}", err);
                    }
                });
            }
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {}", err);
                }
            }
        }
    }
}

#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name if URL_FIELDS.contains(&name) => {
                self.fields
                    .insert(name.to_string(), redact_src(&value).to_string());
            }
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

// Remaining primitives go through `record_debug`.
impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

fn sink_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Strip the query string and fragment from a media source before logging.
///
/// Signed CDN URLs carry credentials in the query:
///
/// ```
/// use core_runtime::logging::redact_src;
///
/// assert_eq!(
///     redact_src("https://cdn.example.com/v.m3u8?token=abc#t=10"),
///     "https://cdn.example.com/v.m3u8"
/// );
/// ```
pub fn redact_src(src: &str) -> &str {
    let end = src.find(|c: char| c == '?' || c == '#').unwrap_or(src.len());
    &src[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_provider_level("hls", LogLevel::Trace)
            .with_spans(true)
            .with_target(false);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(
            config.provider_levels,
            vec![("hls".to_string(), LogLevel::Trace)]
        );
        assert!(config.enable_spans);
        assert!(!config.display_target);
    }

    #[test]
    fn test_redact_src() {
        assert_eq!(redact_src("https://a.b/c.mp4?sig=1"), "https://a.b/c.mp4");
        assert_eq!(redact_src("https://a.b/c.mp4#t=5"), "https://a.b/c.mp4");
        assert_eq!(redact_src("https://a.b/c.mp4"), "https://a.b/c.mp4");
        assert_eq!(redact_src(""), "");
    }

    #[test]
    fn test_build_filter_covers_workspace_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("core_provider=debug"));
        assert!(filter.contains("provider_cast=debug"));
    }

    #[test]
    fn test_provider_levels_map_to_crates() {
        let config = LoggingConfig::default()
            .with_provider_level("google-cast", LogLevel::Trace)
            .with_provider_level("video", LogLevel::Warn);
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("provider_cast=trace"));
        assert!(filter.contains("core_provider::native=warn"));

        let unknown = LoggingConfig::default().with_provider_level("dash", LogLevel::Debug);
        assert!(matches!(build_filter(&unknown), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_custom_filter() {
        let config = LoggingConfig::default().with_filter("provider_hls=trace");
        let filter = build_filter(&config).unwrap();
        assert!(filter.to_string().contains("provider_hls=trace"));
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!(target: "core_provider::runtime", provider = "hls", "attached");
        tracing::trace!(target: "core_provider::runtime", "below sink level");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "core_provider::runtime");
        assert_eq!(entries[0].message, "attached");
        assert_eq!(entries[0].fields.get("provider"), Some(&"hls".to_string()));
    }

    #[test]
    fn test_sink_receives_redacted_sources() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        let src = "https://cdn.example.com/master.m3u8?token=secret";
        tracing::info!(source = %src, attempt = 2, "loading source");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(
            entries[0].fields.get("source").map(String::as_str),
            Some("https://cdn.example.com/master.m3u8")
        );
        assert_eq!(entries[0].fields.get("attempt").map(String::as_str), Some("2"));
    }

    #[derive(Default)]
    struct TestLoggerSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for TestLoggerSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }
}
