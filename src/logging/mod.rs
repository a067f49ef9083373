//! Structured logging configuration for Ultrawide

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration for Ultrawide
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: LogLevel,
    /// Log format (json, pretty, compact)
    pub format: LogFormat,
    /// Output destination (stdout, file, both)
    pub output: LogOutput,
    /// File path for file output
    pub file_path: Option<PathBuf>,
    /// Include source file and line numbers
    pub include_source: bool,
    /// Include thread names (the window operator thread is named)
    pub include_thread_names: bool,
    /// Trace apply, reapply and monitor internals
    pub performance_tracing: bool,
}

/// Log levels supported by Ultrawide
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// Compact format for everyday use
    Compact,
    /// JSON format for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Log output destinations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// Standard error, so that `--json` command output stays clean on stdout
    Stderr,
    File,
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stderr" | "stdout" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            _ => Err(format!("Invalid log output: {}", s)),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            file_path: None,
            include_source: false,
            include_thread_names: true,
            performance_tracing: false,
        }
    }
}

impl LogConfig {
    /// Create a development-friendly log configuration
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            file_path: None,
            include_source: true,
            include_thread_names: true,
            performance_tracing: true,
        }
    }

    /// Create a production log configuration writing JSON to the local data directory
    pub fn production() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Json,
            output: LogOutput::File,
            file_path: default_log_path(),
            include_source: false,
            include_thread_names: false,
            performance_tracing: false,
        }
    }

    /// Load configuration from `ULTRAWIDE_LOG_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("ULTRAWIDE_LOG_LEVEL") {
            if let Ok(parsed_level) = LogLevel::from_str(&level) {
                config.level = parsed_level;
            }
        }

        if let Ok(format) = std::env::var("ULTRAWIDE_LOG_FORMAT") {
            if let Ok(parsed_format) = LogFormat::from_str(&format) {
                config.format = parsed_format;
            }
        }

        if let Ok(output) = std::env::var("ULTRAWIDE_LOG_OUTPUT") {
            if let Ok(parsed_output) = LogOutput::from_str(&output) {
                config.output = parsed_output;
            }
        }

        if let Ok(file_path) = std::env::var("ULTRAWIDE_LOG_FILE") {
            config.file_path = Some(PathBuf::from(file_path));
        }

        if config.output != LogOutput::Stderr && config.file_path.is_none() {
            config.file_path = default_log_path();
        }

        if let Ok(include_source) = std::env::var("ULTRAWIDE_LOG_SOURCE") {
            config.include_source = include_source.to_lowercase() == "true";
        }

        if let Ok(performance) = std::env::var("ULTRAWIDE_LOG_PERFORMANCE") {
            config.performance_tracing = performance.to_lowercase() == "true";
        }

        config
    }
}

fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("ultrawide").join("ultrawide.log"))
}

/// Initialize the global tracing subscriber with the given configuration
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = create_filter(config);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if matches!(config.output, LogOutput::Stderr | LogOutput::Both) {
        layers.push(create_stderr_layer(config));
    }
    if matches!(config.output, LogOutput::File | LogOutput::Both) {
        let file_path = config
            .file_path
            .as_ref()
            .ok_or("File path required for file output")?;
        layers.push(create_file_layer(config, file_path)?);
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()?;

    info!("Logging initialized with config: {:?}", config);
    Ok(())
}

/// Create an environment filter based on the configuration
fn create_filter(config: &LogConfig) -> EnvFilter {
    let mut filter_str = format!("ultrawide={}", config.level.as_directive());

    if config.performance_tracing {
        filter_str.push_str(",ultrawide::services::config_applier=trace");
        filter_str.push_str(",ultrawide::services::window_operator=trace");
        filter_str.push_str(",ultrawide::services::change_monitor=trace");
        filter_str.push_str(",ultrawide::services::layout_engine=trace");
    }

    // RUST_LOG wins when present
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str))
}

fn create_stderr_layer(config: &LogConfig) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(UtcTime::rfc_3339())
        .with_thread_names(config.include_thread_names)
        .with_file(config.include_source)
        .with_line_number(config.include_source);

    match config.format {
        LogFormat::Pretty => Box::new(layer.pretty()),
        LogFormat::Compact => Box::new(layer.compact()),
        LogFormat::Json => Box::new(layer.json()),
    }
}

fn create_file_layer(
    config: &LogConfig,
    file_path: &Path,
) -> Result<BoxedLayer, Box<dyn std::error::Error>> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;

    let layer = fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .with_thread_names(config.include_thread_names)
        .with_file(config.include_source)
        .with_line_number(config.include_source);

    Ok(match config.format {
        LogFormat::Pretty => Box::new(layer.pretty()),
        LogFormat::Compact => Box::new(layer.compact()),
        LogFormat::Json => Box::new(layer.json()),
    })
}

/// Time a block and log its duration under the `performance` span
#[macro_export]
macro_rules! trace_performance {
    ($name:expr, $block:block) => {{
        let span = tracing::info_span!("performance", operation = $name);
        let _enter = span.enter();
        let start = std::time::Instant::now();

        let result = $block;

        let duration = start.elapsed();
        tracing::debug!(
            operation = $name,
            duration_ms = duration.as_millis() as u64,
            "Performance trace"
        );

        result
    }};
}

/// Initialize logging for testing environments
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let config = LogConfig {
            level: LogLevel::Debug,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            file_path: None,
            include_source: true,
            include_thread_names: false,
            performance_tracing: true,
        };

        if let Err(e) = init_logging(&config) {
            eprintln!("Failed to initialize test logging: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert!(LogLevel::from_str("invalid").is_err());
    }

    #[test]
    fn test_log_output_accepts_stdout_alias() {
        assert_eq!(LogOutput::from_str("stdout").unwrap(), LogOutput::Stderr);
        assert_eq!(LogOutput::from_str("BOTH").unwrap(), LogOutput::Both);
        assert!(LogOutput::from_str("syslog").is_err());
    }

    #[test]
    fn test_config_presets() {
        let dev_config = LogConfig::development();
        assert_eq!(dev_config.level, LogLevel::Debug);
        assert!(dev_config.performance_tracing);

        let prod_config = LogConfig::production();
        assert_eq!(prod_config.level, LogLevel::Warn);
        assert_eq!(prod_config.format, LogFormat::Json);
        assert_eq!(prod_config.output, LogOutput::File);
    }

    #[test]
    fn file_output_writes_to_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            output: LogOutput::File,
            file_path: Some(dir.path().join("logs").join("ultrawide.log")),
            ..LogConfig::default()
        };

        let layer = create_file_layer(&config, config.file_path.as_ref().unwrap());
        assert!(layer.is_ok());
        assert!(dir.path().join("logs").join("ultrawide.log").exists());
    }

    #[test]
    fn test_performance_macro() {
        init_test_logging();

        let result = trace_performance!("test_operation", {
            std::thread::sleep(std::time::Duration::from_millis(10));
            42
        });

        assert_eq!(result, 42);
    }
}
