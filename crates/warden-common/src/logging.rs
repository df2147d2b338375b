//! Logging setup shared by the pg_warden binaries
//!
//! A binary starts from [`LogConfig::for_service`], overlays the `LOG_*`
//! environment with [`LogConfig::with_env`] and installs the subscriber with
//! [`init_logging`]. Output goes to the console, to a daily rotated file, or
//! both, as text or JSON.
//!
//! Use the structured `tracing` macros with fields rather than `println!`:
//!
//! ```rust
//! use tracing::{info, warn};
//!
//! let table = "products";
//! info!(table = %table, changed = true, "Protection enabled");
//! warn!(table = %table, reason = "table is protected", "Operation blocked");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use warden_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::for_service("warden-server", "sqlx=warn").with_env()?;
//!     // Keep the guard alive so buffered file output is flushed on exit.
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("gateway started");
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn writes_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(anyhow!("expected console, file or both")),
        }
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow!("expected text or json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    pub format: LogFormat,

    /// Directory for rotated log files, used when `output` includes a file
    pub log_dir: PathBuf,

    /// File name prefix, e.g. "warden-server" -> "warden-server.2026-01-18"
    pub log_file_prefix: String,

    /// Extra filter directives such as "sqlx=warn,tower_http=debug"
    pub filter_directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "pg-warden".to_string(),
            filter_directives: None,
        }
    }
}

impl LogConfig {
    /// Defaults for one binary: log files named after it and its own filter
    /// directives.
    pub fn for_service(prefix: impl Into<String>, directives: impl Into<String>) -> Self {
        Self {
            log_file_prefix: prefix.into(),
            filter_directives: Some(directives.into()),
            ..Self::default()
        }
    }

    /// Overlay the process environment
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`: directory for log files
    /// - `LOG_FILE_PREFIX`: prefix for log files
    /// - `LOG_FILTER`: filter directives, replacing the service defaults
    ///
    /// A variable that is set but malformed is an error.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(level) = var("LOG_LEVEL") {
            self.level = parse_var("LOG_LEVEL", &level)?;
        }
        if let Some(output) = var("LOG_OUTPUT") {
            self.output = parse_var("LOG_OUTPUT", &output)?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.format = parse_var("LOG_FORMAT", &format)?;
        }
        if let Some(dir) = var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = var("LOG_FILE_PREFIX") {
            self.log_file_prefix = prefix;
        }
        if let Some(filter) = var("LOG_FILTER") {
            self.filter_directives = Some(filter);
        }
        Ok(self)
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::from_default_env().add_directive(self.level.into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                filter = filter.add_directive(
                    directive
                        .parse()
                        .with_context(|| format!("Failed to parse filter directive '{directive}'"))?,
                );
            }
        }

        Ok(filter)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {name} value '{value}': {e}"))
}

/// Install the global tracing subscriber.
///
/// Call once at start-up. When file output is enabled the returned guard owns
/// the background writer; dropping it flushes and stops file logging.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.output.writes_console() {
        layers.push(fmt_layer(config.format, std::io::stdout, true));
    }

    if config.output.writes_file() {
        std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(config.format, writer, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_span_events(FmtSpan::CLOSE);

    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(vars: &[(&str, &str)]) -> Result<LogConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogConfig::for_service("warden-server", "sqlx=warn").with_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_env_overlays_service_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = overlay(&[
            ("LOG_LEVEL", "DEBUG"),
            ("LOG_OUTPUT", "all"),
            ("LOG_FORMAT", "json"),
            ("LOG_DIR", dir.path().to_str().unwrap()),
        ])
        .unwrap();

        assert_eq!(config.level, Level::DEBUG);
        assert!(config.output.writes_console() && config.output.writes_file());
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, dir.path());
        // Unset variables keep the service values.
        assert_eq!(config.log_file_prefix, "warden-server");
        assert_eq!(config.filter_directives.as_deref(), Some("sqlx=warn"));
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_malformed_variable_is_an_error() {
        let err = overlay(&[("LOG_LEVEL", "loud")]).unwrap_err();
        assert!(err.to_string().contains("LOG_LEVEL"));
        assert!(overlay(&[("LOG_OUTPUT", "syslog")]).is_err());
        assert!(overlay(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_bad_filter_directive_is_reported() {
        let config = overlay(&[("LOG_FILTER", "sqlx=loud")]).unwrap();
        assert!(config.env_filter().is_err());
    }
}
