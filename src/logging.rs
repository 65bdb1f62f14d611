//! Structured logging setup
//!
//! Logs always go to stderr: on the stdio transport stdout carries JSON-RPC
//! frames and must stay clean.
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Output encoding for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Invalid log format: {}", other),
        }
    }
}

/// Build the filter, falling back to `default_level` when `RUST_LOG` is unset
pub fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Install the global subscriber
///
/// `verbose` forces DEBUG regardless of the configured level.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))?
    };
    let format: LogFormat = config.format.parse()?;
    let filter = env_filter(level);

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal());

    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::{debug, info, warn};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_level_filtering() {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = fmt()
            .with_max_level(Level::INFO)
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden detail");
            info!("command approved");
            warn!("command denied");
        });

        let text = sink.text();
        assert!(!text.contains("hidden detail"));
        assert!(text.contains("command approved"));
        assert!(text.contains("command denied"));
    }

    #[test]
    fn test_json_output_is_parseable() {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = fmt().json().with_writer(move || writer.clone()).finish();

        tracing::subscriber::with_default(subscriber, || {
            info!(tool = "call_kubectl", "tool call completed");
        });

        let text = sink.text();
        let line = text.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["tool"], "call_kubectl");
        assert_eq!(value["fields"]["message"], "tool call completed");
    }

    #[test]
    fn test_init_rejects_bad_format() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert!(init(&config, false).is_err());
    }
}
