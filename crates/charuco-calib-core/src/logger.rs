//! Stderr logger for the calibration tools.
//!
//! Records are printed as `[elapsed LEVEL target] message`. Install it once at
//! startup with [`init_with_level`].

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let target = record.target().split("::").next().unwrap_or_default();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            target,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs the logger; later calls are no-ops.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` fmt subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. `log` records
/// are forwarded through the subscriber's `tracing-log` bridge.
#[cfg(feature = "tracing")]
pub fn init_tracing(default_level: LevelFilter, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(default_level)));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(feature = "tracing")]
fn default_directive(level: LevelFilter) -> String {
    level.as_str().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_level_wins() {
        assert!(init_with_level(LevelFilter::Warn).is_ok());
        assert!(init_with_level(LevelFilter::Trace).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn level_becomes_filter_directive() {
        assert_eq!(default_directive(LevelFilter::Warn), "warn");
        assert_eq!(default_directive(LevelFilter::Off), "off");
        assert!(EnvFilter::try_new(default_directive(LevelFilter::Debug)).is_ok());
    }
}
