//! Tracing setup for hosts that do not bring their own subscriber
//!
//! The engine logs under the `cbba` target; pass a directive string such as
//! `"info"` or `"warn,cbba=debug"` to control verbosity.

use std::io;
use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;

/// Local wall-clock time, millisecond precision. Allocation rounds are
/// sub-second, so the date is left to the host's log rotation.
#[derive(Clone, Copy)]
struct WallClock;

impl FormatTime for WallClock {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Invalid directive strings degrade to "info" rather than erroring: a bad
/// log level should never keep a fleet from starting.
fn parse_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize a stdout-only subscriber.
///
/// # Arguments
///
/// * `level` - EnvFilter directive string, e.g. "info" or "cbba=debug"
pub fn init(level: &str) {
    tracing_subscriber::fmt()
        .with_timer(WallClock)
        .with_env_filter(parse_filter(level))
        .init();
}

/// Initialize a subscriber that logs to stdout and mirrors events into a
/// non-blocking log file, compact and colorless for post-run inspection.
///
/// # Arguments
///
/// * `log_path` - File to create and append log lines to
/// * `level` - EnvFilter directive string, applied to both outputs
///
/// # Returns
///
/// The appender guard; keep it alive until shutdown or buffered lines are
/// lost.
pub fn init_with_file(log_path: impl AsRef<Path>, level: &str) -> Result<WorkerGuard, Error> {
    let file = std::fs::File::create(log_path).map_err(|e| Error::Io(e.to_string()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(WallClock)
                .with_writer(io::stdout)
                .with_filter(parse_filter(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_timer(WallClock)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(parse_filter(level)),
        )
        .init();

    Ok(guard)
}
