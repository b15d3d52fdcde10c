//! Structured Logger
//!
//! Wraps `tracing` with a console layer (plain or JSON) on stderr and an
//! optional daily-rolling NDJSON file, with environment-based level control.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix for rolled log files: `sidequest.log.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "sidequest.log";

/// Initialize the global structured logger.
///
/// `RUST_LOG` takes precedence over `level`. Console output goes to stderr so
/// it never interleaves with chat transcript output on stdout. Calling this
/// twice is harmless; the second call is ignored.
pub fn init_logger(log_dir: Option<&Path>, level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let json_console = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let plain_console = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_console)
        .with(plain_console)
        .with(file_layer)
        .try_init();
}
