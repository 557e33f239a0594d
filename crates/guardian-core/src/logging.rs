//! Log setup for the `guardian` binary
//!
//! Logs go to a daily-rotated file inside the config directory the binary
//! was started with, so stdout stays free for the NDJSON event stream.
//! `GUARDIAN_LOG` overrides the filter chosen by `--verbose`.
//!
//! # Examples
//! ```bash
//! GUARDIAN_LOG=debug guardian sos
//! GUARDIAN_LOG=guardian_app=trace guardian --dir /tmp/ga share <id>
//! ```

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Environment variable that overrides the log filter
pub const LOG_ENV_VAR: &str = "GUARDIAN_LOG";

const LOG_FILE_PREFIX: &str = "guardian";
const LOG_FILE_SUFFIX: &str = "log";

/// Rotated files older than this many days are removed.
const KEEP_LOG_FILES: usize = 7;

/// Filter used when `GUARDIAN_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "guardian_angel=debug,guardian_app=debug,guardian_services=debug,info"
    } else {
        "guardian_angel=info,guardian_app=info,guardian_services=info,warn"
    }
}

/// Install the global subscriber writing to `log_dir`.
///
/// The returned guard flushes buffered lines when dropped; keep it alive
/// until the process exits.
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);

    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::config(format!("logging already initialised: {e}")))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        verbose,
        "Guardian Angel starting"
    );

    Ok(guard)
}

fn file_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(KEEP_LOG_FILES)
        .build(log_dir)
        .map_err(|e| Error::config(format!("cannot log to {}: {e}", log_dir.display())))
}
