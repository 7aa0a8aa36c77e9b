//! Process-wide logger bootstrap for the `feedstore` binary.
//!
//! The library only emits through the `log` facade; embedding services
//! install their own logger. Initialization happens at most once per
//! process: stderr by default, size-rotated files when a directory is given.

use std::path::{Path, PathBuf};

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;

use crate::errors::{StoreError, StoreResult};

const LOG_FILE_BASENAME: &str = "feedstore";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: Option<PathBuf>,
    _logger: LoggerHandle,
}

/// Starts logging at `level`, to rotating files under `log_dir` or to
/// stderr. Repeating the same call is a no-op; a different level or
/// destination is rejected.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> StoreResult<()> {
    let level = normalize_level(level)?;
    let log_dir = log_dir.map(Path::to_path_buf);

    let state = LOGGING_STATE.get_or_try_init(|| -> StoreResult<LoggingState> {
        let logger = Logger::try_with_str(level)
            .map_err(|err| StoreError::configuration(format!("invalid log level `{level}`: {err}")))?;
        let logger = match &log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|err| {
                    StoreError::configuration(format!(
                        "creating log directory {}: {err}",
                        dir.display()
                    ))
                })?;
                logger
                    .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
                    .rotate(
                        Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                        Naming::Numbers,
                        Cleanup::KeepLogFiles(MAX_LOG_FILES),
                    )
                    .write_mode(WriteMode::BufferAndFlush)
                    .append()
                    .format_for_files(flexi_logger::detailed_format)
            }
            None => logger.log_to_stderr().format(flexi_logger::default_format),
        };
        let handle = logger
            .start()
            .map_err(|err| StoreError::configuration(format!("starting logger: {err}")))?;

        info!(
            "event=app_start module=logging status=ok version={} level={}",
            env!("CARGO_PKG_VERSION"),
            level
        );
        Ok(LoggingState {
            level,
            log_dir: log_dir.clone(),
            _logger: handle,
        })
    })?;

    if state.level != level || state.log_dir != log_dir {
        return Err(StoreError::configuration(format!(
            "logging already initialized with level `{}`; refusing to switch",
            state.level
        )));
    }
    Ok(())
}

pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) { "debug" } else { "info" }
}

fn normalize_level(level: &str) -> StoreResult<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(StoreError::configuration(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        ))),
    }
}
