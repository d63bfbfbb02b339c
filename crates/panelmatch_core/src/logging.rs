//! Logging bootstrap for assignment runs.
//!
//! # Responsibility
//! - Initialize the `log` backend exactly once per process, either as
//!   rolling files or on stderr.
//! - Keep events metadata-only; patient ids appear only at debug/trace.
//!
//! # Invariants
//! - Init is idempotent for the same level and sink.
//! - Re-initialization with a different level or sink is rejected.
//! - Initialization never panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "panelmatch";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stderr,
    Directory(PathBuf),
}

impl LogSink {
    fn describe(&self) -> String {
        match self {
            Self::Stderr => "stderr".to_string(),
            Self::Directory(dir) => dir.display().to_string(),
        }
    }
}

struct LoggingState {
    level: &'static str,
    sink: LogSink,
    _logger: LoggerHandle,
}

/// Initializes logging with a level and an optional absolute log directory.
///
/// `None` logs to stderr, which is what the CLI uses by default.
///
/// # Errors
/// - Unsupported `level`.
/// - `log_dir` blank, relative, or not creatable.
/// - Logging already active with a different level or sink.
/// - Backend setup failure.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> Result<(), String> {
    let level = normalize_level(level)?;
    let sink = match log_dir {
        Some(dir) => LogSink::Directory(normalize_log_dir(dir)?),
        None => LogSink::Stderr,
    };

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(level, sink.clone()))?;
    check_matches(state, level, &sink)
}

/// Returns `(level, sink)` when logging is active.
pub fn logging_status() -> Option<(&'static str, LogSink)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.sink.clone()))
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: &'static str, sink: LogSink) -> Result<LoggingState, String> {
    let logger = Logger::try_with_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?;

    let logger = match &sink {
        LogSink::Stderr => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::detailed_format),
        LogSink::Directory(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                format!("failed to create log directory `{}`: {err}", dir.display())
            })?;
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(dir.as_path())
                        .basename(LOG_FILE_BASENAME),
                )
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
    };

    let handle = logger
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();

    info!(
        "event=app_start module=core status=ok platform={} build_mode={} version={} level={} sink={}",
        std::env::consts::OS,
        build_mode(),
        env!("CARGO_PKG_VERSION"),
        level,
        sink.describe()
    );

    Ok(LoggingState {
        level,
        sink,
        _logger: handle,
    })
}

fn check_matches(state: &LoggingState, level: &str, sink: &LogSink) -> Result<(), String> {
    if &state.sink != sink {
        return Err(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            state.sink.describe(),
            sink.describe()
        ));
    }
    if state.level != level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, level
        ));
    }
    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn build_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Payloads may echo roster values; keep them single-line and short.
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_summary(panic_info);
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location, payload
        );
        previous_hook(panic_info);
    }));
}

fn panic_payload_summary(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::{
        init_logging, logging_status, normalize_level, normalize_log_dir, sanitize_message,
        LogSink,
    };

    #[test]
    fn normalize_level_accepts_known_values() {
        assert_eq!(normalize_level("INFO").unwrap(), "info");
        assert_eq!(normalize_level(" warning ").unwrap(), "warn");
        assert!(normalize_level("verbose").is_err());
    }

    #[test]
    fn normalize_log_dir_rejects_relative_and_blank_paths() {
        let error = normalize_log_dir("logs/dev").expect_err("relative paths must be rejected");
        assert!(error.contains("absolute"));
        assert!(normalize_log_dir("   ").is_err());
    }

    #[test]
    fn sanitize_message_removes_newlines_and_truncates() {
        let sanitized = sanitize_message("line1\nline2\rline3", 8);
        assert!(!sanitized.contains('\n'));
        assert!(!sanitized.contains('\r'));
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn init_logging_is_idempotent_and_rejects_conflicts() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dir_str = dir.path().to_str().expect("utf-8 temp dir").to_string();

        init_logging("info", Some(&dir_str)).expect("first init should succeed");
        init_logging("info", Some(&dir_str)).expect("same config should be idempotent");

        let level_error =
            init_logging("debug", Some(&dir_str)).expect_err("level conflict should fail");
        assert!(level_error.contains("refusing to switch"));

        let sink_error = init_logging("info", None).expect_err("sink conflict should fail");
        assert!(sink_error.contains("refusing to switch"));

        let (level, sink) = logging_status().expect("logging should be active");
        assert_eq!(level, "info");
        assert_eq!(sink, LogSink::Directory(dir.path().to_path_buf()));
    }
}
