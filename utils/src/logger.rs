use slog::o;
use slog::Drain;
use slog::Level;
use slog::LevelFilter;
#[cfg(all(target_os = "linux", feature = "journald"))]
use slog_journald::JournaldDrain;
#[cfg(feature = "syslog")]
use slog_syslog::Facility;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use super::error::Result;
use crate::app_config::{AppConfig, LogConfig};

const LOG_FILE_NAME: &str = "sidclean.log";
const CHANNEL_SIZE: usize = 1024;
const MEGABYTE: u64 = 1024 * 1024;

pub fn setup_logging() -> Result<slog_scope::GlobalLoggerGuard> {
    let guard = slog_scope::set_global_logger(default_root_logger()?);
    slog_stdlog::init_with_level(log_level_to_std(configured_level()))?;

    Ok(guard)
}

pub fn default_root_logger() -> Result<slog::Logger> {
    let log_level = configured_level();

    let term_drain = default_term_drain().or_else(|_| default_discard())?;
    let file_drain = default_file_drain().or_else(|_| default_discard())?;

    let drain = slog::Duplicate(term_drain, file_drain).fuse();

    #[cfg(feature = "syslog")]
    let drain = slog::Duplicate(default_syslog_drain().or_else(|_| default_discard())?, drain).fuse();
    #[cfg(feature = "journald")]
    #[cfg(target_os = "linux")]
    let drain = slog::Duplicate(
        default_journald_drain().or_else(|_| default_discard())?,
        drain,
    )
    .fuse();

    let drain = LevelFilter::new(drain, log_level).fuse();

    Ok(slog::Logger::root(drain, o!()))
}

/// Maps the `log.level` setting onto a slog level; unknown or missing values fall back to info.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" | "warning" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

fn configured_level() -> Level {
    AppConfig::get::<LogConfig>("log")
        .map(|config| parse_level(&config.level))
        .unwrap_or(Level::Info)
}

fn log_level_to_std(level: Level) -> log::Level {
    match level {
        Level::Critical | Level::Error => log::Level::Error,
        Level::Warning => log::Level::Warn,
        Level::Info => log::Level::Info,
        Level::Debug => log::Level::Debug,
        Level::Trace => log::Level::Trace,
    }
}

fn default_discard() -> Result<slog_async::Async> {
    let drain = slog_async::Async::new(slog::Discard)
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

// term drain: Log to Terminal
fn default_term_drain() -> Result<slog_async::Async> {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let term = slog_term::FullFormat::new(plain)
        .use_file_location()
        .use_custom_timestamp(slog_term::timestamp_local);

    let drain = slog_async::Async::new(term.build().fuse())
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

/// `logs/` beside the executable, or beside the working directory when that is not usable.
pub fn log_directory() -> Result<PathBuf> {
    let mut exe_dir = std::env::current_exe()?;
    exe_dir.pop();

    if !exe_dir.exists() {
        exe_dir = std::env::current_dir()?;
    }

    Ok(exe_dir.join("logs"))
}

/// Shifts `sidclean.log` to `sidclean.log.1` (and older backups up by one) once it
/// reaches `max_bytes`. Backups past `max_backups` are removed; 0 keeps none.
pub fn rotate_log(log_dir: &Path, max_bytes: u64, max_backups: u8) -> Result<bool> {
    let current = log_dir.join(LOG_FILE_NAME);
    let size = match std::fs::metadata(&current) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if max_bytes == 0 || size < max_bytes {
        return Ok(false);
    }

    let backup = |n: u8| log_dir.join(format!("{LOG_FILE_NAME}.{n}"));
    if max_backups == 0 {
        std::fs::remove_file(&current)?;
        return Ok(true);
    }
    let oldest = backup(max_backups);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }
    for n in (1..max_backups).rev() {
        let from = backup(n);
        if from.exists() {
            std::fs::rename(&from, backup(n + 1))?;
        }
    }
    std::fs::rename(&current, backup(1))?;
    Ok(true)
}

// file drain: Log to file
fn default_file_drain() -> Result<slog_async::Async> {
    let log_dir = log_directory()?;
    std::fs::create_dir_all(&log_dir)?;
    if let Ok(config) = AppConfig::get::<LogConfig>("log") {
        rotate_log(&log_dir, config.max_size.saturating_mul(MEGABYTE), config.max_backups)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))?;

    let decorator = slog_term::PlainSyncDecorator::new(file);
    let formatter = slog_term::FullFormat::new(decorator)
        .use_file_location()
        .use_custom_timestamp(slog_term::timestamp_local)
        .build()
        .fuse();

    let drain = slog_async::Async::new(formatter)
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

// syslog drain: Log to syslog
#[cfg(feature = "syslog")]
fn default_syslog_drain() -> Result<slog_async::Async> {
    let syslog = slog_syslog::unix_3164(Facility::LOG_USER)?;

    let drain = slog_async::Async::new(syslog.fuse())
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn default_journald_drain() -> Result<slog_async::Async> {
    let journald = JournaldDrain.ignore_res();
    let drain = slog_async::Async::new(journald)
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_config_spellings() {
        assert_eq!(parse_level("debug"), Level::Debug);
        assert_eq!(parse_level(" WARN "), Level::Warning);
        assert_eq!(parse_level("error"), Level::Error);
        assert_eq!(parse_level("verbose"), Level::Info);
    }

    #[test]
    fn rotation_shifts_backups_and_drops_the_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(LOG_FILE_NAME);
        std::fs::write(&log, "current log").unwrap();
        std::fs::write(dir.path().join("sidclean.log.1"), "one").unwrap();
        std::fs::write(dir.path().join("sidclean.log.2"), "two").unwrap();

        assert!(rotate_log(dir.path(), 4, 2).unwrap());
        assert!(!log.exists());
        let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("sidclean.log.1"), "current log");
        assert_eq!(read("sidclean.log.2"), "one");
        assert!(!dir.path().join("sidclean.log.3").exists());
    }

    #[test]
    fn small_or_missing_log_is_left_in_place() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!rotate_log(dir.path(), 4, 2).unwrap());

        std::fs::write(dir.path().join(LOG_FILE_NAME), "ab").unwrap();
        assert!(!rotate_log(dir.path(), 4, 2).unwrap());
        assert!(dir.path().join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn std_level_mapping_is_monotonic() {
        assert_eq!(log_level_to_std(Level::Critical), log::Level::Error);
        assert_eq!(log_level_to_std(Level::Warning), log::Level::Warn);
        assert_eq!(log_level_to_std(Level::Trace), log::Level::Trace);
    }
}
