/// Logger setup: env_logger on stderr, optionally teed into a log file
/// under the config directory.
use env_logger::Logger;
use log::{Log, Metadata, Record, SetLoggerError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config;

struct LogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    fn new(path: PathBuf) -> Self {
        let file = Self::open(&path).ok();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn append_line(&self, line: &str) {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_none() {
            if let Ok(file) = Self::open(&self.path) {
                *guard = Some(file);
            } else {
                return;
            }
        }
        if let Some(file) = guard.as_mut() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.write_all(b"\n");
            let _ = file.flush();
        }
    }
}

fn format_log_line(record: &Record<'_>) -> String {
    format!(
        "{} [{}] [{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.level(),
        record.target(),
        record.args().to_string().replace('\n', "\\n")
    )
}

struct TeeLogger {
    inner: Logger,
    file: Option<LogFile>,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.inner.log(record);
        if let Some(file) = &self.file {
            file.append_line(&format_log_line(record));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

pub fn log_file_path() -> PathBuf {
    config::config_dir().join("logs").join("dealflow.log")
}

/// Install the process logger. Filter defaults to `info`, `RUST_LOG`
/// overrides it. Returns the log file path when mirroring is on.
pub fn init(to_file: bool) -> Result<Option<PathBuf>, SetLoggerError> {
    let builder_logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .build();
    let max_level = builder_logger.filter();
    let file = to_file.then(|| LogFile::new(log_file_path()));
    let path = file.as_ref().map(|f| f.path.clone());
    let logger = Box::leak(Box::new(TeeLogger {
        inner: builder_logger,
        file,
    }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(path)
}
