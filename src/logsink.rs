//! Append-only invocation log.

use crate::config::LogTarget;
use crate::error::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Where timestamped invocation lines are appended
#[derive(Debug, Clone)]
pub enum LogSink {
    File(PathBuf),
    Memory(Arc<Mutex<String>>),
}

impl LogSink {
    /// Sink for `target`, or `None` when logging is off
    pub fn from_target(target: &LogTarget) -> Option<Self> {
        match target {
            LogTarget::None => None,
            LogTarget::File(path) => Some(LogSink::File(path.clone())),
            LogTarget::Memory => Some(LogSink::memory()),
        }
    }

    pub fn memory() -> Self {
        LogSink::Memory(Arc::new(Mutex::new(String::new())))
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.append("INFO", message)
    }

    pub fn error(&self, message: &str) -> Result<()> {
        self.append("ERROR", message)
    }

    fn append(&self, level: &str, message: &str) -> Result<()> {
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            message.trim_end()
        );

        match self {
            LogSink::File(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(line.as_bytes())?;
            }
            LogSink::Memory(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push_str(&line);
            }
        }
        Ok(())
    }

    /// Everything logged so far
    pub fn collect(&self) -> Result<String> {
        match self {
            LogSink::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(e.into()),
            },
            LogSink::Memory(buffer) => Ok(buffer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()),
        }
    }
}
