// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Injected logging capability.
//!
//! Every component receives a [`SharedLogger`] at construction and logs under
//! its own source name, so tests can silence output or count records instead
//! of relying on a global subscriber.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, source: &str, args: fmt::Arguments<'_>);

    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }

    fn debug(&self, source: &str, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Debug) {
            self.log(LogLevel::Debug, source, args);
        }
    }

    fn info(&self, source: &str, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Info) {
            self.log(LogLevel::Info, source, args);
        }
    }

    fn warn(&self, source: &str, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Warn) {
            self.log(LogLevel::Warn, source, args);
        }
    }

    fn error(&self, source: &str, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Error) {
            self.log(LogLevel::Error, source, args);
        }
    }
}

pub type SharedLogger = Arc<dyn Logger>;

/// Forwards records to `tracing`, with the component name as the `source` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger {
    min_level: LogLevel,
}

impl TracingLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    pub fn shared(min_level: LogLevel) -> SharedLogger {
        Arc::new(Self::new(min_level))
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, source: &str, args: fmt::Arguments<'_>) {
        match level {
            LogLevel::Debug => tracing::debug!(source, "{}", args),
            LogLevel::Info => tracing::info!(source, "{}", args),
            LogLevel::Warn => tracing::warn!(source, "{}", args),
            LogLevel::Error => tracing::error!(source, "{}", args),
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

/// Keeps every record in memory. Used by tests to assert on diagnostics.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.records().iter().filter(|r| r.level == level).count()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, source: &str, args: fmt::Arguments<'_>) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                source: source.to_string(),
                message: args.to_string(),
            });
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _source: &str, _args: fmt::Arguments<'_>) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}
