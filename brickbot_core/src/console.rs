// brickbot_core/src/console.rs

use std::collections::VecDeque;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Simulation time in milliseconds.
    pub timestamp: f64,
    pub message: String,
}

/// Messages written by the robot program, kept for monitoring UIs.
///
/// The console is bounded; once full, the oldest entry is dropped. Every entry
/// is also emitted as a `tracing` event with target `robot`.
#[derive(Debug, Clone)]
pub struct RobotConsole {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for RobotConsole {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl RobotConsole {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, level: LogLevel, timestamp: f64, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!(target: "robot", "[{:.0} ms] {}", timestamp, message),
            LogLevel::Warning => warn!(target: "robot", "[{:.0} ms] {}", timestamp, message),
            LogLevel::Error => error!(target: "robot", "[{:.0} ms] {}", timestamp, message),
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            level,
            timestamp,
            message,
        });
    }

    pub fn info(&mut self, timestamp: f64, message: impl Into<String>) {
        self.push(LogLevel::Info, timestamp, message);
    }

    pub fn warning(&mut self, timestamp: f64, message: impl Into<String>) {
        self.push(LogLevel::Warning, timestamp, message);
    }

    pub fn error(&mut self, timestamp: f64, message: impl Into<String>) {
        self.push(LogLevel::Error, timestamp, message);
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
