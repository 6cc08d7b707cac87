use std::{fmt, str::FromStr};

use crate::logger::error::LoggerError;

/// Coarse verbosity for the whole process.
///
/// Anything finer (per-target directives) goes straight into
/// [`LoggerConfig::level`](crate::LoggerConfig) as an `EnvFilter` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoggerLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LoggerLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerLevel::Trace => "trace",
            LoggerLevel::Debug => "debug",
            LoggerLevel::Info => "info",
            LoggerLevel::Warn => "warn",
            LoggerLevel::Error => "error",
        }
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LoggerLevel::Trace),
            "debug" => Ok(LoggerLevel::Debug),
            "info" => Ok(LoggerLevel::Info),
            "warn" | "warning" => Ok(LoggerLevel::Warn),
            "error" => Ok(LoggerLevel::Error),
            _ => Err(LoggerError::InvalidLogLevel(s.to_string())),
        }
    }
}
