use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Level of a log call, ordered from most to least important.
///
/// A destination with minimum level `L` accepts every call whose level is
/// at least as important as `L` (`error` passes every filter, `debug` only
/// the most permissive one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Http,
    Debug,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level '{0}' (expected error|warn|info|http|debug)")]
pub struct UnknownLevel(pub String);

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Http,
        LogLevel::Debug,
    ];

    /// Lower is more important.
    pub const fn priority(self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Http => 3,
            LogLevel::Debug => 4,
        }
    }

    /// Whether a call at `self` passes a filter set to `minimum`.
    pub const fn passes(self, minimum: LogLevel) -> bool {
        self.priority() <= minimum.priority()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}
