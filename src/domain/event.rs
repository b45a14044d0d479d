use super::app_error::{ApplicationError, ErrorKind, Failure, status_text};
use super::log_level::LogLevel;
use super::metadata::Metadata;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Failure domain of an error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Validation,
    Security,
    Database,
    External,
    Application,
    System,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Validation => "validation",
            Category::Security => "security",
            Category::Database => "database",
            Category::External => "external",
            Category::Application => "application",
            Category::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-facing triage tier. Independent of the log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the persisted `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorOrigin {
    #[serde(rename = "AppError")]
    ApplicationError,
    #[serde(rename = "Error")]
    GenericFailure,
}

impl ErrorOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorOrigin::ApplicationError => "AppError",
            ErrorOrigin::GenericFailure => "Error",
        }
    }
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub method: String,
    pub url: String,
    pub ip: String,
    pub user_agent: String,
}

/// The failure that caused an event.
///
/// Application errors always carry a code and status; generic failures
/// never do.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorInfo {
    Application {
        kind: ErrorKind,
        name: String,
        message: String,
        status: u16,
        details: Option<Value>,
        stack: Option<String>,
    },
    Generic {
        name: String,
        message: String,
        stack: Option<String>,
    },
}

impl ErrorInfo {
    pub fn origin(&self) -> ErrorOrigin {
        match self {
            ErrorInfo::Application { .. } => ErrorOrigin::ApplicationError,
            ErrorInfo::Generic { .. } => ErrorOrigin::GenericFailure,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ErrorInfo::Application { name, .. } | ErrorInfo::Generic { name, .. } => name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorInfo::Application { message, .. } | ErrorInfo::Generic { message, .. } => message,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            ErrorInfo::Application { kind, .. } => Some(kind.code()),
            ErrorInfo::Generic { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ErrorInfo::Application { status, .. } => Some(*status),
            ErrorInfo::Generic { .. } => None,
        }
    }

    pub fn status_text(&self) -> Option<&'static str> {
        self.status().and_then(status_text)
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            ErrorInfo::Application { details, .. } => details.as_ref(),
            ErrorInfo::Generic { .. } => None,
        }
    }

    pub fn stack(&self) -> Option<&str> {
        match self {
            ErrorInfo::Application { stack, .. } | ErrorInfo::Generic { stack, .. } => {
                stack.as_deref()
            }
        }
    }
}

impl From<&ApplicationError> for ErrorInfo {
    fn from(err: &ApplicationError) -> Self {
        ErrorInfo::Application {
            kind: err.kind(),
            name: err.name().to_string(),
            message: err.message().to_string(),
            status: err.status(),
            details: err.details().cloned(),
            stack: Some(err.stack().to_string()),
        }
    }
}

impl From<&Failure> for ErrorInfo {
    fn from(failure: &Failure) -> Self {
        ErrorInfo::Generic {
            name: failure.name().to_string(),
            message: failure.message().to_string(),
            stack: failure.stack().map(str::to_string),
        }
    }
}

/// One normalized log call. Lives for the duration of that call.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    pub correlation_id: Option<String>,
    pub request: Option<RequestContext>,
    pub error_info: Option<ErrorInfo>,
    pub category: Option<Category>,
    pub severity: Option<Severity>,
    pub extra: Metadata,
}

impl LogEvent {
    pub fn is_error_event(&self) -> bool {
        self.error_info.is_some()
    }
}
