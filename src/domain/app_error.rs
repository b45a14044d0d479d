//! Application error taxonomy.
//!
//! Every failure the service understands is an [`ApplicationError`] tagged
//! with an [`ErrorKind`]. The kind's [`KindProfile`] is the only table that
//! maps a kind to its code, HTTP status, default message and log category;
//! adding a kind means adding one arm to [`ErrorKind::profile`].

use super::event::Category;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    Internal,
    ExternalService,
    Database,
}

/// Everything the pipeline needs to know about a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindProfile {
    pub code: &'static str,
    pub name: &'static str,
    pub status: HttpStatus,
    pub default_message: &'static str,
    pub category: Category,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Validation,
        ErrorKind::Authentication,
        ErrorKind::Authorization,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::Internal,
        ErrorKind::ExternalService,
        ErrorKind::Database,
    ];

    pub const fn profile(self) -> KindProfile {
        match self {
            ErrorKind::Validation => KindProfile {
                code: "VALIDATION_ERROR",
                name: "ValidationError",
                status: HttpStatus::BadRequest,
                default_message: "Validation failed",
                category: Category::Validation,
            },
            ErrorKind::Authentication => KindProfile {
                code: "AUTHENTICATION_ERROR",
                name: "AuthenticationError",
                status: HttpStatus::Unauthorized,
                default_message: "Authentication failed",
                category: Category::Security,
            },
            ErrorKind::Authorization => KindProfile {
                code: "AUTHORIZATION_ERROR",
                name: "AuthorizationError",
                status: HttpStatus::Forbidden,
                default_message: "Not authorized",
                category: Category::Security,
            },
            ErrorKind::NotFound => KindProfile {
                code: "NOT_FOUND_ERROR",
                name: "NotFoundError",
                status: HttpStatus::NotFound,
                default_message: "Resource not found",
                category: Category::Application,
            },
            ErrorKind::Conflict => KindProfile {
                code: "CONFLICT_ERROR",
                name: "ConflictError",
                status: HttpStatus::Conflict,
                default_message: "Resource conflict",
                category: Category::Application,
            },
            ErrorKind::Internal => KindProfile {
                code: "INTERNAL_ERROR",
                name: "InternalError",
                status: HttpStatus::InternalServerError,
                default_message: "Internal server error",
                category: Category::Application,
            },
            ErrorKind::ExternalService => KindProfile {
                code: "EXTERNAL_SERVICE_ERROR",
                name: "ExternalServiceError",
                status: HttpStatus::ServiceUnavailable,
                default_message: "External service error",
                category: Category::External,
            },
            ErrorKind::Database => KindProfile {
                code: "DATABASE_ERROR",
                name: "DatabaseError",
                status: HttpStatus::InternalServerError,
                default_message: "Database error",
                category: Category::Database,
            },
        }
    }

    pub const fn code(self) -> &'static str {
        self.profile().code
    }

    pub const fn default_status(self) -> u16 {
        self.profile().status.code()
    }

    /// Reverse lookup from a stable code such as `DATABASE_ERROR`.
    pub fn from_code(code: &str) -> Option<ErrorKind> {
        ErrorKind::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// HTTP statuses the service answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpStatus {
    Ok,
    Created,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InternalServerError,
    ServiceUnavailable,
}

impl HttpStatus {
    pub const ALL: [HttpStatus; 9] = [
        HttpStatus::Ok,
        HttpStatus::Created,
        HttpStatus::BadRequest,
        HttpStatus::Unauthorized,
        HttpStatus::Forbidden,
        HttpStatus::NotFound,
        HttpStatus::Conflict,
        HttpStatus::InternalServerError,
        HttpStatus::ServiceUnavailable,
    ];

    pub const fn code(self) -> u16 {
        match self {
            HttpStatus::Ok => 200,
            HttpStatus::Created => 201,
            HttpStatus::BadRequest => 400,
            HttpStatus::Unauthorized => 401,
            HttpStatus::Forbidden => 403,
            HttpStatus::NotFound => 404,
            HttpStatus::Conflict => 409,
            HttpStatus::InternalServerError => 500,
            HttpStatus::ServiceUnavailable => 503,
        }
    }

    pub const fn text(self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::Created => "CREATED",
            HttpStatus::BadRequest => "BAD_REQUEST",
            HttpStatus::Unauthorized => "UNAUTHORIZED",
            HttpStatus::Forbidden => "FORBIDDEN",
            HttpStatus::NotFound => "NOT_FOUND",
            HttpStatus::Conflict => "CONFLICT",
            HttpStatus::InternalServerError => "INTERNAL_SERVER_ERROR",
            HttpStatus::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn from_code(code: u16) -> Option<HttpStatus> {
        HttpStatus::ALL.into_iter().find(|status| status.code() == code)
    }
}

/// `statusText` for a numeric status, if the service knows it.
pub fn status_text(code: u16) -> Option<&'static str> {
    HttpStatus::from_code(code).map(HttpStatus::text)
}

/// A failure understood by the service.
///
/// Immutable once built. Cloning and serializing never touch the captured
/// stack.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ApplicationError {
    kind: ErrorKind,
    message: String,
    status: u16,
    details: Option<Value>,
    created_at: DateTime<Utc>,
    stack: String,
}

impl ApplicationError {
    pub fn new(kind: ErrorKind, message: Option<&str>, details: Option<Value>) -> Self {
        let profile = kind.profile();
        let message = message.unwrap_or(profile.default_message).to_string();
        let stack = capture_stack(profile.name, &message);
        Self {
            kind,
            message,
            status: profile.status.code(),
            details: details.filter(|value| !value.is_null()),
            created_at: Utc::now(),
            stack,
        }
    }

    pub fn validation(message: &str) -> Self {
        Self::new(ErrorKind::Validation, Some(message), None)
    }

    pub fn authentication() -> Self {
        Self::new(ErrorKind::Authentication, None, None)
    }

    pub fn authorization() -> Self {
        Self::new(ErrorKind::Authorization, None, None)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(ErrorKind::NotFound, Some(message), None)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(ErrorKind::Conflict, Some(message), None)
    }

    pub fn internal(message: &str) -> Self {
        Self::new(ErrorKind::Internal, Some(message), None)
    }

    pub fn external_service(message: &str) -> Self {
        Self::new(ErrorKind::ExternalService, Some(message), None)
    }

    pub fn database(message: &str) -> Self {
        Self::new(ErrorKind::Database, Some(message), None)
    }

    /// Same error with a status other than the kind's default.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details).filter(|value| !value.is_null());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.profile().name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> Option<&'static str> {
        status_text(self.status)
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// ISO-8601 creation time with millisecond precision.
    pub fn timestamp(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn to_structured(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message.clone(),
            status: self.status,
            details: self.details.clone(),
            timestamp: self.timestamp(),
            path: None,
        }
    }
}

/// Wire shape of an error returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorResponse {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// An untyped failure: anything that went wrong without an [`ErrorKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    name: String,
    message: String,
    stack: Option<String>,
}

impl Failure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        let message = message.into();
        let stack = Some(format!("{name}: {message}"));
        Self {
            name,
            message,
            stack,
        }
    }

    /// Captures the error's display text and its `source()` chain.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let name = short_type_name(std::any::type_name::<E>());
        let message = err.to_string();
        let mut stack = format!("{name}: {message}");
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            name,
            message,
            stack: Some(stack),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn without_stack(mut self) -> Self {
        self.stack = None;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

fn capture_stack(name: &str, message: &str) -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => format!("{name}: {message}\n{backtrace}"),
        _ => format!("{name}: {message}"),
    }
}

fn short_type_name(full: &str) -> String {
    if full.starts_with("dyn ") {
        return "Error".to_string();
    }
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_table() {
        let expected = [
            (ErrorKind::Validation, 400),
            (ErrorKind::Authentication, 401),
            (ErrorKind::Authorization, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Conflict, 409),
            (ErrorKind::Internal, 500),
            (ErrorKind::ExternalService, 503),
            (ErrorKind::Database, 500),
        ];
        for (kind, status) in expected {
            assert_eq!(ApplicationError::new(kind, None, None).status(), status);
        }
    }

    #[test]
    fn test_default_message_used_when_absent() {
        let err = ApplicationError::authorization();
        assert_eq!(err.message(), "Not authorized");
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");
        assert_eq!(err.name(), "AuthorizationError");
    }

    #[test]
    fn test_codes_round_trip_through_lookup() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("TEAPOT"), None);
    }

    #[test]
    fn test_to_structured_is_idempotent() {
        let err = ApplicationError::new(
            ErrorKind::Conflict,
            Some("email taken"),
            Some(json!({"field": "email"})),
        );
        let first = serde_json::to_string(&err.to_structured()).unwrap();
        let second = serde_json::to_string(&err.to_structured()).unwrap();
        assert_eq!(first, second);
        assert_eq!(err.to_structured().status, 409);
        assert!(first.contains("\"details\":{\"field\":\"email\"}"));
        assert!(!first.contains("path"));
    }

    #[test]
    fn test_to_structured_leaves_stack_untouched() {
        let err = ApplicationError::database("connection reset");
        let before = err.stack().to_string();
        let _ = err.to_structured();
        let _ = err.clone().to_structured();
        assert_eq!(err.stack(), before);
        assert!(before.starts_with("DatabaseError: connection reset"));
    }

    #[test]
    fn test_null_details_are_absent() {
        let err = ApplicationError::new(ErrorKind::Internal, None, Some(Value::Null));
        assert!(err.details().is_none());
    }

    #[test]
    fn test_with_status_overrides_default() {
        let err = ApplicationError::external_service("upstream timeout").with_status(504);
        assert_eq!(err.status(), 504);
        assert_eq!(err.status_text(), None);
        assert_eq!(err.kind(), ErrorKind::ExternalService);
    }

    #[test]
    fn test_error_response_with_path() {
        let response = ApplicationError::not_found("Route GET /nope not found")
            .to_structured()
            .with_path("/nope");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["path"], "/nope");
        assert_eq!(json["code"], "NOT_FOUND_ERROR");
    }

    #[test]
    fn test_status_text_lookup() {
        assert_eq!(status_text(503), Some("SERVICE_UNAVAILABLE"));
        assert_eq!(status_text(418), None);
    }

    #[test]
    fn test_failure_from_error_walks_source_chain() {
        #[derive(Error, Debug)]
        #[error("pool exhausted")]
        struct PoolError {
            #[source]
            source: std::io::Error,
        }

        let err = PoolError {
            source: std::io::Error::other("socket closed"),
        };
        let failure = Failure::from_error(&err);
        assert_eq!(failure.name(), "PoolError");
        assert_eq!(failure.message(), "pool exhausted");
        let stack = failure.stack().unwrap();
        assert!(stack.starts_with("PoolError: pool exhausted"));
        assert!(stack.contains("caused by: socket closed"));
    }

    #[test]
    fn test_failure_from_dyn_error_is_named_error() {
        let boxed: Box<dyn std::error::Error> = "boom".into();
        let failure = Failure::from_error(boxed.as_ref());
        assert_eq!(failure.name(), "Error");
        assert_eq!(failure.message(), "boom");
    }
}
