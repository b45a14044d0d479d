//! Domain layer.
//!
//! Contains the canonical types shared across the pipeline:
//! - `ApplicationError` / `ErrorKind`: the error taxonomy
//! - `Failure`: untyped failures
//! - `Metadata`: ordered metadata attached to a log call
//! - `LogEvent`: the normalized event every renderer consumes

pub mod app_error;
pub mod event;
pub mod log_level;
pub mod metadata;

pub use app_error::{ApplicationError, ErrorKind, ErrorResponse, Failure, HttpStatus, KindProfile};
pub use event::{Category, ErrorInfo, ErrorOrigin, LogEvent, RequestContext, Severity};
pub use log_level::{LogLevel, UnknownLevel};
pub use metadata::{MetaValue, Metadata};
