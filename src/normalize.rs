//! Turns a raw log call into a [`LogEvent`].
//!
//! Normalization is total: any metadata shape produces an event. Values the
//! normalizer does not recognize stay in the event's extra metadata.

use crate::classify::classify;
use crate::domain::{ErrorInfo, Failure, LogEvent, LogLevel, MetaValue, Metadata, RequestContext};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashSet;

pub const CORRELATION_ID_KEY: &str = "correlationId";
pub const REQUEST_KEY: &str = "request";
pub const ERROR_KEY: &str = "error";

/// Top-level fields of a persisted record. Extra metadata may not shadow them.
pub const RESERVED_KEYS: [&str; 14] = [
    "timestamp",
    "level",
    "message",
    "service",
    "correlationId",
    "request",
    "type",
    "code",
    "status",
    "statusText",
    "details",
    "stack",
    "errorCategory",
    "severity",
];

pub fn normalize(level: LogLevel, message: impl Into<String>, metadata: Metadata) -> LogEvent {
    normalize_at(Local::now(), level, message, metadata)
}

pub fn normalize_at(
    timestamp: DateTime<Local>,
    level: LogLevel,
    message: impl Into<String>,
    mut metadata: Metadata,
) -> LogEvent {
    let mut message = message.into();

    let correlation_id = take_correlation_id(&mut metadata);

    let request = metadata
        .remove(REQUEST_KEY)
        .and_then(|value| request_context(&value));

    let error_info = match metadata.get(ERROR_KEY) {
        Some(value) if value.is_error_like() => metadata
            .remove(ERROR_KEY)
            .and_then(|value| error_info(&value)),
        _ => None,
    };
    if let Some(info) = &error_info {
        message = format!("{message}: {}", info.message());
    }

    let (category, severity) = match error_info.as_ref().map(classify) {
        Some((category, severity)) => (Some(category), Some(severity)),
        None => (None, None),
    };

    LogEvent {
        timestamp,
        level,
        message,
        correlation_id,
        request,
        error_info,
        category,
        severity,
        extra: shield_reserved(metadata),
    }
}

fn take_correlation_id(metadata: &mut Metadata) -> Option<String> {
    let id = match metadata.get(CORRELATION_ID_KEY)? {
        MetaValue::Json(Value::String(id)) => id.clone(),
        MetaValue::Json(Value::Number(n)) => n.to_string(),
        _ => return None,
    };
    metadata.remove(CORRELATION_ID_KEY);
    Some(id)
}

/// A request context is only taken when all four fields are strings.
pub fn request_context(value: &MetaValue) -> Option<RequestContext> {
    let field = |name: &str| -> Option<String> {
        let found = match value {
            MetaValue::Json(Value::Object(map)) => map.get(name)?.as_str(),
            MetaValue::Map(meta) => meta.get(name)?.as_str(),
            _ => None,
        };
        found.map(str::to_string)
    };
    Some(RequestContext {
        method: field("method")?,
        url: field("url")?,
        ip: field("ip")?,
        user_agent: field("userAgent")?,
    })
}

fn error_info(value: &MetaValue) -> Option<ErrorInfo> {
    match value {
        MetaValue::AppError(err) => Some(ErrorInfo::from(err.as_ref())),
        MetaValue::Failure(failure) => Some(ErrorInfo::from(failure)),
        MetaValue::Json(Value::Object(map)) => {
            let message = map.get("message")?.as_str()?;
            let name = map.get("name").and_then(Value::as_str).unwrap_or("Error");
            let mut failure = Failure::new(name, message);
            if let Some(stack) = map.get("stack").and_then(Value::as_str) {
                failure = failure.with_stack(stack);
            }
            Some(ErrorInfo::from(&failure))
        }
        _ => None,
    }
}

/// Renames keys that shadow record fields to `meta_<key>`, adding further
/// `meta_` prefixes until the name is free.
fn shield_reserved(metadata: Metadata) -> Metadata {
    let taken: HashSet<String> = metadata.keys().map(str::to_string).collect();
    let mut shielded = Metadata::new();
    for (key, value) in metadata {
        if !RESERVED_KEYS.contains(&key.as_str()) {
            shielded.insert(key, value);
            continue;
        }
        let mut renamed = format!("meta_{key}");
        while taken.contains(&renamed) || shielded.contains_key(&renamed) {
            renamed = format!("meta_{renamed}");
        }
        shielded.insert(renamed, value);
    }
    shielded
}
