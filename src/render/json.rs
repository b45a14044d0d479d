use super::Render;
use super::replacer::expand_metadata;
use crate::domain::{Category, ErrorOrigin, LogEvent, LogLevel, RequestContext, Severity};
use crate::error::LoggerError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S:%3f";

/// One persisted line. Field order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestContext>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub origin: Option<ErrorOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogRecord {
    pub fn from_event(event: &LogEvent, service: &str) -> Self {
        let info = event.error_info.as_ref();
        Self {
            timestamp: event.timestamp.format(RECORD_TIMESTAMP_FORMAT).to_string(),
            level: event.level,
            message: event.message.clone(),
            service: service.to_string(),
            correlation_id: event.correlation_id.clone(),
            request: event.request.clone(),
            origin: info.map(|info| info.origin()),
            code: info.and_then(|info| info.code()).map(str::to_string),
            status: info.and_then(|info| info.status()),
            status_text: info.and_then(|info| info.status_text()).map(str::to_string),
            details: info.and_then(|info| info.details()).cloned(),
            stack: info.and_then(|info| info.stack()).map(str::to_string),
            error_category: event.category,
            severity: event.severity,
            extra: expand_metadata(&event.extra),
        }
    }

    pub fn parse(line: &str) -> Result<Self, LoggerError> {
        serde_json::from_str(line).map_err(|e| LoggerError::Render(e.to_string()))
    }

    pub fn to_line(&self) -> Result<String, LoggerError> {
        serde_json::to_string(self).map_err(|e| LoggerError::Render(e.to_string()))
    }
}

/// Line-delimited JSON for persisted destinations.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    service: String,
}

impl JsonRenderer {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Render for JsonRenderer {
    fn render(&self, event: &LogEvent) -> Result<String, LoggerError> {
        LogRecord::from_event(event, &self.service).to_line()
    }
}
