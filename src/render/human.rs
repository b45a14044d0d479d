use super::Render;
use super::replacer::expand_metadata;
use crate::domain::{ErrorInfo, LogEvent, LogLevel, RequestContext};
use crate::error::LoggerError;
use owo_colors::{AnsiColors, OwoColorize};
use serde_json::Value;
use std::fmt::Write as _;

pub const CONSOLE_TIMESTAMP_FORMAT: &str = "%H:%M:%S:%3f";

/// Multi-line console view for development.
#[derive(Debug, Clone, Copy)]
pub struct HumanRenderer {
    colorize: bool,
}

impl HumanRenderer {
    pub fn new(colorize: bool) -> Self {
        Self { colorize }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    fn paint(&self, text: &str, color: AnsiColors) -> String {
        if self.colorize {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn summary_tags(&self, info: &ErrorInfo, event: &LogEvent, out: &mut String) {
        let _ = write!(out, "[{}]", self.paint(info.origin().as_str(), AnsiColors::Red));
        if let Some(category) = event.category {
            let _ = write!(out, " [{category}]");
        }
        if let Some(severity) = event.severity {
            let _ = write!(out, " [{severity}]");
        }
        if let Some(code) = info.code() {
            let _ = write!(out, " [{}]", self.paint(code, code_color(code)));
        }
        if let Some(status) = info.status() {
            match info.status_text() {
                Some(text) => {
                    let _ = write!(out, " [{status} {text}]");
                }
                None => {
                    let _ = write!(out, " [{status}]");
                }
            }
        }
    }
}

impl Default for HumanRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Render for HumanRenderer {
    fn render(&self, event: &LogEvent) -> Result<String, LoggerError> {
        let color = level_color(event.level);
        let mut out = format!(
            "{} [{}]: ",
            event.timestamp.format(CONSOLE_TIMESTAMP_FORMAT),
            self.paint(event.level.as_str(), color)
        );
        if let Some(id) = &event.correlation_id {
            let _ = write!(out, "[{id}] ");
        }

        match &event.error_info {
            Some(info) => {
                self.summary_tags(info, event, &mut out);
                let _ = writeln!(out, " {}", self.paint(&event.message, color));
                if let Some(request) = &event.request {
                    out.push_str(&request_block(request));
                }
                if let Some(stack) = info.stack().and_then(stack_tail) {
                    let _ = writeln!(out, "\nStack Trace:\n{stack}");
                }
                if let Some(details) = info.details() {
                    let _ = writeln!(out, "\nDetails:\n{}", pretty(details)?);
                }
            }
            None => out.push_str(&self.paint(&event.message, color)),
        }

        if !event.extra.is_empty() {
            let meta = Value::Object(expand_metadata(&event.extra));
            let _ = write!(out, "\nMetadata:\n{}", pretty(&meta)?);
        }

        Ok(out.trim_end().to_string())
    }
}

fn request_block(request: &RequestContext) -> String {
    format!(
        "\nRequest Context:\n  Method: {}\n  URL: {}\n  IP: {}\n  User Agent: {}\n",
        request.method, request.url, request.ip, request.user_agent
    )
}

/// Drops the first line, which repeats the summary.
fn stack_tail(stack: &str) -> Option<String> {
    let tail: Vec<&str> = stack.lines().skip(1).collect();
    if tail.iter().all(|line| line.trim().is_empty()) {
        None
    } else {
        Some(tail.join("\n"))
    }
}

fn pretty(value: &Value) -> Result<String, LoggerError> {
    serde_json::to_string_pretty(value).map_err(|e| LoggerError::Render(e.to_string()))
}

fn level_color(level: LogLevel) -> AnsiColors {
    match level {
        LogLevel::Error => AnsiColors::Red,
        LogLevel::Warn => AnsiColors::Yellow,
        LogLevel::Info => AnsiColors::Green,
        LogLevel::Http => AnsiColors::Magenta,
        LogLevel::Debug => AnsiColors::White,
    }
}

fn code_color(code: &str) -> AnsiColors {
    match code {
        "VALIDATION_ERROR" | "CONFLICT_ERROR" => AnsiColors::Yellow,
        "NOT_FOUND_ERROR" => AnsiColors::Blue,
        _ => AnsiColors::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplicationError, Failure, Metadata};
    use crate::normalize::normalize_at;
    use chrono::{Local, TimeZone};
    use serde_json::json;

    fn render(level: LogLevel, message: &str, meta: Metadata) -> String {
        let at = Local.with_ymd_and_hms(2024, 3, 14, 9, 30, 0).unwrap();
        let event = normalize_at(at, level, message, meta);
        HumanRenderer::plain().render(&event).unwrap()
    }

    #[test]
    fn test_plain_info_line() {
        let out = render(LogLevel::Info, "Server started", Metadata::new());
        assert_eq!(out, "09:30:00:000 [info]: Server started");
    }

    #[test]
    fn test_correlation_id_prefix() {
        let out = render(LogLevel::Http, "GET /", Metadata::new().correlation_id("r-9"));
        assert_eq!(out, "09:30:00:000 [http]: [r-9] GET /");
    }

    #[test]
    fn test_application_error_summary_line() {
        let meta = Metadata::new().error(ApplicationError::database("connection reset"));
        let out = render(LogLevel::Error, "Payment failed", meta);
        let first = out.lines().next().unwrap();
        assert_eq!(
            first,
            "09:30:00:000 [error]: [AppError] [database] [critical] [DATABASE_ERROR] \
             [500 INTERNAL_SERVER_ERROR] Payment failed: connection reset"
        );
    }

    #[test]
    fn test_error_without_details_or_metadata_omits_sections() {
        let meta = Metadata::new().error(Failure::new("IoError", "disk full"));
        let out = render(LogLevel::Error, "Write failed", meta);
        assert!(!out.contains("Details:"));
        assert!(!out.contains("Metadata:"));
        assert!(!out.contains("Request Context:"));
        assert!(!out.contains("Stack Trace:"));
        assert_eq!(out, "09:30:00:000 [error]: [Error] [system] [error] Write failed: disk full");
    }

    #[test]
    fn test_sections_render_in_order() {
        let failure =
            Failure::new("IoError", "reset").with_stack("IoError: reset\n    at pool.rs:10");
        let meta = Metadata::new()
            .with(
                "request",
                json!({"method": "POST", "url": "/pay", "ip": "10.0.0.1", "userAgent": "k6"}),
            )
            .error(failure)
            .with("orderId", 42);
        let out = render(LogLevel::Error, "Payment failed", meta);
        let request = out.find("Request Context:").unwrap();
        let stack = out.find("Stack Trace:").unwrap();
        let metadata = out.find("Metadata:").unwrap();
        assert!(request < stack && stack < metadata);
        assert!(out.contains("  User Agent: k6"));
        assert!(out.contains("    at pool.rs:10"));
        assert!(!out.contains("Stack Trace:\nIoError: reset"));
        assert!(out.contains("\"orderId\": 42"));
    }

    #[test]
    fn test_details_block_is_pretty_printed() {
        let err = ApplicationError::validation("bad").with_details(json!({"field": "email"}));
        let out = render(LogLevel::Warn, "Rejected", Metadata::new().error(err));
        assert!(out.contains("Details:\n{\n  \"field\": \"email\"\n}"));
    }

    #[test]
    fn test_colorized_output_contains_ansi() {
        let at = Local.with_ymd_and_hms(2024, 3, 14, 9, 30, 0).unwrap();
        let event = normalize_at(at, LogLevel::Warn, "slow", Metadata::new());
        let out = HumanRenderer::new(true).render(&event).unwrap();
        assert!(out.contains("\u{1b}["));
        assert!(out.contains("slow"));
    }
}
