use crate::domain::{Category, ErrorInfo, Severity};

/// Derives presentation metadata from an event's failure.
///
/// Severity follows the magnitude of the HTTP-style status, not the level
/// the call was logged at.
pub fn classify(info: &ErrorInfo) -> (Category, Severity) {
    let category = match info {
        ErrorInfo::Application { kind, .. } => kind.profile().category,
        ErrorInfo::Generic { .. } => Category::System,
    };
    (category, severity_for(info.status()))
}

pub fn severity_for(status: Option<u16>) -> Severity {
    match status {
        Some(status) if status >= 500 => Severity::Critical,
        Some(status) if status >= 400 => Severity::Error,
        // Only reachable through an explicit status override.
        Some(_) => Severity::Warning,
        None => Severity::Error,
    }
}
