//! Expands error values found anywhere in a metadata tree.

use crate::domain::{ApplicationError, ErrorOrigin, Failure, MetaValue, Metadata};
use serde_json::{Map, Value};

/// Nesting below this depth is replaced by [`TRUNCATED`].
pub const MAX_DEPTH: usize = 8;
pub const TRUNCATED: &str = "[Truncated]";

pub fn expand(value: &MetaValue) -> Value {
    expand_at(value, 0)
}

pub fn expand_metadata(metadata: &Metadata) -> Map<String, Value> {
    metadata
        .iter()
        .map(|(key, value)| (key.to_string(), expand_at(value, 0)))
        .collect()
}

fn expand_at(value: &MetaValue, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(TRUNCATED.to_string());
    }
    match value {
        MetaValue::Json(json) => json.clone(),
        MetaValue::AppError(err) => application_error(err),
        MetaValue::Failure(failure) => generic_failure(failure),
        MetaValue::Map(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.to_string(), expand_at(value, depth + 1)))
                .collect(),
        ),
        MetaValue::List(items) => {
            Value::Array(items.iter().map(|item| expand_at(item, depth + 1)).collect())
        }
    }
}

pub fn application_error(err: &ApplicationError) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), ErrorOrigin::ApplicationError.as_str().into());
    map.insert("name".into(), err.name().into());
    map.insert("message".into(), err.message().into());
    map.insert("code".into(), err.code().into());
    map.insert("status".into(), err.status().into());
    if let Some(text) = err.status_text() {
        map.insert("statusText".into(), text.into());
    }
    if let Some(details) = err.details() {
        map.insert("details".into(), details.clone());
    }
    map.insert("timestamp".into(), err.timestamp().into());
    map.insert("stack".into(), err.stack().into());
    Value::Object(map)
}

pub fn generic_failure(failure: &Failure) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), ErrorOrigin::GenericFailure.as_str().into());
    map.insert("name".into(), failure.name().into());
    map.insert("message".into(), failure.message().into());
    if let Some(stack) = failure.stack() {
        map.insert("stack".into(), stack.into());
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_passes_through() {
        let meta = Metadata::new().with("port", 3000).with("tags", json!(["a", "b"]));
        let map = expand_metadata(&meta);
        assert_eq!(Value::Object(map), json!({"port": 3000, "tags": ["a", "b"]}));
    }

    #[test]
    fn test_direct_error_value_is_expanded() {
        let err = ApplicationError::validation("bad email").with_details(json!({"field": "email"}));
        let map = expand_metadata(&Metadata::new().with("cause", err));
        let cause = &map["cause"];
        assert_eq!(cause["type"], "AppError");
        assert_eq!(cause["name"], "ValidationError");
        assert_eq!(cause["code"], "VALIDATION_ERROR");
        assert_eq!(cause["status"], 400);
        assert_eq!(cause["statusText"], "BAD_REQUEST");
        assert_eq!(cause["details"]["field"], "email");
    }

    #[test]
    fn test_nested_errors_are_expanded() {
        let attempts = vec![MetaValue::from(Failure::new("IoError", "reset"))];
        let inner = Metadata::new().with("attempts", attempts);
        let value = expand(&MetaValue::from(Metadata::new().with("retry", inner)));
        let attempt = &value["retry"]["attempts"][0];
        assert_eq!(attempt["type"], "Error");
        assert_eq!(attempt["name"], "IoError");
        assert_eq!(attempt["stack"], "IoError: reset");
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut value = MetaValue::from("leaf");
        for _ in 0..(MAX_DEPTH + 3) {
            value = MetaValue::from(Metadata::new().with("next", value));
        }
        let mut cursor = &expand(&value);
        let mut levels = 0;
        while let Some(next) = cursor.get("next") {
            cursor = next;
            levels += 1;
        }
        assert_eq!(cursor, &Value::String(TRUNCATED.to_string()));
        assert_eq!(levels, MAX_DEPTH + 1);
    }
}
