use super::app_error::{ApplicationError, Failure};
use super::event::RequestContext;
use serde_json::Value;

/// A value attached to a log call.
///
/// Plain data travels as JSON; errors keep their type so renderers can
/// expand them wherever they sit in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Json(Value),
    AppError(Box<ApplicationError>),
    Failure(Failure),
    Map(Metadata),
    List(Vec<MetaValue>),
}

impl MetaValue {
    pub fn is_error_like(&self) -> bool {
        match self {
            MetaValue::AppError(_) | MetaValue::Failure(_) => true,
            MetaValue::Json(Value::Object(map)) => {
                map.get("message").is_some_and(Value::is_string)
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for MetaValue {
    fn from(value: Value) -> Self {
        MetaValue::Json(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Json(Value::String(value.to_string()))
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Json(Value::String(value))
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Json(Value::Bool(value))
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        MetaValue::Json(Value::from(value))
    }
}

impl From<u32> for MetaValue {
    fn from(value: u32) -> Self {
        MetaValue::Json(Value::from(value))
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Json(Value::from(value))
    }
}

impl From<u64> for MetaValue {
    fn from(value: u64) -> Self {
        MetaValue::Json(Value::from(value))
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Json(Value::from(value))
    }
}

impl From<ApplicationError> for MetaValue {
    fn from(err: ApplicationError) -> Self {
        MetaValue::AppError(Box::new(err))
    }
}

impl From<Failure> for MetaValue {
    fn from(failure: Failure) -> Self {
        MetaValue::Failure(failure)
    }
}

impl From<Metadata> for MetaValue {
    fn from(map: Metadata) -> Self {
        MetaValue::Map(map)
    }
}

impl From<RequestContext> for MetaValue {
    fn from(request: RequestContext) -> Self {
        MetaValue::Json(serde_json::json!({
            "method": request.method,
            "url": request.url,
            "ip": request.ip,
            "userAgent": request.user_agent,
        }))
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(items: Vec<T>) -> Self {
        MetaValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Ordered key/value metadata for a log call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn correlation_id(self, id: impl Into<String>) -> Self {
        self.with("correlationId", id.into())
    }

    pub fn request(self, request: RequestContext) -> Self {
        self.with("request", request)
    }

    pub fn error(self, err: impl Into<MetaValue>) -> Self {
        self.with("error", err)
    }

    /// Replaces an existing key in place, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

impl IntoIterator for Metadata {
    type Item = (String, MetaValue);
    type IntoIter = std::vec::IntoIter<(String, MetaValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Wraps a JSON object so it can be logged as metadata; other JSON values
/// land under a `value` key.
impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => Metadata::new(),
            other => Metadata::new().with("value", other),
        }
    }
}
