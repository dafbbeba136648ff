use serde_json::Value;

use super::image::ImageList;

/// A successfully parsed reply from the server.
///
/// The server acknowledges most operations with a `status` string, reports
/// rejected input through an `error` field, and lists images under `images`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack(Value);

impl Ack {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    pub fn error(&self) -> Option<&Value> {
        self.0.get("error").filter(|e| !e.is_null())
    }

    /// Human-readable form of the `error` field, which may be a string or an object
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn images(&self) -> Option<ImageList> {
        self.0.get("images").map(ImageList::from_value)
    }

    pub fn body(&self) -> &Value {
        &self.0
    }
}
