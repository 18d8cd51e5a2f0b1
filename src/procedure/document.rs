use serde_json::{Map, Value};
use tracing::debug;

/// Data bound into a procedure's template as `input`
pub trait Input {
    /// Type discriminator used for partial selection and cache partitioning
    fn kind(&self) -> &str;

    fn context(&self) -> Value;
}

/// Sink for a procedure's decoded result, bound into templates as `output`
pub trait Output {
    fn kind(&self) -> &str;

    fn context(&self) -> Value;

    /// Populate from the decoded stdout of the runtime
    fn import(&mut self, data: Value);
}

/// Free-form key/value record usable as either input or output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    kind: String,
    values: Map<String, Value>,
}

impl Document {
    pub fn new<S: Into<String>>(kind: S) -> Self {
        Self {
            kind: kind.into(),
            values: Map::new(),
        }
    }

    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Input for Document {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn context(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl Output for Document {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn context(&self) -> Value {
        Value::Object(self.values.clone())
    }

    fn import(&mut self, data: Value) {
        match data {
            Value::Object(map) => self.values.extend(map),
            // Top-level arrays have no keys of their own
            Value::Array(items) if !items.is_empty() => {
                self.values.insert("data".to_string(), Value::Array(items));
            }
            other => debug!(kind = %self.kind, value = %other, "ignoring non-object result"),
        }
    }
}
