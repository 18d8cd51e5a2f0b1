/// Decoding of the external runtime's stdout
///
/// The runtime may crash halfway through a write, so decoding never fails:
/// anything that is not a JSON object or array comes back as an empty object.
/// Callers treat an empty object as "no usable result".
use serde_json::{Deserializer, Map, Value};

pub trait Parser: Send + Sync {
    fn parse(&self, data: &[u8]) -> Value;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for JsonParser {
    fn parse(&self, data: &[u8]) -> Value {
        let Ok(text) = std::str::from_utf8(data) else {
            return empty();
        };

        let text = text.trim_start();
        if !text.starts_with('{') && !text.starts_with('[') {
            return empty();
        }

        // Only the first value counts, diagnostics may follow it
        match Deserializer::from_str(text).into_iter::<Value>().next() {
            Some(Ok(value @ (Value::Object(_) | Value::Array(_)))) => value,
            _ => empty(),
        }
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}
