use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::procedure::Output;

/// Stack frame reported with a console message or page error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceFrame {
    pub file: Option<String>,
    pub line: Option<u64>,
    pub function: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleMessage {
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

/// Page response filled from what a procedure reports
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(skip)]
    kind: String,
    status: Option<u16>,
    status_text: Option<String>,
    content: Option<String>,
    content_type: Option<String>,
    headers: BTreeMap<String, String>,
    url: Option<String>,
    #[serde(rename = "redirectURL")]
    redirect_url: Option<String>,
    time: Option<u64>,
    console: Vec<ConsoleMessage>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self::with_kind("default")
    }

    /// Response reporting under a custom output type
    pub fn with_kind<S: Into<String>>(kind: S) -> Self {
        Self {
            kind: kind.into(),
            status: None,
            status_text: None,
            content: None,
            content_type: None,
            headers: BTreeMap::new(),
            url: None,
            redirect_url: None,
            time: None,
            console: Vec::new(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// Seconds the page took to load
    pub fn time(&self) -> Option<u64> {
        self.time
    }

    pub fn console(&self) -> &[ConsoleMessage] {
        &self.console
    }

    /// 3xx status with somewhere to go
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, Some(300..=307))
            && self.redirect_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    fn import_field(&mut self, key: &str, value: Value) {
        match key {
            "status" => self.status = value.as_u64().and_then(|s| u16::try_from(s).ok()),
            "statusText" => self.status_text = text(value),
            "content" => self.content = text(value),
            "contentType" => self.content_type = text(value),
            "headers" => self.headers = decode_headers(value),
            "url" => self.url = text(value),
            "redirectURL" => self.redirect_url = text(value),
            "time" => {
                self.time = value
                    .as_u64()
                    .or_else(|| value.as_f64().map(|t| t.max(0.0).round() as u64))
            }
            "console" => self.console = decode_console(value),
            other => debug!(field = other, "ignoring unknown response field"),
        }
    }
}

impl Output for Response {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn context(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    fn import(&mut self, data: Value) {
        match data {
            Value::Object(fields) => {
                for (key, value) in fields {
                    self.import_field(&key, value);
                }
            }
            other => debug!(value = %other, "response data is not an object"),
        }
    }
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Headers arrive as `[{ name, value }]` from the runtime, or as a plain map
fn decode_headers(value: Value) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    match value {
        Value::Array(items) => {
            for item in items {
                let name = item.get("name").and_then(Value::as_str);
                let value = item.get("value").cloned().and_then(text);
                if let (Some(name), Some(value)) = (name, value) {
                    headers.insert(name.to_string(), value);
                }
            }
        }
        Value::Object(map) => {
            for (name, value) in map {
                if let Some(value) = text(value) {
                    headers.insert(name, value);
                }
            }
        }
        _ => {}
    }

    headers
}

fn decode_console(value: Value) -> Vec<ConsoleMessage> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(message) => Some(ConsoleMessage {
                message,
                trace: Vec::new(),
            }),
            other => serde_json::from_value(other).ok(),
        })
        .collect()
}
