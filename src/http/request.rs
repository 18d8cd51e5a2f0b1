use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::procedure::Input;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    /// Data travels in the query string rather than the body
    fn uses_query(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPTIONS" => Ok(Method::Options),
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            other => Err(Error::InvalidRequest(format!(
                "unsupported method: {}",
                other
            ))),
        }
    }
}

/// Request type, selects the `procedure_<kind>` partial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Default,
    Capture,
    Pdf,
    Custom(String),
}

impl RequestKind {
    pub fn as_str(&self) -> &str {
        match self {
            RequestKind::Default => "default",
            RequestKind::Capture => "capture",
            RequestKind::Pdf => "pdf",
            RequestKind::Custom(kind) => kind,
        }
    }
}

impl From<&str> for RequestKind {
    fn from(kind: &str) -> Self {
        match kind {
            "default" => RequestKind::Default,
            "capture" => RequestKind::Capture,
            "pdf" => RequestKind::Pdf,
            other => RequestKind::Custom(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Area of the page to capture, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClipRect {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

/// PDF paper settings
///
/// Either a named `format` ("A4", "Letter", ...) or explicit `width` and
/// `height` with units ("10cm", "8in").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperSize {
    pub format: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub orientation: String,
    pub margin: String,
}

impl Default for PaperSize {
    fn default() -> Self {
        Self {
            format: Some("A4".to_string()),
            width: None,
            height: None,
            orientation: "portrait".to_string(),
            margin: "1cm".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: String,
    headers: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
    timeout_ms: u64,
    delay_secs: u64,
    viewport: Option<Viewport>,
    kind: RequestKind,
    output_file: Option<PathBuf>,
    clip_rect: Option<ClipRect>,
    format: Option<String>,
    quality: Option<u8>,
    paper: Option<PaperSize>,
}

impl Request {
    pub fn new<S: Into<String>>(method: Method, url: S) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            data: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            delay_secs: 0,
            viewport: None,
            kind: RequestKind::Default,
            output_file: None,
            clip_rect: None,
            format: None,
            quality: None,
            paper: None,
        }
    }

    pub fn get<S: Into<String>>(url: S) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post<S: Into<String>>(url: S) -> Self {
        Self::new(Method::Post, url)
    }

    /// Render the page to an image file
    pub fn capture<S: Into<String>, P: Into<PathBuf>>(url: S, output_file: P) -> Self {
        let mut request = Self::get(url);
        request.kind = RequestKind::Capture;
        request.output_file = Some(output_file.into());
        request
    }

    /// Print the page to a PDF file
    pub fn pdf<S: Into<String>, P: Into<PathBuf>>(url: S, output_file: P) -> Self {
        let mut request = Self::get(url);
        request.kind = RequestKind::Pdf;
        request.output_file = Some(output_file.into());
        request.paper = Some(PaperSize::default());
        request
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_kind<K: Into<RequestKind>>(mut self, kind: K) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_data<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Resource timeout handed to the runtime
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Seconds to wait after the page loads before running the procedure
    pub fn with_delay(mut self, delay_secs: u64) -> Self {
        self.delay_secs = delay_secs;
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some(Viewport { width, height });
        self
    }

    pub fn with_clip_rect(mut self, rect: ClipRect) -> Self {
        self.clip_rect = Some(rect);
        self
    }

    /// Image format for captures ("png", "jpeg", ...)
    pub fn with_format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_paper(mut self, paper: PaperSize) -> Self {
        self.paper = Some(paper);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn delay_secs(&self) -> u64 {
        self.delay_secs
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn request_kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// Target URL, with data appended as a query string for GET and HEAD
    pub fn url(&self) -> Result<String> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::InvalidRequest(format!("invalid url {}: {}", self.url, e)))?;

        if self.method.uses_query() && !self.data.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.data);
        }

        Ok(url.into())
    }

    /// Form-encoded body, empty for GET and HEAD
    pub fn body(&self) -> String {
        if self.method.uses_query() {
            return String::new();
        }

        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.data)
            .finish()
    }

    /// Check the request is complete enough to be sent
    pub fn validate(&self) -> Result<()> {
        self.url()?;

        let needs_file = matches!(self.kind, RequestKind::Capture | RequestKind::Pdf);
        if needs_file && self.output_file.is_none() {
            return Err(Error::InvalidRequest(format!(
                "{} requests need an output file",
                self.kind.as_str()
            )));
        }

        Ok(())
    }
}

impl Input for Request {
    fn kind(&self) -> &str {
        self.kind.as_str()
    }

    fn context(&self) -> Value {
        let url = self.url().unwrap_or_else(|e| {
            debug!(error = %e, "binding url as given");
            self.url.clone()
        });

        json!({
            "method": self.method,
            "url": url,
            "headers": self.headers,
            "body": self.body(),
            "timeout": self.timeout_ms,
            "delay": self.delay_secs,
            "viewport": self.viewport,
            "output_file": self.output_file.as_ref().map(|p| p.display().to_string()),
            "clip_rect": self.clip_rect,
            "format": self.format,
            "quality": self.quality,
            "paper": self.paper,
        })
    }
}
