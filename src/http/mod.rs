//! Request and response types exchanged with page procedures
pub mod request;
pub mod response;

pub use request::{ClipRect, Method, PaperSize, Request, RequestKind, Viewport, DEFAULT_TIMEOUT_MS};
pub use response::{ConsoleMessage, Response, TraceFrame};
