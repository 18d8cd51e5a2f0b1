//! Drive a headless browser runtime through generated scripts
//!
//! A [`Procedure`] is a script template. The [`ProcedureCompiler`] resolves
//! its partials into a cached skeleton, the procedure binds request data
//! into it, runs the runtime on the result and decodes what the script
//! prints. [`Client`] wires everything together for plain page requests.

pub mod cache;
pub mod client;
pub mod config;
pub mod config_discovery;
pub mod engine;
pub mod error;
pub mod http;
pub mod logging;
pub mod parser;
pub mod procedure;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{Cache, FileCache};
pub use client::Client;
pub use config::SpectreConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use http::{Request, Response};
pub use procedure::{Document, Input, Output, Procedure, ProcedureCompiler};
