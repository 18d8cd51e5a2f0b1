pub mod chain;
pub mod compiler;
pub mod document;
pub mod loader;
pub mod runner;
pub mod validator;

pub use chain::ChainLoader;
pub use compiler::{cache_key, ProcedureCompiler, CACHE_PREFIX};
pub use document::{Document, Input, Output};
pub use loader::{
    EmbeddedLoader, FileLoader, ProcedureLoader, PARTIAL_EXTENSION, PROCEDURE_EXTENSION,
};
pub use runner::{Procedure, ProcedureFactory, RunState};
pub use validator::{
    ProcedureValidator, BUILTIN_SYNTAX_CHECKER, DEFAULT_TERMINATION_PATTERN, VALIDATOR_PROCEDURE,
};
