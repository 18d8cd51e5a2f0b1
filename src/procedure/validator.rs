/// Script validation before launch
///
/// A script with a syntax error or without a termination call can leave the
/// runtime blocked forever, so both are rejected before a script is cached.
/// Syntax is checked by the runtime itself: the `validator` procedure is run
/// with the candidate script and a syntax-checking engine bound into it, and
/// reports `{ "errors": [...] }` on stdout.
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::document::Document;
use super::loader::ProcedureLoader;
use crate::error::{Error, Result, SyntaxIssue};

pub const VALIDATOR_PROCEDURE: &str = "validator";
pub const DEFAULT_TERMINATION_PATTERN: &str = r"phantom\.exit\(";

/// Syntax checker bound into the validator procedure. Any replacement must
/// define `checkSyntax(source)` returning a list of `{ message, line, column }`.
pub const BUILTIN_SYNTAX_CHECKER: &str = include_str!("../../procedures/syntax_checker.js");

pub struct ProcedureValidator {
    loader: Arc<dyn ProcedureLoader>,
    checker: String,
    termination: Regex,
}

impl ProcedureValidator {
    pub fn new(loader: Arc<dyn ProcedureLoader>) -> Self {
        Self {
            loader,
            checker: BUILTIN_SYNTAX_CHECKER.to_string(),
            termination: Regex::new(DEFAULT_TERMINATION_PATTERN)
                .expect("default termination pattern is valid"),
        }
    }

    /// Replace the syntax-checking engine source
    pub fn with_checker<S: Into<String>>(mut self, source: S) -> Self {
        self.checker = source.into();
        self
    }

    /// Replace the pattern every script must match to be accepted
    pub fn with_termination_pattern(mut self, pattern: &str) -> Result<Self> {
        self.termination = Regex::new(pattern).map_err(|e| {
            Error::Requirement(format!("invalid termination pattern {}: {}", pattern, e))
        })?;
        Ok(self)
    }

    pub fn termination_pattern(&self) -> &str {
        self.termination.as_str()
    }

    /// Check syntax, then the termination requirement
    pub fn validate(&self, script: &str) -> Result<bool> {
        self.check_syntax(script)?;
        self.check_requirements(script)?;
        Ok(true)
    }

    fn check_syntax(&self, script: &str) -> Result<()> {
        let procedure = self.loader.load(VALIDATOR_PROCEDURE)?;

        let input = Document::new(VALIDATOR_PROCEDURE)
            .with("script", script)
            .with("checker", self.checker.as_str());
        let mut output = Document::new(VALIDATOR_PROCEDURE);

        procedure.run(&input, &mut output)?;

        let Some(reported) = output.get("errors") else {
            warn!(
                operation = "validator.syntax",
                "validator produced no result, skipping syntax check"
            );
            return Ok(());
        };

        let errors = decode_issues(reported);
        if errors.is_empty() {
            debug!(operation = "validator.syntax", status = "success", "syntax ok");
            return Ok(());
        }

        debug!(
            operation = "validator.syntax",
            status = "error",
            error_count = errors.len(),
            "syntax errors found"
        );
        Err(Error::Syntax { errors })
    }

    fn check_requirements(&self, script: &str) -> Result<()> {
        if self.termination.is_match(script) {
            return Ok(());
        }

        Err(Error::Requirement(format!(
            "script must contain a termination call matching `{}`",
            self.termination.as_str()
        )))
    }
}

fn decode_issues(value: &Value) -> Vec<SyntaxIssue> {
    let items = match value {
        Value::Null => return Vec::new(),
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(message) => SyntaxIssue {
                message: message.clone(),
                line: None,
                column: None,
            },
            other => serde_json::from_value(other.clone()).unwrap_or_else(|_| SyntaxIssue {
                message: other.to_string(),
                line: None,
                column: None,
            }),
        })
        .collect()
}
