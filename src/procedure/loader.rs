/// Procedure and partial template loading
///
/// Templates are addressed by id and extension: `http_default` with the
/// `proc` extension resolves to `http_default.proc`. Loaders report a miss
/// as `Ok(None)` so that chains can fall through without inspecting errors.
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::runner::{Procedure, ProcedureFactory};
use crate::error::{Error, Result};

pub const PROCEDURE_EXTENSION: &str = "proc";
pub const PARTIAL_EXTENSION: &str = "partial";

pub trait ProcedureLoader: Send + Sync {
    /// Look up a template, `Ok(None)` when this loader does not have it
    fn find_template(&self, id: &str, extension: &str) -> Result<Option<String>>;

    /// Look up a procedure, `Ok(None)` when this loader does not have it
    fn find_procedure(&self, id: &str) -> Result<Option<Procedure>>;

    fn load_template(&self, id: &str, extension: &str) -> Result<String> {
        self.find_template(id, extension)?
            .ok_or_else(|| Error::NotExists(format!("{}.{}", id, extension)))
    }

    fn load(&self, id: &str) -> Result<Procedure> {
        self.find_procedure(id)?
            .ok_or_else(|| Error::NotExists(format!("{}.{}", id, PROCEDURE_EXTENSION)))
    }
}

/// Loads templates from a directory
pub struct FileLoader {
    root: PathBuf,
    factory: ProcedureFactory,
}

impl FileLoader {
    pub fn new<P: Into<PathBuf>>(root: P, factory: ProcedureFactory) -> Self {
        Self {
            root: root.into(),
            factory,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str, extension: &str) -> Result<PathBuf> {
        if id.contains("://") {
            return Err(Error::NotExists(format!(
                "{}: only local templates can be loaded",
                id
            )));
        }

        let relative = PathBuf::from(format!("{}.{}", id, extension));
        let escapes_root = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes_root {
            return Err(Error::NotExists(format!(
                "{}: outside of {}",
                id,
                self.root.display()
            )));
        }

        Ok(self.root.join(relative))
    }
}

impl ProcedureLoader for FileLoader {
    fn find_template(&self, id: &str, extension: &str) -> Result<Option<String>> {
        let path = self.resolve(id, extension)?;

        if !path.is_file() {
            return Ok(None);
        }

        let template = fs::read_to_string(&path)?;
        debug!(
            operation = "loader.load",
            path = %path.display(),
            size_bytes = template.len(),
            "template loaded"
        );
        Ok(Some(template))
    }

    fn find_procedure(&self, id: &str) -> Result<Option<Procedure>> {
        Ok(self
            .find_template(id, PROCEDURE_EXTENSION)?
            .map(|template| self.factory.create(template)))
    }
}

/// Templates shipped inside the binary
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "http_default.proc",
        include_str!("../../procedures/http_default.proc"),
    ),
    (
        "validator.proc",
        include_str!("../../procedures/validator.proc"),
    ),
    (
        "global_variables.partial",
        include_str!("../../procedures/global_variables.partial"),
    ),
    (
        "page_settings.partial",
        include_str!("../../procedures/page_settings.partial"),
    ),
    (
        "page_events.partial",
        include_str!("../../procedures/page_events.partial"),
    ),
    (
        "page_open.partial",
        include_str!("../../procedures/page_open.partial"),
    ),
    (
        "procedure_default.partial",
        include_str!("../../procedures/procedure_default.partial"),
    ),
    (
        "procedure_capture.partial",
        include_str!("../../procedures/procedure_capture.partial"),
    ),
    (
        "procedure_pdf.partial",
        include_str!("../../procedures/procedure_pdf.partial"),
    ),
];

/// Loads templates held in memory
pub struct EmbeddedLoader {
    templates: HashMap<String, String>,
    factory: ProcedureFactory,
}

impl EmbeddedLoader {
    /// An empty loader
    pub fn new(factory: ProcedureFactory) -> Self {
        Self {
            templates: HashMap::new(),
            factory,
        }
    }

    /// The procedures and partials that ship with spectre
    pub fn builtin(factory: ProcedureFactory) -> Self {
        let mut loader = Self::new(factory);
        for (name, template) in BUILTIN_TEMPLATES {
            loader
                .templates
                .insert((*name).to_string(), (*template).to_string());
        }
        loader
    }

    pub fn with_template<S: Into<String>>(
        mut self,
        id: &str,
        extension: &str,
        template: S,
    ) -> Self {
        self.insert(id, extension, template);
        self
    }

    pub fn insert<S: Into<String>>(&mut self, id: &str, extension: &str, template: S) {
        self.templates
            .insert(format!("{}.{}", id, extension), template.into());
    }
}

impl ProcedureLoader for EmbeddedLoader {
    fn find_template(&self, id: &str, extension: &str) -> Result<Option<String>> {
        Ok(self.templates.get(&format!("{}.{}", id, extension)).cloned())
    }

    fn find_procedure(&self, id: &str) -> Result<Option<Procedure>> {
        Ok(self
            .find_template(id, PROCEDURE_EXTENSION)?
            .map(|template| self.factory.create(template)))
    }
}
