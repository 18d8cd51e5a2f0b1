use std::sync::Arc;

use tracing::debug;

use super::loader::{ProcedureLoader, PROCEDURE_EXTENSION};
use super::runner::Procedure;
use crate::error::{Error, Result};

/// Tries a list of loaders in order until one has the template
///
/// Loaders added later take priority over earlier ones. A loader that errors
/// is skipped like one that misses.
#[derive(Default)]
pub struct ChainLoader {
    loaders: Vec<Arc<dyn ProcedureLoader>>,
}

impl ChainLoader {
    pub fn new(loaders: Vec<Arc<dyn ProcedureLoader>>) -> Self {
        Self { loaders }
    }

    /// Add a loader in front of the existing ones
    pub fn add_loader(&mut self, loader: Arc<dyn ProcedureLoader>) {
        self.loaders.insert(0, loader);
    }

    pub fn loaders(&self) -> &[Arc<dyn ProcedureLoader>] {
        &self.loaders
    }

    fn first_hit<T>(
        &self,
        name: &str,
        mut attempt: impl FnMut(&dyn ProcedureLoader) -> Result<Option<T>>,
    ) -> Option<T> {
        for (index, loader) in self.loaders.iter().enumerate() {
            match attempt(loader.as_ref()) {
                Ok(Some(found)) => {
                    debug!(
                        operation = "chain.load",
                        template = name,
                        loader = index,
                        "template found"
                    );
                    return Some(found);
                }
                Ok(None) => continue,
                Err(e) => {
                    debug!(
                        operation = "chain.load",
                        template = name,
                        loader = index,
                        error = %e,
                        "loader failed, trying next"
                    );
                }
            }
        }
        None
    }
}

impl ProcedureLoader for ChainLoader {
    fn find_template(&self, id: &str, extension: &str) -> Result<Option<String>> {
        Ok(self.first_hit(id, |loader| loader.find_template(id, extension)))
    }

    fn find_procedure(&self, id: &str) -> Result<Option<Procedure>> {
        Ok(self.first_hit(id, |loader| loader.find_procedure(id)))
    }

    fn load_template(&self, id: &str, extension: &str) -> Result<String> {
        self.find_template(id, extension)?
            .ok_or_else(|| Error::NoLoaderFound(format!("{}.{}", id, extension)))
    }

    fn load(&self, id: &str) -> Result<Procedure> {
        self.find_procedure(id)?
            .ok_or_else(|| Error::NoLoaderFound(format!("{}.{}", id, PROCEDURE_EXTENSION)))
    }
}
