use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::FileCache;
use crate::config::SpectreConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::parser::JsonParser;
use crate::procedure::{
    ChainLoader, EmbeddedLoader, FileLoader, Input, Output, Procedure, ProcedureCompiler,
    ProcedureFactory, ProcedureLoader, ProcedureValidator,
};
use crate::template::HandlebarsRenderer;

/// Procedure used for plain page requests
pub const HTTP_PROCEDURE: &str = "http_default";

/// Entry point wiring the engine, cache, loaders and compiler together
pub struct Client {
    engine: Arc<Engine>,
    cache: Arc<FileCache>,
    loader: Arc<ChainLoader>,
    compiler: ProcedureCompiler,
}

impl Client {
    /// Build a client from configuration
    ///
    /// Creates the cache directory. The engine executable is checked when
    /// a procedure first runs.
    pub fn new(config: &SpectreConfig) -> Result<Self> {
        let cache_dir = config.cache.resolved_dir();
        fs::create_dir_all(&cache_dir).map_err(|source| Error::NotWritable {
            path: cache_dir.clone(),
            source,
        })?;
        let cache = Arc::new(FileCache::new(cache_dir, config.cache.extension.as_str()));

        let mut engine = Engine::lazy(&config.engine.path);
        engine
            .set_options(config.engine.options.iter().cloned())
            .debug(config.engine.debug)
            .cache(config.engine.disk_cache);
        let engine = Arc::new(engine);

        let factory = ProcedureFactory::new(
            Arc::clone(&engine),
            Arc::new(JsonParser::new()),
            cache.clone(),
            Arc::new(HandlebarsRenderer::new()),
        );

        let mut loaders: Vec<Arc<dyn ProcedureLoader>> = config
            .procedures
            .dirs
            .iter()
            .map(|dir| {
                Arc::new(FileLoader::new(PathBuf::from(dir), factory.clone()))
                    as Arc<dyn ProcedureLoader>
            })
            .collect();
        loaders.push(Arc::new(EmbeddedLoader::builtin(factory)));
        let loader = Arc::new(ChainLoader::new(loaders));

        let mut validator = ProcedureValidator::new(loader.clone())
            .with_termination_pattern(&config.validator.termination_pattern)?;
        if let Some(path) = &config.validator.checker {
            let source =
                fs::read_to_string(path).map_err(|_| Error::NotExists(path.to_string()))?;
            validator = validator.with_checker(source);
        }

        let mut compiler = ProcedureCompiler::new(
            loader.clone(),
            validator,
            cache.clone(),
            Arc::new(HandlebarsRenderer::new()),
        );
        if !config.compiler.cache {
            compiler.disable_cache();
        }

        debug!(
            engine = %engine.path().display(),
            cache_dir = %cache.dir().display(),
            procedure_dirs = config.procedures.dirs.len(),
            "client ready"
        );

        Ok(Self {
            engine,
            cache,
            loader,
            compiler,
        })
    }

    /// Load the page, run the procedure matching the request kind and
    /// collect what it reports
    pub fn send(&self, request: &Request) -> Result<Response> {
        request.validate()?;

        let mut response = Response::new();
        let procedure = self.compiled(HTTP_PROCEDURE, request, &response)?;
        procedure.run(request, &mut response)?;

        info!(
            operation = "client.send",
            method = %request.method(),
            status = response.status().unwrap_or_default(),
            "request completed"
        );
        Ok(response)
    }

    /// A procedure as loaded, before compilation
    pub fn procedure(&self, id: &str) -> Result<Procedure> {
        self.loader.load(id)
    }

    /// A procedure compiled for the given input and output
    pub fn compiled(&self, id: &str, input: &dyn Input, output: &dyn Output) -> Result<Procedure> {
        let mut procedure = self.procedure(id)?;
        self.compiler.compile(&mut procedure, input, output)?;
        Ok(procedure)
    }

    /// Remove every compiled skeleton from the cache
    pub fn clear_cache(&self) -> Result<()> {
        self.compiler.clear_cache()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    pub fn loader(&self) -> &Arc<ChainLoader> {
        &self.loader
    }

    pub fn compiler(&self) -> &ProcedureCompiler {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut ProcedureCompiler {
        &mut self.compiler
    }
}
