/// Procedure compilation and execution
///
/// A procedure binds an input and output into its template, writes the
/// resulting script to the cache, runs it through the engine, and imports
/// the decoded stdout into the output.
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::debug;

use super::document::{Input, Output};
use crate::cache::{random_id, Cache};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::template::Renderer;

/// Stages of a single `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Compiling,
    Writing,
    Executing,
    Parsing,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Compiling => "compiling",
            RunState::Writing => "writing",
            RunState::Executing => "executing",
            RunState::Parsing => "parsing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Builds procedures sharing one set of collaborators
#[derive(Clone)]
pub struct ProcedureFactory {
    engine: Arc<Engine>,
    parser: Arc<dyn Parser>,
    cache: Arc<dyn Cache>,
    renderer: Arc<dyn Renderer>,
}

impl ProcedureFactory {
    pub fn new(
        engine: Arc<Engine>,
        parser: Arc<dyn Parser>,
        cache: Arc<dyn Cache>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            engine,
            parser,
            cache,
            renderer,
        }
    }

    pub fn create<S: Into<String>>(&self, template: S) -> Procedure {
        Procedure {
            template: template.into(),
            engine: Arc::clone(&self.engine),
            parser: Arc::clone(&self.parser),
            cache: Arc::clone(&self.cache),
            renderer: Arc::clone(&self.renderer),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }
}

/// One script template plus the means to run it
///
/// Cloning is cheap; collaborators are shared. A procedure is not meant to
/// be shared between concurrent runs since compiling replaces its template.
#[derive(Clone)]
pub struct Procedure {
    template: String,
    engine: Arc<Engine>,
    parser: Arc<dyn Parser>,
    cache: Arc<dyn Cache>,
    renderer: Arc<dyn Renderer>,
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("template_len", &self.template.len())
            .finish_non_exhaustive()
    }
}

impl Procedure {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn set_template<S: Into<String>>(&mut self, template: S) {
        self.template = template.into();
    }

    /// Copy of this procedure holding a different template
    pub fn with_template<S: Into<String>>(&self, template: S) -> Self {
        Self {
            template: template.into(),
            ..self.clone()
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Bind input and output into the template
    pub fn compile(&self, input: &dyn Input, output: &dyn Output) -> Result<String> {
        let context = json!({
            "input": input.context(),
            "output": output.context(),
        });
        self.renderer.render(&self.template, &context, None)
    }

    /// Compile, execute and decode one request/response cycle
    ///
    /// `NotWritable` is returned as is; every other failure becomes
    /// `ProcedureFailed`. The temporary script is removed in all cases.
    pub fn run(&self, input: &dyn Input, output: &mut dyn Output) -> Result<()> {
        let start = Instant::now();
        let mut state = RunState::Idle;

        let result = self.run_stages(input, output, &mut state);

        match &result {
            Ok(()) => debug!(
                operation = "procedure.run",
                status = "success",
                kind = input.kind(),
                duration_ms = start.elapsed().as_millis() as u64,
                "procedure finished"
            ),
            Err(e) => debug!(
                operation = "procedure.run",
                status = "error",
                kind = input.kind(),
                failed_in = %state,
                error = %e,
                "procedure failed"
            ),
        }

        result.map_err(|e| match e {
            Error::NotWritable { .. } | Error::ProcedureFailed(_) => e,
            other => Error::ProcedureFailed(other.to_string()),
        })
    }

    fn run_stages(
        &self,
        input: &dyn Input,
        output: &mut dyn Output,
        state: &mut RunState,
    ) -> Result<()> {
        transition(state, RunState::Compiling);
        let script = self.compile(input, &*output)?;

        transition(state, RunState::Writing);
        let id = random_id();
        let path = self.cache.save(&id, &script)?;
        let _cleanup = TempScript {
            cache: self.cache.as_ref(),
            id: &id,
        };

        transition(state, RunState::Executing);
        let (stdout, stderr) = self.execute(&path)?;

        transition(state, RunState::Parsing);
        output.import(self.parser.parse(&stdout));
        self.engine.log(String::from_utf8_lossy(&stderr).into_owned());

        transition(state, RunState::Done);
        Ok(())
    }

    fn execute(&self, script: &Path) -> Result<(Vec<u8>, Vec<u8>)> {
        let (program, args) = self.engine.invocation()?;

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = ?cmd, "spawning engine");

        let child = cmd.spawn().map_err(|e| {
            Error::ProcedureFailed(format!("failed to spawn {}: {}", program.display(), e))
        })?;

        // Drains stdout and stderr concurrently, then reaps the process
        let out = child
            .wait_with_output()
            .map_err(|e| Error::ProcedureFailed(format!("failed to read engine output: {}", e)))?;

        debug!(
            exit_code = out.status.code().unwrap_or(-1),
            stdout_bytes = out.stdout.len(),
            stderr_bytes = out.stderr.len(),
            "engine exited"
        );

        Ok((out.stdout, out.stderr))
    }
}

fn transition(state: &mut RunState, next: RunState) {
    tracing::trace!(from = %state, to = %next, "procedure state");
    *state = next;
}

/// Removes the written script when the run ends, however it ends
struct TempScript<'a> {
    cache: &'a dyn Cache,
    id: &'a str,
}

impl Drop for TempScript<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cache.delete(self.id) {
            debug!(id = self.id, error = %e, "failed to remove temporary script");
        }
    }
}
