/// Procedure compilation
///
/// Turns a procedure's raw template into a skeleton: partials pulled in with
/// `{{{load ...}}}` are resolved along with `procedure_type` and `output_type`,
/// every other mustache is left as written for the procedure to bind at run
/// time. Skeletons are validated against a bound
/// instance and cached by content hash, so an edited template never reuses a
/// stale skeleton.
use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::document::{Input, Output};
use super::loader::{ProcedureLoader, PARTIAL_EXTENSION};
use super::runner::Procedure;
use super::validator::ProcedureValidator;
use crate::cache::Cache;
use crate::error::Result;
use crate::template::{PartialSource, Renderer};

/// Prefix of every cache entry owned by the compiler
pub const CACHE_PREFIX: &str = "procedure_";

/// Cache key for the skeleton of `template` compiled for the given kinds
///
/// Format: "procedure_{hash}_{input}_{output}" where hash is the first 16
/// characters of the template's SHA256.
pub fn cache_key(template: &str, input_kind: &str, output_kind: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());
    let hash = hex::encode(hasher.finalize());

    format!(
        "{}{}_{}_{}",
        CACHE_PREFIX,
        &hash[..16],
        sanitize(input_kind),
        sanitize(output_kind)
    )
}

/// Kinds are caller-defined, keep them from turning into paths or patterns
fn sanitize(kind: &str) -> String {
    kind.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Names the skeleton pass resolves on its own, outside of `load` calls
const COMPILE_TIME_NAMES: &[&str] = &["procedure_type", "output_type"];

fn mustache_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\{?[^{}]*\}?\}\}").expect("mustache pattern is valid")
    })
}

fn slot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"@@spectre-slot-(\d+)@@").expect("slot pattern is valid")
    })
}

fn resolved_at_compile(tag: &str) -> bool {
    let inner = tag.trim_start_matches('{').trim_end_matches('}').trim();
    inner.starts_with("load ") || COMPILE_TIME_NAMES.contains(&inner)
}

/// Swap every mustache the skeleton pass must not touch for a numbered slot
fn shield_placeholders(template: &str) -> (String, Vec<String>) {
    let mut kept = Vec::new();
    let shielded = mustache_pattern().replace_all(template, |caps: &Captures| {
        let tag = &caps[0];
        if resolved_at_compile(tag) {
            return tag.to_string();
        }
        kept.push(tag.to_string());
        format!("@@spectre-slot-{}@@", kept.len() - 1)
    });
    (shielded.into_owned(), kept)
}

fn restore_placeholders(rendered: &str, kept: &[String]) -> String {
    if kept.is_empty() {
        return rendered.to_string();
    }

    slot_pattern()
        .replace_all(rendered, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| kept.get(index))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub struct ProcedureCompiler {
    loader: Arc<dyn ProcedureLoader>,
    validator: ProcedureValidator,
    cache: Arc<dyn Cache>,
    renderer: Arc<dyn Renderer>,
    cache_enabled: bool,
}

impl ProcedureCompiler {
    pub fn new(
        loader: Arc<dyn ProcedureLoader>,
        validator: ProcedureValidator,
        cache: Arc<dyn Cache>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            loader,
            validator,
            cache,
            renderer,
            cache_enabled: true,
        }
    }

    pub fn enable_cache(&mut self) {
        self.cache_enabled = true;
    }

    pub fn disable_cache(&mut self) {
        self.cache_enabled = false;
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn validator(&self) -> &ProcedureValidator {
        &self.validator
    }

    /// Remove every cached skeleton
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.delete(&format!("{}*", CACHE_PREFIX))?;
        info!(operation = "compiler.clear_cache", "compiled procedures cleared");
        Ok(())
    }

    /// Raw text of a named partial
    pub fn load(&self, name: &str) -> Result<String> {
        self.loader.load_template(name, PARTIAL_EXTENSION)
    }

    /// Replace the procedure's template with its validated skeleton
    ///
    /// On error the procedure is left untouched and nothing is cached.
    pub fn compile(
        &self,
        procedure: &mut Procedure,
        input: &dyn Input,
        output: &dyn Output,
    ) -> Result<()> {
        let key = cache_key(procedure.template(), input.kind(), output.kind());

        if self.cache_enabled && self.cache.exists(&key) {
            let skeleton = self.cache.fetch(&key)?;
            debug!(
                operation = "compiler.compile",
                status = "hit",
                cache_key = %key,
                "using cached skeleton"
            );
            procedure.set_template(skeleton);
            return Ok(());
        }

        let context = json!({
            "procedure_type": input.kind(),
            "output_type": output.kind(),
        });
        let (shielded, placeholders) = shield_placeholders(procedure.template());
        let rendered = self
            .renderer
            .render(&shielded, &context, Some(self as &dyn PartialSource))?;
        let skeleton = restore_placeholders(&rendered, &placeholders);

        // The bound instance is what the runtime would see for this input
        let staged = procedure.with_template(skeleton.as_str());
        let bound = staged.compile(input, output)?;
        self.validator.validate(&bound)?;

        if self.cache_enabled {
            self.cache.save(&key, &skeleton)?;
        }

        debug!(
            operation = "compiler.compile",
            status = "miss",
            cache_key = %key,
            cached = self.cache_enabled,
            "skeleton compiled"
        );

        procedure.set_template(skeleton);
        Ok(())
    }
}

impl PartialSource for ProcedureCompiler {
    fn load(&self, name: &str) -> Result<String> {
        ProcedureCompiler::load(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::error::Error;
    use crate::http::{PaperSize, Request, Response};
    use crate::procedure::{Document, EmbeddedLoader, VALIDATOR_PROCEDURE};
    use crate::template::HandlebarsRenderer;
    use crate::testing::{test_factory, SHELL_TERMINATION, SHELL_VALIDATOR};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingRenderer {
        renders: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render(
            &self,
            template: &str,
            context: &Value,
            partials: Option<&dyn PartialSource>,
        ) -> Result<String> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            HandlebarsRenderer.render(template, context, partials)
        }
    }

    struct Fixture {
        _temp: TempDir,
        cache: Arc<FileCache>,
        renderer: Arc<CountingRenderer>,
        loader: Arc<EmbeddedLoader>,
        compiler: ProcedureCompiler,
    }

    impl Fixture {
        fn renders(&self) -> usize {
            self.renderer.renders.load(Ordering::SeqCst)
        }

        fn procedure(&self, template: &str) -> Procedure {
            self.loader.load("main").unwrap().with_template(template)
        }
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let factory = test_factory(temp.path());
        let cache = Arc::new(FileCache::new(temp.path().join("cache"), "js"));
        let renderer = Arc::new(CountingRenderer::default());

        let loader = Arc::new(
            EmbeddedLoader::new(factory)
                .with_template(VALIDATOR_PROCEDURE, "proc", SHELL_VALIDATOR)
                .with_template("main", "proc", "{{{load \"body\"}}}")
                .with_template(
                    "body",
                    "partial",
                    "echo '{\"content\":\"{{input.x}}\"}'\nexit 0\n",
                )
                .with_template("no_exit", "partial", "echo '{}'\n")
                .with_template("broken", "partial", "if true; then\nexit 0\n")
                .with_template(
                    "procedure_capture",
                    "partial",
                    "echo '{\"content\":\"captured\"}'\nexit 0\n",
                ),
        );

        let validator = ProcedureValidator::new(loader.clone())
            .with_termination_pattern(SHELL_TERMINATION)
            .unwrap();
        let compiler =
            ProcedureCompiler::new(loader.clone(), validator, cache.clone(), renderer.clone());

        Fixture {
            _temp: temp,
            cache,
            renderer,
            loader,
            compiler,
        }
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = cache_key("template", "default", "default");
        let b = cache_key("template", "default", "default");
        assert_eq!(a, b);
        assert!(a.starts_with(CACHE_PREFIX));
        assert!(a.ends_with("_default_default"));

        assert_ne!(a, cache_key("template ", "default", "default"));
        assert_ne!(a, cache_key("template", "capture", "default"));
        assert_ne!(a, cache_key("template", "default", "custom"));
    }

    #[test]
    fn test_cache_key_sanitizes_kinds() {
        let key = cache_key("t", "../x*", "default");
        assert!(!key.contains('/'));
        assert!(!key.contains('*'));
        assert!(!key.contains('.'));
    }

    #[test]
    fn test_compile_resolves_partials() {
        let fx = fixture();
        let mut procedure = fx.procedure("{{{load \"body\"}}}");
        let input = Document::new("default").with("x", "42");

        fx.compiler
            .compile(&mut procedure, &input, &Document::new("default"))
            .unwrap();

        assert_eq!(
            procedure.template(),
            "echo '{\"content\":\"{{input.x}}\"}'\nexit 0\n"
        );
    }

    #[test]
    fn test_second_compile_served_from_cache() {
        let fx = fixture();
        let input = Document::new("default").with("x", "42");
        let output = Document::new("default");

        let mut first = fx.procedure("{{{load \"body\"}}}");
        fx.compiler.compile(&mut first, &input, &output).unwrap();
        assert_eq!(fx.renders(), 1);

        let mut second = fx.procedure("{{{load \"body\"}}}");
        fx.compiler.compile(&mut second, &input, &output).unwrap();
        assert_eq!(fx.renders(), 1);

        assert_eq!(first.template(), second.template());
        assert!(fx
            .cache
            .exists(&cache_key("{{{load \"body\"}}}", "default", "default")));
    }

    #[test]
    fn test_edited_template_is_recompiled() {
        let fx = fixture();
        let input = Document::new("default").with("x", "42");
        let output = Document::new("default");

        let mut first = fx.procedure("{{{load \"body\"}}}");
        fx.compiler.compile(&mut first, &input, &output).unwrap();

        let mut edited = fx.procedure("# edited\n{{{load \"body\"}}}");
        fx.compiler.compile(&mut edited, &input, &output).unwrap();

        assert_eq!(fx.renders(), 2);
        assert!(edited.template().starts_with("# edited\n"));
        assert!(fx
            .cache
            .exists(&cache_key("# edited\n{{{load \"body\"}}}", "default", "default")));
    }

    #[test]
    fn test_disabled_cache_always_renders() {
        let mut fx = fixture();
        fx.compiler.disable_cache();
        assert!(!fx.compiler.is_cache_enabled());

        let input = Document::new("default").with("x", "1");
        let output = Document::new("default");
        for _ in 0..2 {
            let mut procedure = fx.procedure("{{{load \"body\"}}}");
            fx.compiler.compile(&mut procedure, &input, &output).unwrap();
        }

        assert_eq!(fx.renders(), 2);
        assert!(!fx
            .cache
            .exists(&cache_key("{{{load \"body\"}}}", "default", "default")));

        fx.compiler.enable_cache();
        assert!(fx.compiler.is_cache_enabled());
    }

    #[test]
    fn test_invalid_skeleton_is_not_cached() {
        let fx = fixture();
        let template = "{{{load \"no_exit\"}}}";
        let mut procedure = fx.procedure(template);

        let err = fx
            .compiler
            .compile(
                &mut procedure,
                &Document::new("default"),
                &Document::new("default"),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Requirement(_)));
        assert_eq!(procedure.template(), template);
        assert!(!fx.cache.exists(&cache_key(template, "default", "default")));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let fx = fixture();
        let mut procedure = fx.procedure("{{{load \"broken\"}}}");

        let err = fx
            .compiler
            .compile(
                &mut procedure,
                &Document::new("default"),
                &Document::new("default"),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn test_partial_selected_by_input_kind() {
        let fx = fixture();
        let mut procedure = fx.procedure("{{{load \"procedure_\" procedure_type}}}");

        fx.compiler
            .compile(
                &mut procedure,
                &Document::new("capture"),
                &Document::new("default"),
            )
            .unwrap();

        let mut output = Document::new("default");
        procedure
            .run(&Document::new("capture"), &mut output)
            .unwrap();
        assert_eq!(output.get("content"), Some(&serde_json::json!("captured")));
    }

    #[test]
    fn test_missing_partial_fails() {
        let fx = fixture();
        let mut procedure = fx.procedure("{{{load \"nope\"}}}");

        let err = fx
            .compiler
            .compile(
                &mut procedure,
                &Document::new("default"),
                &Document::new("default"),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_clear_cache_only_removes_compiled_skeletons() {
        let fx = fixture();
        let input = Document::new("default").with("x", "42");
        let mut procedure = fx.procedure("{{{load \"body\"}}}");
        fx.compiler
            .compile(&mut procedure, &input, &Document::new("default"))
            .unwrap();
        fx.cache.save("unrelated", "data").unwrap();

        fx.compiler.clear_cache().unwrap();

        assert!(!fx
            .cache
            .exists(&cache_key("{{{load \"body\"}}}", "default", "default")));
        assert!(fx.cache.exists("unrelated"));
    }

    #[test]
    fn test_compiled_procedure_runs() {
        let fx = fixture();
        let input = Document::new("default").with("x", "42");
        let mut output = Document::new("default");
        let mut procedure = fx.procedure("{{{load \"body\"}}}");

        fx.compiler
            .compile(&mut procedure, &input, &output)
            .unwrap();
        procedure.run(&input, &mut output).unwrap();

        assert_eq!(output.get("content"), Some(&serde_json::json!("42")));
    }

    #[test]
    fn test_shield_keeps_only_compile_time_tags() {
        let template = "{{{load \"a\" procedure_type}}} {{input.x}} {{{json input.y}}} {{output_type}}";
        let (shielded, kept) = shield_placeholders(template);

        assert_eq!(kept, vec!["{{input.x}}", "{{{json input.y}}}"]);
        assert!(shielded.contains("{{{load \"a\" procedure_type}}}"));
        assert!(shielded.contains("{{output_type}}"));
        assert!(!shielded.contains("input."));
        assert_eq!(restore_placeholders(&shielded, &kept), template);
    }

    #[test]
    fn test_top_level_placeholders_survive_skeleton() {
        let fx = fixture();
        let template = "echo '{\"content\":\"{{input.x}}\"}'\n{{#if input.x}}exit 0{{/if}}\n";
        let input = Document::new("default").with("x", "42");
        let mut output = Document::new("default");
        let mut procedure = fx.procedure(template);

        fx.compiler
            .compile(&mut procedure, &input, &output)
            .unwrap();
        assert_eq!(procedure.template(), template);

        procedure.run(&input, &mut output).unwrap();
        assert_eq!(output.get("content"), Some(&serde_json::json!("42")));
    }

    #[test]
    fn test_kind_names_resolved_outside_load() {
        let fx = fixture();
        let mut procedure = fx.procedure("# {{procedure_type}} {{output_type}}\n{{{load \"body\"}}}");

        fx.compiler
            .compile(
                &mut procedure,
                &Document::new("capture"),
                &Document::new("default"),
            )
            .unwrap();

        assert_eq!(
            procedure.template(),
            "# capture default\necho '{\"content\":\"{{input.x}}\"}'\nexit 0\n"
        );
    }

    /// Compiler over the shipped procedures, with a validator that accepts
    /// any syntax so only the termination check applies
    fn builtin_compiler(temp: &TempDir) -> (Arc<EmbeddedLoader>, ProcedureCompiler) {
        let loader = Arc::new(
            EmbeddedLoader::builtin(test_factory(temp.path())).with_template(
                VALIDATOR_PROCEDURE,
                "proc",
                "echo '{\"errors\":[]}'\n",
            ),
        );
        let validator = ProcedureValidator::new(loader.clone());
        let cache = Arc::new(FileCache::new(temp.path().join("cache"), "js"));
        let compiler = ProcedureCompiler::new(
            loader.clone(),
            validator,
            cache,
            Arc::new(HandlebarsRenderer::new()),
        );
        (loader, compiler)
    }

    fn bind_builtin(request: &Request) -> String {
        let temp = TempDir::new().unwrap();
        let (loader, compiler) = builtin_compiler(&temp);
        let response = Response::new();

        let mut procedure = loader.load("http_default").unwrap();
        compiler.compile(&mut procedure, request, &response).unwrap();
        assert!(procedure.template().contains("{{{json input.url}}}"));

        procedure.compile(request, &response).unwrap()
    }

    #[test]
    fn test_builtin_http_default_binds_page_request() {
        let request = Request::get("http://example.com")
            .with_header("Accept-Language", "en")
            .with_delay(2);
        let script = bind_builtin(&request);

        assert!(script.contains("page.open(\"http://example.com/\""));
        assert!(script.contains("operation: \"GET\""));
        assert!(script.contains("page.settings.resourceTimeout = 5000;"));
        assert!(script.contains("page.customHeaders = {\"Accept-Language\":\"en\"};"));
        assert!(!script.contains("page.viewportSize"));
        assert!(script.contains("response.content = page.content;"));
        assert!(script.contains("}, 2 * 1000);"));
        assert!(script.contains("phantom.exit("));
        assert!(!script.contains("{{"));
    }

    #[test]
    fn test_builtin_http_default_binds_capture_request() {
        let request = Request::capture("http://example.com/shot", "/tmp/spectre-shot.png")
            .with_viewport(800, 600)
            .with_timeout(1500);
        let script = bind_builtin(&request);

        assert!(script.contains("page.open(\"http://example.com/shot\""));
        assert!(script.contains("page.settings.resourceTimeout = 1500;"));
        assert!(script.contains("page.viewportSize = { width: 800, height: 600 };"));
        assert!(script.contains("page.render(\"/tmp/spectre-shot.png\""));
        assert!(script.contains("format: 'png'"));
        assert!(!script.contains("page.clipRect"));
        assert!(script.contains("phantom.exit("));
        assert!(!script.contains("{{"));
    }

    #[test]
    fn test_builtin_http_default_binds_pdf_request() {
        let paper = PaperSize {
            orientation: "landscape".to_string(),
            ..PaperSize::default()
        };
        let request = Request::pdf("http://example.com/doc", "/tmp/spectre-doc.pdf")
            .with_paper(paper);
        let script = bind_builtin(&request);

        assert!(script.contains("page.open(\"http://example.com/doc\""));
        assert!(script.contains("\"orientation\":\"landscape\""));
        assert!(script.contains("page.paperSize = paperSize;"));
        assert!(script.contains("page.render(\"/tmp/spectre-doc.pdf\", { format: 'pdf' });"));
        assert!(script.contains("phantom.exit("));
        assert!(!script.contains("{{"));
    }
}
