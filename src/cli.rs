use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Spectre - Drive a headless browser through generated scripts
///
/// Spectre compiles script templates into cached skeletons, binds request
/// data into them and runs them with a headless runtime such as PhantomJS.
#[derive(Parser, Debug)]
#[command(name = "spectre")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive a headless browser through generated scripts", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Configuration overrides shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "SPECTRE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Headless runtime executable
    #[arg(long, env = "SPECTRE_ENGINE", global = true)]
    pub engine: Option<String>,

    /// Directory holding compiled procedures
    #[arg(long, env = "SPECTRE_CACHE_DIR", global = true)]
    pub cache_dir: Option<String>,

    /// Extra procedure directory, searched before configured ones (repeatable)
    #[arg(long = "procedures", value_name = "DIR", global = true)]
    pub procedures: Vec<String>,

    /// Run the runtime with debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Compile procedures without reusing or storing cached skeletons
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a page and print the response
    Request(RequestArgs),

    /// Print the compiled skeleton of a procedure
    Compile(CompileArgs),

    /// Check a script for syntax errors and a termination call
    Validate(ValidateArgs),

    /// Manage compiled procedures
    Cache(CacheArgs),
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Page URL
    pub url: String,

    /// HTTP method (OPTIONS, GET, HEAD, POST, PUT, DELETE, PATCH)
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Request data, sent as query string for GET/HEAD and as body otherwise (repeatable)
    #[arg(short = 'd', long = "data", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub data: Vec<(String, String)>,

    /// Resource timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Seconds to wait after load before running the procedure
    #[arg(long, value_name = "SECONDS")]
    pub delay: Option<u64>,

    /// Viewport size
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_viewport)]
    pub viewport: Option<(u32, u32)>,

    /// Render the page to an image file
    #[arg(long, value_name = "FILE", conflicts_with = "pdf")]
    pub capture: Option<PathBuf>,

    /// Image format for --capture (png, jpeg, gif)
    #[arg(long, requires = "capture")]
    pub format: Option<String>,

    /// Image quality for --capture (0-100)
    #[arg(long, requires = "capture", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: Option<u8>,

    /// Print the page to a PDF file
    #[arg(long, value_name = "FILE")]
    pub pdf: Option<PathBuf>,

    /// Paper format for --pdf (A4, Letter, ...)
    #[arg(long, requires = "pdf")]
    pub paper: Option<String>,

    /// Paper orientation for --pdf (portrait, landscape)
    #[arg(long, requires = "pdf")]
    pub orientation: Option<String>,

    /// Print the response as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Procedure name
    pub procedure: String,

    /// Request type the skeleton is compiled for
    #[arg(short = 't', long = "type", default_value = "default")]
    pub kind: String,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Script file to check
    pub script: PathBuf,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Remove every compiled procedure
    Clear,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", s))?;

    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }

    Ok((key.to_string(), value.to_string()))
}

fn parse_viewport(s: &str) -> Result<(u32, u32), String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{}`", s))?;

    let width = width
        .parse()
        .map_err(|_| format!("invalid width in `{}`", s))?;
    let height = height
        .parse()
        .map_err(|_| format!("invalid height in `{}`", s))?;

    Ok((width, height))
}
