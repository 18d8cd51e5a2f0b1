/// `spectre compile` command implementation
///
/// Prints the skeleton a procedure compiles to for a request type. The
/// skeleton is validated against a blank-page request of that type.
use anyhow::{Context, Result};

use spectre::{Request, Response};

use super::client;
use crate::cli::{CommonArgs, CompileArgs};

pub fn run(common: &CommonArgs, args: &CompileArgs) -> Result<()> {
    let client = client(common)?;

    let input = Request::get("about:blank").with_kind(args.kind.as_str());
    let output = Response::new();

    let procedure = client
        .compiled(&args.procedure, &input, &output)
        .with_context(|| {
            format!(
                "Failed to compile procedure {} for type {}",
                args.procedure, args.kind
            )
        })?;

    println!("{}", procedure.template());
    Ok(())
}
