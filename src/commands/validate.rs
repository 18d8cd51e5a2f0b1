/// `spectre validate` command implementation
use anyhow::{Context, Result};
use std::fs;

use spectre::Error;

use super::{client, tag};
use crate::cli::{CommonArgs, ValidateArgs};

pub fn run(common: &CommonArgs, args: &ValidateArgs) -> Result<()> {
    let script = fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script: {}", args.script.display()))?;

    let client = client(common)?;

    match client.compiler().validator().validate(&script) {
        Ok(_) => {
            eprintln!("{} {} is valid", tag(), args.script.display());
            Ok(())
        }
        Err(Error::Syntax { errors }) => {
            for issue in &errors {
                eprintln!("{}: {}", args.script.display(), issue);
            }
            anyhow::bail!(
                "{} has {} syntax error(s)",
                args.script.display(),
                errors.len()
            )
        }
        Err(e) => Err(e).with_context(|| format!("Validation of {} failed", args.script.display())),
    }
}
