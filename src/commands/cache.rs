/// `spectre cache` command implementation
use anyhow::{Context, Result};

use super::{client, tag};
use crate::cli::{CacheArgs, CacheCommands, CommonArgs};

pub fn run(common: &CommonArgs, args: &CacheArgs) -> Result<()> {
    match args.command {
        CacheCommands::Clear => clear(common),
    }
}

fn clear(common: &CommonArgs) -> Result<()> {
    let client = client(common)?;

    client
        .clear_cache()
        .context("Failed to clear compiled procedures")?;

    eprintln!(
        "{} Cleared compiled procedures in {}",
        tag(),
        client.cache().dir().display()
    );
    Ok(())
}
