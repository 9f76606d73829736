//! `cantar rewrite`

use std::io::Cursor;

use anyhow::{Context, Result};
use console::style;

use crate::cli::RewriteArgs;
use crate::commands::{open_output, slurp_input};
use cantar_core::{rewrite_archive, RewriteOptions};

pub fn execute(args: &RewriteArgs, quiet: bool) -> Result<()> {
    // The engine needs a seekable source; buffer the (possibly
    // decompressed) archive into memory.
    let bytes = slurp_input(&args.archive)?;
    let out = open_output(&args.output)?;

    let options = RewriteOptions::new().with_portable(args.portable);
    let report = rewrite_archive(Cursor::new(bytes), out, &options)
        .with_context(|| format!("rewriting {}", args.archive.display()))?;

    if !quiet {
        println!(
            "{} {} ({} entries, {} bytes)",
            style("rewrote").green().bold(),
            args.output.display(),
            report.entries_written,
            report.bytes_written,
        );
    }
    Ok(())
}
