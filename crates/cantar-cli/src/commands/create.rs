//! `cantar create`

use anyhow::{Context, Result};
use console::style;

use crate::cli::CreateArgs;
use crate::commands::open_output;
use cantar_core::Creator;

pub fn execute(args: &CreateArgs, quiet: bool) -> Result<()> {
    let out = open_output(&args.output)?;

    let mut creator = Creator::new(&args.source).portable(args.portable);
    if let Some(skeleton_path) = &args.skeleton {
        let skeleton = std::fs::File::open(skeleton_path)
            .with_context(|| format!("cannot open skeleton {}", skeleton_path.display()))?;
        creator = creator.skeleton(std::io::BufReader::new(skeleton));
    }

    let report = creator
        .write_to(out)
        .with_context(|| format!("creating {}", args.output.display()))?;

    if !quiet {
        println!(
            "{} {} ({} entries, {} bytes)",
            style("created").green().bold(),
            args.output.display(),
            report.entries_written,
            report.bytes_written,
        );
        for warning in &report.warnings {
            eprintln!("{} {warning}", style("warning:").yellow().bold());
        }
    }
    Ok(())
}
