//! `cantar extract`

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;

use crate::cli::ExtractArgs;
use crate::commands::open_input;
use cantar_core::Extractor;

pub fn execute(args: &ExtractArgs, quiet: bool) -> Result<()> {
    let src = open_input(&args.archive)?;
    let dest = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    let mut extractor = Extractor::new(&dest)
        .copy_symlinks(args.symlinks.into())
        .set_permissions(args.set_permissions);
    if let Some(skeleton_path) = &args.skeleton {
        let sink = std::fs::File::create(skeleton_path)
            .with_context(|| format!("cannot create skeleton {}", skeleton_path.display()))?;
        extractor = extractor.skeleton_sink(std::io::BufWriter::new(sink));
    }

    let report = extractor
        .run(src)
        .with_context(|| format!("extracting {}", args.archive.display()))?;

    if !quiet {
        println!(
            "{} {} entries into {} ({} bytes)",
            style("extracted").green().bold(),
            report.total_entries(),
            dest.display(),
            report.bytes_written,
        );
        for warning in &report.warnings {
            eprintln!("{} {warning}", style("warning:").yellow().bold());
        }
    }
    Ok(())
}
