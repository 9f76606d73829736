//! `cantar hash`

use anyhow::{Context, Result};

use crate::cli::HashArgs;
use crate::commands::open_input;
use cantar_core::{tree_hash, HashOptions};

pub fn execute(args: &HashArgs) -> Result<()> {
    let src = open_input(&args.archive)?;
    let options = HashOptions::new()
        .with_algorithm(args.algorithm.into())
        .with_skip_empty(args.skip_empty);
    let hash = tree_hash(src, &options)
        .with_context(|| format!("hashing {}", args.archive.display()))?;
    println!("{hash}");
    Ok(())
}
