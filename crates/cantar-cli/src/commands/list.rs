//! `cantar list`

use anyhow::{Context, Result};

use crate::cli::ListArgs;
use crate::commands::open_input;
use cantar_core::{EntryKind, Lister};

pub fn execute(args: &ListArgs) -> Result<()> {
    let src = open_input(&args.archive)?;
    let headers = Lister::new()
        .raw(args.raw)
        .strict(!args.lenient)
        .run(src)
        .with_context(|| format!("listing {}", args.archive.display()))?;

    for header in &headers {
        let kind = kind_char(header.kind);
        let link = match header.kind {
            EntryKind::SymLink => format!(" -> {}", header.link),
            EntryKind::HardLink => format!(" link to {}", header.link),
            _ => String::new(),
        };
        println!(
            "{kind} {:>4o} {:>12} {}{link}",
            header.mode, header.size, header.path
        );
    }
    Ok(())
}

fn kind_char(kind: EntryKind) -> char {
    match kind {
        EntryKind::File => '-',
        EntryKind::HardLink => 'h',
        EntryKind::SymLink => 'l',
        EntryKind::CharDevice => 'c',
        EntryKind::BlockDevice => 'b',
        EntryKind::Directory => 'd',
        EntryKind::Fifo => 'p',
        EntryKind::Other(byte) => byte as char,
    }
}
