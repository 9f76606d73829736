//! Subcommand implementations.

pub mod create;
pub mod extract;
pub mod hash;
pub mod list;
pub mod rewrite;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Whether a path names a gzip-compressed archive by extension.
fn is_gz(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("tgz"),
        None => false,
    }
}

/// Opens an archive for reading, layering gzip decompression when the
/// extension asks for it. The engine itself only ever sees plain bytes.
pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file =
        File::open(path).with_context(|| format!("cannot open archive {}", path.display()))?;
    let buffered = BufReader::new(file);
    if is_gz(path) {
        Ok(Box::new(GzDecoder::new(buffered)))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Opens an archive for writing, layering gzip compression when the
/// extension asks for it.
pub fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    let file =
        File::create(path).with_context(|| format!("cannot create archive {}", path.display()))?;
    let buffered = BufWriter::new(file);
    if is_gz(path) {
        Ok(Box::new(GzEncoder::new(buffered, Compression::default())))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Reads an archive fully into memory, decompressing if needed. Used
/// where the engine requires a seekable source.
pub fn slurp_input(path: &Path) -> Result<Vec<u8>> {
    let mut reader = open_input(path)?;
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .with_context(|| format!("cannot read archive {}", path.display()))?;
    Ok(bytes)
}
