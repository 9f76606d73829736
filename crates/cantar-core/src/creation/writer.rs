//! Canonical block emission and skeleton replay.

use std::io::{Read, Write};
use std::path::Path;

use crate::creation::portable::check_portable;
use crate::creation::{DataToken, EntrySource};
use crate::error::{ArchiveError, Result};
use crate::host::sys_path;
use crate::io::copy::{write_zeros, CopyBuffer};
use crate::reader::{read_block, read_stream, StreamConfig};
use crate::types::{EntryKind, Header, KnownPaths};
use crate::wire::block::{round_up_block, Block, BLOCK_SIZE};
use crate::wire::pax::{plan_fields, PAX_BLOCK_NAME};
use crate::wire::skeleton;

/// What a write pass produced, before the caller adds byte counts.
#[derive(Debug, Default)]
pub(crate) struct WriteOutcome {
    pub entries_written: usize,
    pub warnings: Vec<String>,
}

/// Writes a canonical tarball from an ordered entry source.
///
/// Every header is mode-normalized and re-validated before emission; PAX
/// `x` blocks are inserted whenever a path, link target or size does not
/// fit the standard fields. The output ends with two zero blocks.
pub(crate) fn write_archive(
    out: &mut dyn Write,
    source: &mut dyn EntrySource,
    mut predicate: Option<&mut (dyn FnMut(&Header) -> bool + '_)>,
    portable: bool,
) -> Result<WriteOutcome> {
    let mut outcome = WriteOutcome::default();

    while let Some((header, token)) = source.next_entry()? {
        let canonical = Header {
            mode: header.normalized_mode(),
            ..header
        };

        if let Some(pred) = predicate.as_deref_mut() {
            if !pred(&canonical) {
                if canonical.kind.is_directory() {
                    source.skip_children();
                }
                continue;
            }
        }

        if portable {
            check_portable(&canonical.path)?;
        }
        canonical.check()?;

        emit_header(out, &canonical)?;

        if canonical.kind == EntryKind::File {
            let token = token.ok_or_else(|| {
                ArchiveError::invalid_header(canonical.path.clone(), "file entry without data")
            })?;
            source.write_data(&token, canonical.size, out)?;
            write_zeros(out, round_up_block(canonical.size) - canonical.size)?;
        }
        outcome.entries_written += 1;
    }

    finish(out)?;
    outcome.warnings = source.take_warnings();
    Ok(outcome)
}

/// Emits the PAX block (when needed) and the standard block for one
/// logical header.
fn emit_header(out: &mut dyn Write, header: &Header) -> Result<()> {
    let plan = plan_fields(header);

    if let Some(data) = plan.pax_data() {
        let mut ext = Block::zeroed();
        ext.set_name(PAX_BLOCK_NAME);
        ext.set_typeflag(b'x');
        ext.set_mode(0o644);
        ext.set_size(data.len() as u64);
        ext.set_ustar_defaults();
        ext.finalize_checksum();
        out.write_all(ext.as_bytes())?;
        out.write_all(&data)?;
        write_zeros(out, round_up_block(data.len() as u64) - data.len() as u64)?;
    }

    let mut block = Block::zeroed();
    block.set_name(&plan.name);
    block.set_prefix(&plan.prefix);
    block.set_link(&plan.link);
    block.set_mode(header.mode);
    block.set_size(header.size);
    block.set_typeflag(header.kind.type_byte());
    block.set_ustar_defaults();
    block.finalize_checksum();
    out.write_all(block.as_bytes())?;
    Ok(())
}

/// Writes the end-of-archive marker.
fn finish(out: &mut dyn Write) -> Result<()> {
    out.write_all(&[0u8; BLOCK_SIZE * 2])?;
    Ok(())
}

/// Reproduces the original tarball from a skeleton stream and an extracted
/// tree.
///
/// The skeleton's header blocks (including all PAX/GNU extensions and the
/// original trailer) are copied to `out` verbatim; the zeroed data region
/// of every file entry is replaced with the bytes of the matching file
/// under `root`. The result is byte-identical to the tarball the skeleton
/// was captured from.
pub(crate) fn replay_skeleton(
    skeleton: &mut dyn Read,
    root: &Path,
    out: &mut dyn Write,
) -> Result<WriteOutcome> {
    let magic = read_block(skeleton)?
        .ok_or_else(|| ArchiveError::invalid_header("skeleton", "empty skeleton stream"))?;
    if !skeleton::is_magic_block(&magic) {
        return Err(ArchiveError::invalid_header(
            "skeleton",
            "missing skeleton magic prefix",
        ));
    }

    let mut outcome = WriteOutcome::default();
    let mut known = KnownPaths::new();
    let mut buf = CopyBuffer::new();
    let config = StreamConfig {
        raw: false,
        zero_file_data: false,
    };

    read_stream(skeleton, &mut known, Some(out), &config, |entry| {
        if let Some(flag) = entry.flag {
            return Err(flag.clone().into_error(entry.header));
        }
        if entry.header.kind == EntryKind::File {
            let path = sys_path(root, &entry.header.path);
            let meta = std::fs::metadata(&path)?;
            let len = entry.data.len();
            if meta.len() != len {
                return Err(ArchiveError::invalid_header(
                    entry.header.path.clone(),
                    format!(
                        "on-disk size {} differs from recorded size {len}",
                        meta.len()
                    ),
                ));
            }
            let sink = entry
                .sink
                .ok_or_else(|| ArchiveError::Io(std::io::Error::other("replay without sink")))?;
            let mut file = std::fs::File::open(&path)?;
            buf.copy_exact(&mut file, sink, len)?;
            write_zeros(sink, round_up_block(len) - len)?;
        }
        outcome.entries_written += 1;
        Ok(())
    })?;

    Ok(outcome)
}
