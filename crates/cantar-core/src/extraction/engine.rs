//! Applies a tarball stream to a filesystem root.

use std::io::{Read, Write};
use std::path::Path;

use smallvec::SmallVec;

use crate::config::{CopySymlinks, ExtractOptions};
use crate::error::{ArchiveError, Result};
use crate::extraction::symlink_copy;
use crate::host::{sys_path, Host, HostFileType};
use crate::io::CopyBuffer;
use crate::reader::{read_stream, StreamConfig};
use crate::report::ExtractReport;
use crate::types::{EntryKind, Header, KnownPaths};
use crate::wire::skeleton;

/// Extracts `src` into `root`, which must already exist.
///
/// Entries are applied in stream order with overwrite semantics; hardlinks
/// are materialized as copies of their targets; symlinks are created
/// directly or deferred to the copy resolver depending on `opts`. When a
/// skeleton sink is supplied, every raw header byte is teed to it with
/// file data zeroed, producing a skeleton that can later reproduce the
/// original tarball from the extracted tree.
pub(crate) fn extract_stream(
    src: &mut dyn Read,
    root: &Path,
    host: &dyn Host,
    opts: &ExtractOptions,
    mut predicate: Option<&mut (dyn FnMut(&Header) -> bool + '_)>,
    skeleton_sink: Option<&mut (dyn Write + '_)>,
) -> Result<ExtractReport> {
    let copy_links = match opts.copy_symlinks {
        CopySymlinks::Always => true,
        CopySymlinks::Never => false,
        CopySymlinks::Auto => !host.can_symlink(root),
    };

    let mut tee = skeleton_sink;
    if let Some(sink) = tee.as_deref_mut() {
        sink.write_all(skeleton::magic_block().as_bytes())?;
    }

    let mut report = ExtractReport::new();
    let mut known = KnownPaths::new();
    let mut buf = CopyBuffer::new();
    // Paths of symlink entries deferred to the copy resolver, in stream
    // order.
    let mut deferred_links: SmallVec<[String; 8]> = SmallVec::new();

    read_stream(
        src,
        &mut known,
        tee,
        &StreamConfig::default(),
        |entry| {
            if let Some(pred) = predicate.as_deref_mut() {
                if !pred(entry.header) {
                    return Ok(());
                }
            }
            if let Some(flag) = entry.flag {
                return Err(flag.clone().into_error(entry.header));
            }

            let header = entry.header;
            let target = sys_path(root, &header.path);
            if !target.starts_with(root) {
                return Err(ArchiveError::invalid_header(
                    header.path.clone(),
                    "entry escapes the extraction root",
                ));
            }

            // Make sure the parent is a real directory.
            if let Some(parent) = target.parent() {
                if parent.starts_with(root) {
                    match host.lstat(parent)? {
                        Some(stat) if stat.file_type == HostFileType::Directory => {}
                        Some(_) => {
                            host.remove_all(parent)?;
                            host.mkpath(parent)?;
                        }
                        None => host.mkpath(parent)?,
                    }
                }
            }

            // Overwrite semantics: an existing directory satisfies a
            // directory entry, everything else is replaced.
            if let Some(existing) = host.lstat(&target)? {
                if header.kind.is_directory() && existing.file_type == HostFileType::Directory {
                    return Ok(());
                }
                host.remove_all(&target)?;
            }

            match header.kind {
                EntryKind::Directory => {
                    host.mkdir(&target)?;
                    report.directories_created += 1;
                }
                EntryKind::SymLink => {
                    if copy_links {
                        deferred_links.push(header.path.clone());
                    } else {
                        host.symlink(&header.link, &target)?;
                        report.symlinks_created += 1;
                    }
                }
                EntryKind::HardLink => {
                    let source = sys_path(root, &header.link);
                    if source != target {
                        host.copy_recursive(&source, &target)?;
                        report.hardlinks_copied += 1;
                        apply_permissions(host, opts, header, &target)?;
                    }
                }
                EntryKind::File => {
                    let mut file = std::fs::File::create(&target)?;
                    let len = entry.data.len();
                    buf.copy_exact(entry.data, &mut file, len)?;
                    drop(file);
                    report.files_written += 1;
                    report.bytes_written += len;
                    apply_permissions(host, opts, header, &target)?;
                }
                // Flagged as unsupported before we get here.
                _ => unreachable!("non-writable entry passed the flag check"),
            }
            Ok(())
        },
    )?;

    if copy_links {
        symlink_copy::materialize(root, host, &known, &deferred_links, &mut report)?;
    }

    Ok(report)
}

/// Re-applies archive permission bits after a file or hardlink copy.
///
/// The written file's current mode already reflects the host umask; the
/// archive mode is masked onto it, and when the archive marked the file
/// owner-executable, execute bits are derived from the surviving read bits
/// so the result is reproducible regardless of umask.
fn apply_permissions(
    host: &dyn Host,
    opts: &ExtractOptions,
    header: &Header,
    target: &Path,
) -> Result<()> {
    if !opts.set_permissions {
        return Ok(());
    }
    let Some(stat) = host.lstat(target)? else {
        return Ok(());
    };
    let current = stat.mode;
    let mut mode = u32::from(header.mode) & current;
    if header.mode & 0o100 != 0 {
        mode |= 0o100 | ((current & 0o444) >> 2);
    }
    host.chmod(target, mode)?;
    Ok(())
}
