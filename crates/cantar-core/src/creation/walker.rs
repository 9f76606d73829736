//! Filesystem tree source for the canonical writer.

use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::creation::{DataToken, EntrySource};
use crate::error::{ArchiveError, Result};
use crate::host::Host;
use crate::io::CopyBuffer;
use crate::types::Header;

/// Walks a directory tree in canonical order, yielding logical headers.
///
/// The walk is depth-first with directories before their contents;
/// siblings are ordered by name with directory names compared as if they
/// carried a trailing `/`, matching the order the rewriter and hasher use.
/// Entry types outside the writable subset (sockets, devices) are skipped
/// with a warning.
pub(crate) struct FsSource<'h> {
    root: PathBuf,
    iter: walkdir::IntoIter,
    host: &'h dyn Host,
    buf: CopyBuffer,
    warnings: Vec<String>,
}

impl<'h> FsSource<'h> {
    pub fn new(root: &Path, host: &'h dyn Host) -> Self {
        let iter = WalkDir::new(root)
            .follow_links(false)
            .sort_by(|a, b| sort_key(a).cmp(&sort_key(b)))
            .into_iter();
        Self {
            root: root.to_path_buf(),
            iter,
            host,
            buf: CopyBuffer::new(),
            warnings: Vec::new(),
        }
    }

    fn archive_path(&self, entry: &DirEntry) -> Result<String> {
        let rel = entry
            .path()
            .strip_prefix(&self.root)
            .unwrap_or_else(|_| entry.path());
        let mut parts = Vec::new();
        for comp in rel.components() {
            match comp.as_os_str().to_str() {
                Some(text) => parts.push(text),
                None => {
                    return Err(ArchiveError::invalid_header(
                        entry.path().display().to_string(),
                        "file name is not UTF-8",
                    ))
                }
            }
        }
        if parts.is_empty() {
            Ok(".".to_string())
        } else {
            Ok(parts.join("/"))
        }
    }
}

impl EntrySource for FsSource<'_> {
    fn next_entry(&mut self) -> Result<Option<(Header, Option<DataToken>)>> {
        loop {
            let entry = match self.iter.next() {
                None => return Ok(None),
                Some(Err(err)) => {
                    return Err(ArchiveError::Io(std::io::Error::other(format!(
                        "walk error: {err}"
                    ))))
                }
                Some(Ok(entry)) => entry,
            };

            let path = self.archive_path(&entry)?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                return Ok(Some((Header::directory(path), None)));
            }
            if file_type.is_symlink() {
                let target = self.host.readlink(entry.path())?;
                let target = match target.to_str() {
                    Some(text) => text.replace('\\', "/"),
                    None => {
                        return Err(ArchiveError::invalid_header(
                            path,
                            "symlink target is not UTF-8",
                        ))
                    }
                };
                return Ok(Some((Header::symlink(path, target), None)));
            }
            if file_type.is_file() {
                let meta = entry.metadata().map_err(|err| {
                    ArchiveError::Io(std::io::Error::other(format!(
                        "cannot stat {}: {err}",
                        entry.path().display()
                    )))
                })?;
                let mode = if self.host.is_executable(&meta) {
                    0o755
                } else {
                    0o644
                };
                let header = Header::file(path, mode, meta.len());
                let token = DataToken::FsPath(entry.into_path());
                return Ok(Some((header, Some(token))));
            }

            self.warnings
                .push(format!("skipping special file {path:?}"));
        }
    }

    fn skip_children(&mut self) {
        self.iter.skip_current_dir();
    }

    fn write_data(&mut self, token: &DataToken, len: u64, out: &mut dyn Write) -> Result<()> {
        let DataToken::FsPath(path) = token else {
            return Err(ArchiveError::Io(std::io::Error::other(
                "filesystem source got a foreign data token",
            )));
        };
        let mut file = std::fs::File::open(path)?;
        self.buf.copy_exact(&mut file, out, len)?;
        Ok(())
    }

    fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

/// Sibling sort key: name bytes, with `/` appended for directories.
fn sort_key(entry: &DirEntry) -> Vec<u8> {
    let mut key = name_bytes(entry);
    if entry.file_type().is_dir() {
        key.push(b'/');
    }
    key
}

#[cfg(unix)]
fn name_bytes(entry: &DirEntry) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    entry.file_name().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn name_bytes(entry: &DirEntry) -> Vec<u8> {
    entry.file_name().to_string_lossy().into_owned().into_bytes()
}
