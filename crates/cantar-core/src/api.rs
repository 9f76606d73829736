//! High-level public operations: create, extract, list, rewrite,
//! tree-hash.
//!
//! Each operation comes as a fluent builder (for predicates, skeletons and
//! host substitution) plus a plain function for the common case.

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::config::{CreateOptions, ExtractOptions, ListOptions, RewriteOptions};
use crate::creation::walker::FsSource;
use crate::creation::writer::{replay_skeleton, write_archive};
use crate::error::{ArchiveError, Result};
use crate::extraction::engine::extract_stream;
use crate::host::{Host, LocalHost};
use crate::inspection::list::list_stream;
use crate::inspection::rewrite::rewrite_stream;
use crate::inspection::tree_hash::{hash_stream, HashOptions};
use crate::io::CountingWriter;
use crate::report::{CreateReport, ExtractReport};
use crate::types::Header;
use crate::wire::BLOCK_SIZE;

static LOCAL_HOST: LocalHost = LocalHost;

type Predicate<'a> = Box<dyn FnMut(&Header) -> bool + 'a>;

/// Builder for [`create_archive`].
///
/// # Examples
///
/// ```no_run
/// use cantar_core::Creator;
///
/// # fn main() -> cantar_core::Result<()> {
/// let out = std::fs::File::create("tree.tar")?;
/// let report = Creator::new("./tree").portable(true).write_to(out)?;
/// println!("wrote {} entries", report.entries_written);
/// # Ok(())
/// # }
/// ```
pub struct Creator<'a> {
    root: PathBuf,
    options: CreateOptions,
    predicate: Option<Predicate<'a>>,
    skeleton: Option<Box<dyn Read + 'a>>,
    host: &'a dyn Host,
}

impl<'a> Creator<'a> {
    /// Starts a creation rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: CreateOptions::default(),
            predicate: None,
            skeleton: None,
            host: &LOCAL_HOST,
        }
    }

    /// Replaces the options wholesale.
    #[must_use]
    pub fn options(mut self, options: CreateOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables or disables the Windows portability check.
    #[must_use]
    pub fn portable(mut self, on: bool) -> Self {
        self.options.portable = on;
        self
    }

    /// Filters entries: only those for which `pred` returns `true` are
    /// written. Rejecting a directory prunes its whole subtree.
    #[must_use]
    pub fn predicate(mut self, pred: impl FnMut(&Header) -> bool + 'a) -> Self {
        self.predicate = Some(Box::new(pred));
        self
    }

    /// Reproduces the exact byte layout recorded in `skeleton` instead of
    /// the canonical layout. Incompatible with [`Self::predicate`].
    #[must_use]
    pub fn skeleton(mut self, skeleton: impl Read + 'a) -> Self {
        self.skeleton = Some(Box::new(skeleton));
        self
    }

    /// Substitutes the host filesystem (tests only, typically).
    #[must_use]
    pub fn host(mut self, host: &'a dyn Host) -> Self {
        self.host = host;
        self
    }

    /// Writes the tarball to `out`.
    ///
    /// # Errors
    ///
    /// `PredicateMisuse` when both a predicate and a skeleton were
    /// supplied; `PortabilityError` in portable mode; otherwise I/O and
    /// structural errors from the walk.
    pub fn write_to(mut self, out: impl Write) -> Result<CreateReport> {
        if self.predicate.is_some() && self.skeleton.is_some() {
            return Err(ArchiveError::PredicateMisuse);
        }
        if !self.root.is_dir() {
            return Err(ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source root is not a directory: {}", self.root.display()),
            )));
        }

        let mut counting = CountingWriter::new(out);
        let outcome = match self.skeleton.take() {
            Some(mut skeleton) => replay_skeleton(&mut skeleton, &self.root, &mut counting)?,
            None => {
                let mut source = FsSource::new(&self.root, self.host);
                write_archive(
                    &mut counting,
                    &mut source,
                    self.predicate.as_deref_mut(),
                    self.options.portable,
                )?
            }
        };

        Ok(CreateReport {
            entries_written: outcome.entries_written,
            bytes_written: counting.total_bytes(),
            warnings: outcome.warnings,
        })
    }
}

/// Builder for [`extract_archive`].
///
/// # Examples
///
/// ```no_run
/// use cantar_core::{CopySymlinks, Extractor};
///
/// # fn main() -> cantar_core::Result<()> {
/// let src = std::fs::File::open("tree.tar")?;
/// let report = Extractor::new("./out")
///     .copy_symlinks(CopySymlinks::Auto)
///     .set_permissions(true)
///     .run(src)?;
/// println!("extracted {} entries", report.total_entries());
/// # Ok(())
/// # }
/// ```
pub struct Extractor<'a> {
    dest: PathBuf,
    options: ExtractOptions,
    predicate: Option<Predicate<'a>>,
    skeleton_sink: Option<Box<dyn Write + 'a>>,
    host: &'a dyn Host,
}

impl<'a> Extractor<'a> {
    /// Starts an extraction into `dest`. A missing destination is created
    /// and removed again if the extraction fails.
    #[must_use]
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            options: ExtractOptions::default(),
            predicate: None,
            skeleton_sink: None,
            host: &LOCAL_HOST,
        }
    }

    /// Replaces the options wholesale.
    #[must_use]
    pub fn options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the symlink materialization strategy.
    #[must_use]
    pub fn copy_symlinks(mut self, mode: crate::config::CopySymlinks) -> Self {
        self.options.copy_symlinks = mode;
        self
    }

    /// Re-applies archive permission bits after writing files.
    #[must_use]
    pub fn set_permissions(mut self, on: bool) -> Self {
        self.options.set_permissions = on;
        self
    }

    /// Filters entries; errors attached to filtered entries are discarded
    /// with them. Incompatible with [`Self::skeleton_sink`].
    #[must_use]
    pub fn predicate(mut self, pred: impl FnMut(&Header) -> bool + 'a) -> Self {
        self.predicate = Some(Box::new(pred));
        self
    }

    /// Captures a skeleton of the stream into `sink` while extracting, so
    /// the original tarball can later be reproduced byte-for-byte.
    #[must_use]
    pub fn skeleton_sink(mut self, sink: impl Write + 'a) -> Self {
        self.skeleton_sink = Some(Box::new(sink));
        self
    }

    /// Substitutes the host filesystem (tests only, typically).
    #[must_use]
    pub fn host(mut self, host: &'a dyn Host) -> Self {
        self.host = host;
        self
    }

    /// Drives the extraction from `src`.
    ///
    /// # Errors
    ///
    /// Structural, safety and I/O errors, plus `PredicateMisuse` when a
    /// predicate is combined with a skeleton sink.
    pub fn run(mut self, mut src: impl Read) -> Result<ExtractReport> {
        if self.predicate.is_some() && self.skeleton_sink.is_some() {
            return Err(ArchiveError::PredicateMisuse);
        }

        let created_root = match self.host.lstat(&self.dest)? {
            None => {
                self.host.mkpath(&self.dest)?;
                true
            }
            Some(stat) if stat.file_type == crate::host::HostFileType::Directory => false,
            Some(_) => {
                return Err(ArchiveError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("destination is not a directory: {}", self.dest.display()),
                )))
            }
        };

        let result = extract_stream(
            &mut src,
            &self.dest,
            self.host,
            &self.options,
            self.predicate.as_deref_mut(),
            self.skeleton_sink.as_deref_mut(),
        );

        if result.is_err() && created_root {
            let _ = self.host.remove_all(&self.dest);
        }
        result
    }
}

/// Builder for [`list_archive`].
pub struct Lister {
    options: ListOptions,
}

impl Lister {
    /// Starts a listing with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: ListOptions::default(),
        }
    }

    /// Replaces the options wholesale.
    #[must_use]
    pub fn options(mut self, options: ListOptions) -> Self {
        self.options = options;
        self
    }

    /// Yields extension headers as entries instead of coalescing them.
    #[must_use]
    pub fn raw(mut self, on: bool) -> Self {
        self.options.raw = on;
        self
    }

    /// Fails on invalid or unsupported entries instead of listing them.
    #[must_use]
    pub fn strict(mut self, on: bool) -> Self {
        self.options.strict = on;
        self
    }

    /// Collects every header on `src`.
    ///
    /// # Errors
    ///
    /// Stream-level errors always; per-entry structural errors only in
    /// strict mode.
    pub fn run(self, mut src: impl Read) -> Result<Vec<Header>> {
        list_stream(&mut src, &self.options, None)
    }

    /// Like [`Self::run`], additionally invoking `callback` with each
    /// header and the raw bytes of its standard block.
    pub fn run_with(
        self,
        mut src: impl Read,
        mut callback: impl FnMut(&Header, &[u8; BLOCK_SIZE]),
    ) -> Result<Vec<Header>> {
        list_stream(&mut src, &self.options, Some(&mut callback))
    }
}

impl Default for Lister {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`rewrite_archive`].
pub struct Rewriter<'a> {
    options: RewriteOptions,
    predicate: Option<Predicate<'a>>,
}

impl<'a> Rewriter<'a> {
    /// Starts a rewrite with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: RewriteOptions::default(),
            predicate: None,
        }
    }

    /// Replaces the options wholesale.
    #[must_use]
    pub fn options(mut self, options: RewriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables or disables the Windows portability check.
    #[must_use]
    pub fn portable(mut self, on: bool) -> Self {
        self.options.portable = on;
        self
    }

    /// Filters entries before they reach the canonical output.
    #[must_use]
    pub fn predicate(mut self, pred: impl FnMut(&Header) -> bool + 'a) -> Self {
        self.predicate = Some(Box::new(pred));
        self
    }

    /// Reads the tarball on `src` and writes its canonical form to `out`.
    ///
    /// The source must be seekable; callers with a pipe-like source buffer
    /// it first.
    ///
    /// # Errors
    ///
    /// The extract error set minus filesystem errors, plus
    /// `PortabilityError` in portable mode.
    pub fn run(mut self, mut src: impl Read + Seek, out: impl Write) -> Result<CreateReport> {
        let mut counting = CountingWriter::new(out);
        let outcome = rewrite_stream(
            &mut src,
            &mut counting,
            self.options.portable,
            self.predicate.as_deref_mut(),
        )?;
        Ok(CreateReport {
            entries_written: outcome.entries_written,
            bytes_written: counting.total_bytes(),
            warnings: outcome.warnings,
        })
    }
}

impl Default for Rewriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`tree_hash`].
pub struct TreeHasher<'a> {
    options: HashOptions,
    predicate: Option<Predicate<'a>>,
}

impl<'a> TreeHasher<'a> {
    /// Starts a hash with the given algorithm.
    #[must_use]
    pub fn new(algorithm: crate::inspection::HashAlgorithm) -> Self {
        Self {
            options: HashOptions::new().with_algorithm(algorithm),
            predicate: None,
        }
    }

    /// Replaces the options wholesale.
    #[must_use]
    pub fn options(mut self, options: HashOptions) -> Self {
        self.options = options;
        self
    }

    /// Prunes empty directories before hashing.
    #[must_use]
    pub fn skip_empty(mut self, on: bool) -> Self {
        self.options.skip_empty = on;
        self
    }

    /// Filters entries out of the hashed tree.
    #[must_use]
    pub fn predicate(mut self, pred: impl FnMut(&Header) -> bool + 'a) -> Self {
        self.predicate = Some(Box::new(pred));
        self
    }

    /// Hashes the logical tree of the tarball on `src`, returning
    /// lowercase hex.
    ///
    /// # Errors
    ///
    /// The extract error set minus filesystem errors.
    pub fn hash(mut self, mut src: impl Read) -> Result<String> {
        hash_stream(&mut src, &self.options, self.predicate.as_deref_mut())
    }
}

/// Creates a canonical tarball of the tree under `root`.
///
/// # Errors
///
/// See [`Creator::write_to`].
pub fn create_archive(
    root: impl AsRef<Path>,
    out: impl Write,
    options: &CreateOptions,
) -> Result<CreateReport> {
    Creator::new(root.as_ref()).options(options.clone()).write_to(out)
}

/// Extracts a tarball stream into `dest`.
///
/// # Errors
///
/// See [`Extractor::run`].
pub fn extract_archive(
    src: impl Read,
    dest: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    Extractor::new(dest.as_ref()).options(options.clone()).run(src)
}

/// Lists the entries of a tarball stream.
///
/// # Errors
///
/// See [`Lister::run`].
pub fn list_archive(src: impl Read, options: &ListOptions) -> Result<Vec<Header>> {
    Lister::new().options(options.clone()).run(src)
}

/// Rewrites a tarball into canonical form.
///
/// # Errors
///
/// See [`Rewriter::run`].
pub fn rewrite_archive(
    src: impl Read + Seek,
    out: impl Write,
    options: &RewriteOptions,
) -> Result<CreateReport> {
    Rewriter::new().options(options.clone()).run(src, out)
}

/// Computes the git-compatible tree hash of a tarball stream.
///
/// # Errors
///
/// See [`TreeHasher::hash`].
pub fn tree_hash(src: impl Read, options: &HashOptions) -> Result<String> {
    TreeHasher {
        options: options.clone(),
        predicate: None,
    }
    .hash(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn predicate_and_skeleton_misuse_create() {
        let temp = TempDir::new().expect("tempdir");
        let err = Creator::new(temp.path())
            .predicate(|_| true)
            .skeleton(Cursor::new(Vec::new()))
            .write_to(Vec::new())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::PredicateMisuse));
    }

    #[test]
    fn predicate_and_skeleton_misuse_extract() {
        let temp = TempDir::new().expect("tempdir");
        let err = Extractor::new(temp.path())
            .predicate(|_| true)
            .skeleton_sink(Vec::new())
            .run(Cursor::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::PredicateMisuse));
    }

    #[test]
    fn missing_destination_is_created_and_removed_on_failure() {
        let temp = TempDir::new().expect("tempdir");
        let dest = temp.path().join("fresh");

        // A garbage stream fails after the root was created.
        let garbage = vec![b'Z'; 512];
        let err = Extractor::new(&dest).run(Cursor::new(garbage)).unwrap_err();
        assert!(matches!(err, ArchiveError::NotATarball { .. }));
        assert!(!dest.exists(), "fresh root removed on failure");
    }

    #[test]
    fn existing_destination_is_kept_on_failure() {
        let temp = TempDir::new().expect("tempdir");
        let garbage = vec![b'Z'; 512];
        let err = Extractor::new(temp.path())
            .run(Cursor::new(garbage))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotATarball { .. }));
        assert!(temp.path().exists());
    }

    #[test]
    fn create_report_counts_bytes() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::write(temp.path().join("f"), b"hello").unwrap();
        let mut out = Vec::new();
        let report = create_archive(temp.path(), &mut out, &CreateOptions::default()).unwrap();
        assert_eq!(report.entries_written, 2);
        assert_eq!(report.bytes_written, out.len() as u64);
    }
}
