//! Canonical tarball creation: tree sources, block emission, portability
//! checks and skeleton replay.

pub(crate) mod portable;
pub(crate) mod walker;
pub(crate) mod writer;

use std::io::Write;
use std::path::PathBuf;

use crate::error::Result;
use crate::types::Header;

/// Where a file entry's bytes come from.
#[derive(Debug, Clone)]
pub(crate) enum DataToken {
    /// A file on disk, opened lazily at emission time.
    FsPath(PathBuf),
    /// A byte range in a seekable source stream.
    SourceOffset(u64),
}

/// A provider of logical entries in canonical emission order.
///
/// Implemented by the filesystem walker and by the rewriter's captured
/// in-memory tree. Entries must arrive depth-first with every directory
/// preceding its contents, siblings ordered with directory names compared
/// as if they ended in `/`.
pub(crate) trait EntrySource {
    /// Returns the next entry, or `None` at the end of the tree.
    fn next_entry(&mut self) -> Result<Option<(Header, Option<DataToken>)>>;

    /// Skips the children of the directory entry returned last.
    fn skip_children(&mut self);

    /// Streams the data bytes behind `token` to `out`.
    fn write_data(&mut self, token: &DataToken, len: u64, out: &mut dyn Write) -> Result<()>;

    /// Drains any non-fatal notes the source accumulated.
    fn take_warnings(&mut self) -> Vec<String> {
        Vec::new()
    }
}
