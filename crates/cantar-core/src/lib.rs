//! Canonical ustar engine for transferring file trees between systems.
//!
//! `cantar-core` reads, writes, rewrites and content-hashes POSIX
//! ustar tar archives. It is built for moving file *trees*, not host
//! metadata: ownership, timestamps and device numbers are dropped, output
//! is byte-deterministic, and a git-compatible tree hash identifies a
//! tarball by the tree it carries rather than by its bytes.
//!
//! Five operations make up the public surface:
//!
//! - [`create_archive`]: walk a directory and emit a canonical tarball;
//! - [`extract_archive`]: apply a tarball to a directory, defending
//!   against symlink attacks and materializing hardlinks as copies;
//! - [`list_archive`]: stream out logical headers without touching the
//!   filesystem;
//! - [`rewrite_archive`]: re-emit an arbitrary ustar/PAX/GNU tarball in
//!   canonical form;
//! - [`tree_hash`]: compute the git tree hash of the file tree a tarball
//!   implies.
//!
//! Streams are uncompressed; callers layer gzip or friends outside the
//! engine. Every operation accepts a predicate to filter entries, and
//! extraction can capture a *skeleton*, a byte-exact record of the
//! original header layout from which [`Creator::skeleton`] can reproduce
//! the original tarball bit for bit.
//!
//! # Examples
//!
//! ```no_run
//! use cantar_core::{create_archive, tree_hash, CreateOptions, HashOptions};
//!
//! # fn main() -> cantar_core::Result<()> {
//! let mut tarball = Vec::new();
//! create_archive("./tree", &mut tarball, &CreateOptions::default())?;
//! let hash = tree_hash(&tarball[..], &HashOptions::default())?;
//! println!("{hash}");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
pub mod config;
mod creation;
pub mod error;
mod extraction;
pub mod host;
mod inspection;
pub mod io;
mod reader;
pub mod report;
pub mod test_utils;
pub mod types;
pub mod wire;

pub use api::{
    create_archive, extract_archive, list_archive, rewrite_archive, tree_hash, Creator, Extractor,
    Lister, Rewriter, TreeHasher,
};
pub use config::{CopySymlinks, CreateOptions, ExtractOptions, ListOptions, RewriteOptions};
pub use error::{ArchiveError, Result};
pub use host::{Host, HostFileType, HostStat, LocalHost};
pub use inspection::{HashAlgorithm, HashOptions};
pub use report::{CreateReport, ExtractReport};
pub use types::{EntryKind, Header};
