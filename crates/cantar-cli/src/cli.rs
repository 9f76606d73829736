//! CLI argument parsing using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cantar")]
#[command(author, version, about = "Canonical tar archives for tree transfer", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a canonical tarball from a directory
    Create(CreateArgs),
    /// Extract a tarball into a directory
    Extract(ExtractArgs),
    /// List tarball contents without extraction
    List(ListArgs),
    /// Compute the git-compatible tree hash of a tarball
    Hash(HashArgs),
    /// Rewrite any tarball into canonical form
    Rewrite(RewriteArgs),
}

#[derive(clap::Args)]
pub struct CreateArgs {
    /// Output archive path (.gz/.tgz are gzip-compressed)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Directory to archive
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Reject names that cannot exist on Windows
    #[arg(long)]
    pub portable: bool,

    /// Reproduce the exact layout recorded in this skeleton file
    #[arg(long, value_name = "SKELETON")]
    pub skeleton: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ExtractArgs {
    /// Archive to extract (.gz/.tgz are decompressed transparently)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Output directory (default: current directory)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// How to materialize symlinks
    #[arg(long, value_enum, default_value = "auto")]
    pub symlinks: SymlinkMode,

    /// Re-apply archive permission bits to extracted files
    #[arg(long)]
    pub set_permissions: bool,

    /// Capture a skeleton of the archive into this file
    #[arg(long, value_name = "SKELETON")]
    pub skeleton: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SymlinkMode {
    /// Probe the destination and pick automatically
    Auto,
    /// Always create real symlinks
    Link,
    /// Always copy link targets
    Copy,
}

impl From<SymlinkMode> for cantar_core::CopySymlinks {
    fn from(mode: SymlinkMode) -> Self {
        match mode {
            SymlinkMode::Auto => Self::Auto,
            SymlinkMode::Link => Self::Never,
            SymlinkMode::Copy => Self::Always,
        }
    }
}

#[derive(clap::Args)]
pub struct ListArgs {
    /// Archive to list (.gz/.tgz are decompressed transparently)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Show extension headers instead of coalescing them
    #[arg(long)]
    pub raw: bool,

    /// Tolerate invalid and unsupported entries
    #[arg(long)]
    pub lenient: bool,
}

#[derive(clap::Args)]
pub struct HashArgs {
    /// Archive to hash (.gz/.tgz are decompressed transparently)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Hash algorithm
    #[arg(long, value_enum, default_value = "git-sha1")]
    pub algorithm: Algorithm,

    /// Ignore empty directories, as git does
    #[arg(long)]
    pub skip_empty: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Algorithm {
    /// git's SHA-1 object format
    GitSha1,
    /// git's SHA-256 object format
    GitSha256,
}

impl From<Algorithm> for cantar_core::HashAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::GitSha1 => Self::GitSha1,
            Algorithm::GitSha256 => Self::GitSha256,
        }
    }
}

#[derive(clap::Args)]
pub struct RewriteArgs {
    /// Archive to canonicalize (.gz/.tgz are decompressed into memory)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Output archive path (.gz/.tgz are gzip-compressed)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Reject names that cannot exist on Windows
    #[arg(long)]
    pub portable: bool,
}
