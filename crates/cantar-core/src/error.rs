//! Error types for tarball operations.

use thiserror::Error;

/// Result type alias using `ArchiveError`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors surfaced by the tar engine.
///
/// The engine never retries silently; every failure propagates to the
/// caller. Structural problems with a single entry carry the entry path so
/// callers can report which member of the archive was at fault.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O operation on the byte source or the filesystem failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not look like an uncompressed ustar archive.
    ///
    /// Raised on magic, version or checksum failures. Compressed input is
    /// the most common cause, hence the hint in the message.
    #[error("not a tarball: {reason} (if the input is compressed, decompress it first)")]
    NotATarball {
        /// Which wire-level check failed.
        reason: String,
    },

    /// An entry header violates a structural invariant.
    #[error("invalid header for {path:?}: {reason}")]
    InvalidHeader {
        /// Path recorded in the offending header (possibly empty).
        path: String,
        /// All accumulated rule violations, semicolon-separated.
        reason: String,
    },

    /// A well-formed entry of a type the engine does not handle.
    #[error("unsupported entry type `{type_byte}` for {path:?}")]
    UnsupportedEntry {
        /// Path of the unsupported entry.
        path: String,
        /// The raw typeflag byte, rendered as a character.
        type_byte: char,
    },

    /// An entry path passes through a previously declared symlink.
    #[error("symlink attack: {path:?} traverses symlink {prefix:?}")]
    SymlinkAttack {
        /// Path the archive asked to create.
        path: String,
        /// The prefix that was declared as a symlink earlier in the stream.
        prefix: String,
    },

    /// A hardlink whose target was not previously seen as a plain file.
    #[error("hardlink {path:?} targets unknown file {target:?}")]
    HardlinkUnknownTarget {
        /// Path of the hardlink entry.
        path: String,
        /// The unresolvable link target.
        target: String,
    },

    /// A path component that cannot be represented on Windows.
    #[error("non-portable component {component:?} in {path:?}: {reason}")]
    PortabilityError {
        /// Full entry path.
        path: String,
        /// The offending component.
        component: String,
        /// Which portability rule it violates.
        reason: String,
    },

    /// A predicate and a skeleton were supplied to the same operation.
    ///
    /// A skeleton records every header of the stream, so filtering entries
    /// would desynchronize it from the extracted tree.
    #[error("a predicate cannot be combined with a skeleton")]
    PredicateMisuse,

    /// An entry callback advanced the stream by an unexpected amount.
    ///
    /// Callbacks must consume an entry's data region either fully or not at
    /// all; the engine completes the advancement to the next 512-byte
    /// boundary itself.
    #[error("entry callback advanced the stream by {actual} bytes, expected 0 or {expected}")]
    CallbackProtocol {
        /// Bytes the callback was expected to consume.
        expected: u64,
        /// Bytes the callback actually consumed.
        actual: u64,
    },
}

impl ArchiveError {
    /// Builds a `NotATarball` error for a failed wire-level check.
    pub(crate) fn not_a_tarball(reason: impl Into<String>) -> Self {
        Self::NotATarball {
            reason: reason.into(),
        }
    }

    /// Builds an `InvalidHeader` error for a single violated rule.
    pub(crate) fn invalid_header(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Builds the `Io` wrapper for an unexpected end of stream.
    pub(crate) fn unexpected_eof(context: &str) -> Self {
        Self::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("unexpected end of archive while {context}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_tarball_mentions_compression() {
        let err = ArchiveError::not_a_tarball("header checksum mismatch");
        let msg = err.to_string();
        assert!(msg.contains("checksum mismatch"));
        assert!(msg.contains("compressed"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: ArchiveError = io.into();
        assert!(matches!(err, ArchiveError::Io(_)));
    }

    #[test]
    fn unexpected_eof_has_eof_kind() {
        let err = ArchiveError::unexpected_eof("reading extended headers");
        match err {
            ArchiveError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
