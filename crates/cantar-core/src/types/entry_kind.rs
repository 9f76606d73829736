//! Archive entry type taxonomy.

/// Type of an archive entry, decoded from the ustar typeflag byte.
///
/// The engine creates and extracts the `File`, `HardLink`, `SymLink` and
/// `Directory` variants. Device nodes, FIFOs and unrecognized typeflags are
/// representable (so `list` can report them) but are never materialized on
/// disk.
///
/// # Examples
///
/// ```
/// use cantar_core::EntryKind;
///
/// assert_eq!(EntryKind::from_type_byte(b'0'), EntryKind::File);
/// assert_eq!(EntryKind::from_type_byte(0), EntryKind::File);
/// assert_eq!(EntryKind::from_type_byte(b'Z'), EntryKind::Other(b'Z'));
/// assert!(EntryKind::Directory.is_writable());
/// assert!(!EntryKind::Fifo.is_writable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Hard link to a file earlier in the same archive.
    HardLink,
    /// Symbolic link.
    SymLink,
    /// Character device node (listed, never extracted).
    CharDevice,
    /// Block device node (listed, never extracted).
    BlockDevice,
    /// Directory.
    Directory,
    /// Named pipe (listed, never extracted).
    Fifo,
    /// Any other typeflag byte, preserved verbatim.
    Other(u8),
}

impl EntryKind {
    /// Decodes a ustar typeflag byte.
    ///
    /// A NUL typeflag is the historical spelling of a regular file and maps
    /// to `File`.
    #[must_use]
    pub fn from_type_byte(byte: u8) -> Self {
        match byte {
            0 | b'0' => Self::File,
            b'1' => Self::HardLink,
            b'2' => Self::SymLink,
            b'3' => Self::CharDevice,
            b'4' => Self::BlockDevice,
            b'5' => Self::Directory,
            b'6' => Self::Fifo,
            other => Self::Other(other),
        }
    }

    /// Encodes this kind as a ustar typeflag byte.
    #[must_use]
    pub fn type_byte(self) -> u8 {
        match self {
            Self::File => b'0',
            Self::HardLink => b'1',
            Self::SymLink => b'2',
            Self::CharDevice => b'3',
            Self::BlockDevice => b'4',
            Self::Directory => b'5',
            Self::Fifo => b'6',
            Self::Other(byte) => byte,
        }
    }

    /// Returns `true` for the subset of kinds the engine writes and
    /// extracts: files, hardlinks, symlinks and directories.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Self::File | Self::HardLink | Self::SymLink | Self::Directory
        )
    }

    /// Returns `true` if entries of this kind must carry a link target.
    #[must_use]
    pub const fn is_link(self) -> bool {
        matches!(self, Self::HardLink | Self::SymLink)
    }

    /// Returns `true` for regular files.
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    /// Returns `true` for directories.
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_byte_round_trip() {
        for byte in [b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'x', b'g', b'L'] {
            let kind = EntryKind::from_type_byte(byte);
            assert_eq!(kind.type_byte(), byte);
        }
    }

    #[test]
    fn nul_typeflag_is_a_file() {
        assert_eq!(EntryKind::from_type_byte(0), EntryKind::File);
        // The canonical spelling wins when re-encoding.
        assert_eq!(EntryKind::from_type_byte(0).type_byte(), b'0');
    }

    #[test]
    fn writable_subset() {
        assert!(EntryKind::File.is_writable());
        assert!(EntryKind::HardLink.is_writable());
        assert!(EntryKind::SymLink.is_writable());
        assert!(EntryKind::Directory.is_writable());
        assert!(!EntryKind::CharDevice.is_writable());
        assert!(!EntryKind::BlockDevice.is_writable());
        assert!(!EntryKind::Fifo.is_writable());
        assert!(!EntryKind::Other(b'S').is_writable());
    }
}
