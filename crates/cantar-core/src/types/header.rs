//! The logical header record and its structural validation.

use crate::error::{ArchiveError, Result};
use crate::types::EntryKind;

/// A logical archive entry header.
///
/// This is the engine's single public record type: the reader yields it
/// after PAX/GNU coalescing and path normalization, predicates receive it,
/// and the writer consumes it. It deliberately carries no ownership,
/// timestamp or device metadata; the engine transfers file trees, not host
/// state.
///
/// # Examples
///
/// ```
/// use cantar_core::{EntryKind, Header};
///
/// let hdr = Header::file("docs/README.md", 0o644, 42);
/// assert_eq!(hdr.kind, EntryKind::File);
/// assert!(hdr.check().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Entry path, relative to the archive root, `/`-separated.
    pub path: String,
    /// Entry type.
    pub kind: EntryKind,
    /// Permission bits; only the read/write/execute bits are meaningful.
    pub mode: u16,
    /// Size of the entry's data region in bytes.
    pub size: u64,
    /// Link target; non-empty exactly for symlinks and hardlinks.
    pub link: String,
}

impl Header {
    /// Builds a regular-file header.
    #[must_use]
    pub fn file(path: impl Into<String>, mode: u16, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            mode,
            size,
            link: String::new(),
        }
    }

    /// Builds a directory header with the canonical directory mode.
    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            mode: 0o755,
            size: 0,
            link: String::new(),
        }
    }

    /// Builds a symlink header.
    #[must_use]
    pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::SymLink,
            mode: 0o755,
            size: 0,
            link: target.into(),
        }
    }

    /// Builds a hardlink header.
    #[must_use]
    pub fn hardlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::HardLink,
            mode: 0o644,
            size: 0,
            link: target.into(),
        }
    }

    /// Returns the mode this entry takes in canonical output.
    ///
    /// Files keep only the owner-executable distinction (`0o755` vs
    /// `0o644`); every other writable kind becomes `0o755`.
    #[must_use]
    pub fn normalized_mode(&self) -> u16 {
        match self.kind {
            EntryKind::File | EntryKind::HardLink => {
                if self.mode & 0o100 != 0 {
                    0o755
                } else {
                    0o644
                }
            }
            _ => 0o755,
        }
    }

    /// Validates the structural invariants of this header.
    ///
    /// Expects `path` and `link` to be normalized already (the reader
    /// normalizes before validating). All violated rules are accumulated
    /// into a single [`ArchiveError::InvalidHeader`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` listing every violated rule.
    pub fn check(&self) -> Result<()> {
        let mut problems: Vec<String> = Vec::new();

        if self.path.is_empty() {
            problems.push("empty path".into());
        }
        if self.path.contains('\0') {
            problems.push("path contains NUL".into());
        }
        if self.path.starts_with('/') {
            problems.push("absolute path".into());
        }
        if self.path.split('/').any(|c| c == "..") {
            problems.push("path contains `..`".into());
        }
        if self.path.ends_with('/') && !self.kind.is_directory() {
            problems.push("trailing slash on non-directory".into());
        }
        if !self.kind.is_directory() && (self.path == "." || self.path.ends_with("/.")) {
            problems.push("non-directory path names a directory".into());
        }

        if self.kind.is_link() {
            if self.link.is_empty() {
                problems.push("link entry without target".into());
            }
            if self.link.contains('\0') {
                problems.push("link target contains NUL".into());
            }
            match self.kind {
                EntryKind::HardLink => {
                    if self.link.starts_with('/') {
                        problems.push("absolute hardlink target".into());
                    }
                    if self.link.split('/').any(|c| c == "..") {
                        problems.push("hardlink target contains `..`".into());
                    }
                }
                EntryKind::SymLink => {
                    if !self.link.starts_with('/') && symlink_escapes(&self.path, &self.link) {
                        problems.push("symlink target escapes the archive root".into());
                    }
                }
                _ => unreachable!(),
            }
        } else if !self.link.is_empty() {
            problems.push("link target on non-link entry".into());
        }

        if matches!(
            self.kind,
            EntryKind::Directory | EntryKind::SymLink | EntryKind::HardLink
        ) && self.size != 0
        {
            problems.push(format!("nonzero size {} on {:?}", self.size, self.kind));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ArchiveError::invalid_header(
                self.path.clone(),
                problems.join("; "),
            ))
        }
    }
}

/// Normalizes an entry path: collapses `/` runs, removes `.` components and
/// any trailing slash.
///
/// A path consisting only of `.` components normalizes to `.` (the archive
/// root); an empty input stays empty so validation can reject it. A leading
/// `/` is preserved so validation can reject absolute paths.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in raw.split('/') {
        if comp.is_empty() || comp == "." {
            continue;
        }
        parts.push(comp);
    }
    let absolute = raw.starts_with('/');
    if parts.is_empty() {
        return if raw.is_empty() {
            String::new()
        } else if absolute {
            "/".to_string()
        } else {
            ".".to_string()
        };
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Normalizes a symlink target: collapses `/` runs and removes interior `.`
/// components, preserving `..` components and a trailing directory marker.
///
/// A target that ended in `/` or `/.` keeps a single trailing `/` so the
/// copy-symlinks resolver can still require it to name a directory.
#[must_use]
pub fn normalize_link(raw: &str) -> String {
    let trailing_dir = raw.ends_with('/') || raw == "." || raw.ends_with("/.");
    let mut parts: Vec<&str> = Vec::new();
    for comp in raw.split('/') {
        if comp.is_empty() || comp == "." {
            continue;
        }
        parts.push(comp);
    }
    let absolute = raw.starts_with('/');
    if parts.is_empty() {
        if raw.is_empty() {
            return String::new();
        }
        return if absolute { "/".into() } else { ".".into() };
    }
    let mut out = parts.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if trailing_dir {
        out.push('/');
    }
    out
}

/// Returns `true` if a relative symlink target, resolved against the
/// link's containing directory, would climb above the archive root.
fn symlink_escapes(path: &str, target: &str) -> bool {
    // Depth of the directory containing the link.
    let mut depth = path.split('/').filter(|c| !c.is_empty() && *c != ".").count();
    depth = depth.saturating_sub(1);
    let mut level = depth as i64;
    for comp in target.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                level -= 1;
                if level < 0 {
                    return true;
                }
            }
            _ => level += 1,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_strips() {
        assert_eq!(normalize_path("a//b/./c"), "a/b/c");
        assert_eq!(normalize_path("./a/"), "a");
        assert_eq!(normalize_path("."), ".");
        assert_eq!(normalize_path("./"), ".");
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("/etc//passwd"), "/etc/passwd");
        assert_eq!(normalize_path("a/.."), "a/..");
    }

    #[test]
    fn normalize_link_keeps_directory_marker() {
        assert_eq!(normalize_link("b//c/"), "b/c/");
        assert_eq!(normalize_link("b/."), "b/");
        assert_eq!(normalize_link("../x"), "../x");
        assert_eq!(normalize_link("/tmp"), "/tmp");
        assert_eq!(normalize_link("."), ".");
    }

    #[test]
    fn plain_file_header_is_valid() {
        assert!(Header::file("a/b.txt", 0o644, 10).check().is_ok());
    }

    #[test]
    fn root_directory_is_valid() {
        assert!(Header::directory(".").check().is_ok());
    }

    #[test]
    fn rejects_absolute_and_dotdot() {
        let err = Header::file("/etc/passwd", 0o644, 0).check().unwrap_err();
        assert!(err.to_string().contains("absolute"));

        let err = Header::file("a/../b", 0o644, 0).check().unwrap_err();
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn rejects_file_named_dot() {
        assert!(Header::file(".", 0o644, 0).check().is_err());
    }

    #[test]
    fn aggregates_all_problems() {
        let hdr = Header {
            path: "/x/../y".into(),
            kind: EntryKind::SymLink,
            mode: 0o755,
            size: 7,
            link: String::new(),
        };
        let err = hdr.check().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("absolute"));
        assert!(msg.contains(".."));
        assert!(msg.contains("without target"));
        assert!(msg.contains("nonzero size"));
    }

    #[test]
    fn hardlink_target_rules() {
        assert!(Header::hardlink("b", "a").check().is_ok());
        assert!(Header::hardlink("b", "/a").check().is_err());
        assert!(Header::hardlink("b", "x/../a").check().is_err());
    }

    #[test]
    fn symlink_escape_detection() {
        // `a/link -> ../x` stays inside the root.
        assert!(Header::symlink("a/link", "../x").check().is_ok());
        // `link -> ../x` climbs out of the root.
        assert!(Header::symlink("link", "../x").check().is_err());
        // Absolute targets are representable; extraction guards their use.
        assert!(Header::symlink("link", "/tmp").check().is_ok());
        // Deep climbs that re-descend still escape at their lowest point.
        assert!(Header::symlink("a/b/link", "../../../etc/passwd")
            .check()
            .is_err());
    }

    #[test]
    fn normalized_mode_collapses() {
        assert_eq!(Header::file("f", 0o751, 0).normalized_mode(), 0o755);
        assert_eq!(Header::file("f", 0o600, 0).normalized_mode(), 0o644);
        assert_eq!(Header::directory("d").normalized_mode(), 0o755);
        assert_eq!(Header::symlink("l", "t").normalized_mode(), 0o755);
    }
}
