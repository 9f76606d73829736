//! The reader's running record of every path accepted so far.

use std::collections::HashMap;

/// What a previously seen path turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    /// A directory.
    Directory,
    /// A symlink and its (normalized) target string.
    Symlink(String),
    /// A plain file and its size in bytes.
    File(u64),
    /// Any other entry type, tagged with its typeflag byte.
    Other(u8),
}

/// Map of normalized entry paths seen during one streaming pass.
///
/// The reader uses it to detect symlink-prefix attacks and to resolve
/// hardlink targets; the extractor's copy-symlinks resolver and the tree
/// hasher read it after the pass.
#[derive(Debug, Default)]
pub struct KnownPaths {
    map: HashMap<String, PathKind>,
}

impl KnownPaths {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` with its kind, replacing any earlier record.
    ///
    /// Later archive entries overwrite earlier ones on disk, so the map
    /// keeps last-writer-wins semantics.
    pub fn record(&mut self, path: &str, kind: PathKind) {
        self.map.insert(path.to_string(), kind);
    }

    /// Looks up a normalized path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&PathKind> {
        self.map.get(path)
    }

    /// Returns the recorded size if `path` was seen as a plain file.
    #[must_use]
    pub fn file_size(&self, path: &str) -> Option<u64> {
        match self.map.get(path) {
            Some(PathKind::File(size)) => Some(*size),
            _ => None,
        }
    }

    /// Returns `true` if `path` was recorded as a directory.
    #[must_use]
    pub fn is_directory(&self, path: &str) -> bool {
        matches!(self.map.get(path), Some(PathKind::Directory))
    }

    /// Returns the symlink target if `path` was recorded as a symlink.
    #[must_use]
    pub fn symlink_target(&self, path: &str) -> Option<&str> {
        match self.map.get(path) {
            Some(PathKind::Symlink(target)) => Some(target),
            _ => None,
        }
    }

    /// Finds the shortest proper prefix of `path` that is a known symlink.
    ///
    /// A hit means the archive is trying to create something *through* a
    /// symlink it declared earlier, which the extractor must refuse.
    #[must_use]
    pub fn symlink_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        for (idx, ch) in path.char_indices() {
            if ch == '/' {
                let prefix = &path[..idx];
                if matches!(self.map.get(prefix), Some(PathKind::Symlink(_))) {
                    return Some(prefix);
                }
            }
        }
        None
    }

    /// Iterates over all recorded symlinks as `(path, target)` pairs.
    pub fn symlinks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().filter_map(|(path, kind)| match kind {
            PathKind::Symlink(target) => Some((path.as_str(), target.as_str())),
            _ => None,
        })
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_lookup() {
        let mut known = KnownPaths::new();
        known.record("a", PathKind::File(10));
        known.record("d", PathKind::Directory);
        assert_eq!(known.file_size("a"), Some(10));
        assert!(known.is_directory("d"));
        assert_eq!(known.file_size("d"), None);
        assert_eq!(known.len(), 2);
    }

    #[test]
    fn last_record_wins() {
        let mut known = KnownPaths::new();
        known.record("x", PathKind::Symlink("t".into()));
        known.record("x", PathKind::File(1));
        assert_eq!(known.symlink_target("x"), None);
        assert_eq!(known.file_size("x"), Some(1));
    }

    #[test]
    fn detects_symlink_prefix() {
        let mut known = KnownPaths::new();
        known.record("link", PathKind::Symlink("/tmp".into()));
        assert_eq!(known.symlink_prefix("link/attack"), Some("link"));
        assert_eq!(known.symlink_prefix("link2/ok"), None);
        // The path itself being a symlink is overwrite, not traversal.
        assert_eq!(known.symlink_prefix("link"), None);
    }

    #[test]
    fn nested_symlink_prefix() {
        let mut known = KnownPaths::new();
        known.record("a", PathKind::Directory);
        known.record("a/b", PathKind::Symlink("../outside".into()));
        assert_eq!(known.symlink_prefix("a/b/c/d"), Some("a/b"));
    }
}
