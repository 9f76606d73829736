//! Git-compatible content hashing of the logical file tree in a tarball.
//!
//! The stream is mirrored into an in-memory tree, files are hashed as git
//! blobs while their data flows past, and the tree is reduced bottom-up
//! with git's tree-object construction. The result matches `git
//! hash-object` / `git write-tree` over the same files.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::reader::{read_stream, StreamConfig};
use crate::types::{EntryKind, Header, KnownPaths};

/// Which git object hash to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// SHA-1, git's historical object format (20-byte ids).
    #[default]
    GitSha1,
    /// SHA-256, git's extended object format (32-byte ids).
    GitSha256,
}

impl HashAlgorithm {
    /// The algorithm's wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GitSha1 => "git-sha1",
            Self::GitSha256 => "git-sha256",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "git-sha1" => Some(Self::GitSha1),
            "git-sha256" => Some(Self::GitSha256),
            _ => None,
        }
    }

    /// Object id length in bytes.
    #[must_use]
    pub fn oid_len(self) -> usize {
        match self {
            Self::GitSha1 => 20,
            Self::GitSha256 => 32,
        }
    }
}

/// Options for [`crate::tree_hash`].
#[derive(Debug, Clone, Default)]
pub struct HashOptions {
    /// The git object hash to use.
    pub algorithm: HashAlgorithm,
    /// Prune directories that recursively contain no files or symlinks,
    /// reproducing git's indifference to empty subtrees.
    pub skip_empty: bool,
}

impl HashOptions {
    /// Returns the defaults: `git-sha1`, empty directories kept.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the hash algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Enables or disables empty-directory pruning.
    #[must_use]
    pub fn with_skip_empty(mut self, on: bool) -> Self {
        self.skip_empty = on;
        self
    }
}

/// Fixed-size object id storage; only `bytes[..len]` is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Oid {
    len: u8,
    bytes: [u8; 32],
}

impl Oid {
    fn as_slice(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    fn to_hex(self) -> String {
        hex::encode(self.as_slice())
    }
}

/// Incremental hasher over the selected algorithm.
enum GitHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl GitHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::GitSha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::GitSha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finish(self) -> Oid {
        let mut bytes = [0u8; 32];
        match self {
            Self::Sha1(h) => {
                let digest = h.finalize();
                bytes[..20].copy_from_slice(&digest);
                Oid { len: 20, bytes }
            }
            Self::Sha256(h) => {
                let digest = h.finalize();
                bytes.copy_from_slice(&digest);
                Oid { len: 32, bytes }
            }
        }
    }
}

/// One node of the mirrored tree.
enum Node {
    Dir(BTreeMap<String, Node>),
    Leaf { mode: &'static str, oid: Oid },
}

/// Hashes the logical tree of the tarball on `src`.
pub(crate) fn hash_stream(
    src: &mut dyn Read,
    opts: &HashOptions,
    mut predicate: Option<&mut (dyn FnMut(&Header) -> bool + '_)>,
) -> Result<String> {
    let algorithm = opts.algorithm;
    let mut root: BTreeMap<String, Node> = BTreeMap::new();
    let mut file_oids: HashMap<String, Oid> = HashMap::new();
    let mut known = KnownPaths::new();

    read_stream(
        src,
        &mut known,
        None,
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
            match header.kind {
                EntryKind::Directory => {
                    ensure_dir(&mut root, &header.path);
                }
                EntryKind::File => {
                    let oid = hash_blob_stream(algorithm, entry.data, header.size)?;
                    file_oids.insert(header.path.clone(), oid);
                    insert_leaf(&mut root, &header.path, file_mode(header.mode), oid);
                }
                EntryKind::SymLink => {
                    let oid = hash_blob_bytes(algorithm, header.link.as_bytes());
                    insert_leaf(&mut root, &header.path, "120000", oid);
                }
                EntryKind::HardLink => {
                    let oid = file_oids.get(&header.link).copied().ok_or_else(|| {
                        crate::error::ArchiveError::HardlinkUnknownTarget {
                            path: header.path.clone(),
                            target: header.link.clone(),
                        }
                    })?;
                    file_oids.insert(header.path.clone(), oid);
                    insert_leaf(&mut root, &header.path, file_mode(header.mode), oid);
                }
                _ => unreachable!("non-writable entry passed the flag check"),
            }
            Ok(())
        },
    )?;

    if opts.skip_empty {
        prune_empty(&mut root);
    }

    Ok(hash_tree(&root, algorithm).to_hex())
}

fn file_mode(mode: u16) -> &'static str {
    if mode & 0o100 != 0 {
        "100755"
    } else {
        "100644"
    }
}

/// Hashes `len` bytes from `data` as a git blob without buffering them.
fn hash_blob_stream(
    algorithm: HashAlgorithm,
    data: &mut dyn Read,
    len: u64,
) -> Result<Oid> {
    let mut hasher = GitHasher::new(algorithm);
    hasher.update(format!("blob {len}\0").as_bytes());
    let mut chunk = [0u8; 64 * 1024];
    let mut remaining = len;
    while remaining > 0 {
        let cap = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let got = data.read(&mut chunk[..cap])?;
        if got == 0 {
            return Err(crate::error::ArchiveError::unexpected_eof(
                "hashing a file data region",
            ));
        }
        hasher.update(&chunk[..got]);
        remaining -= got as u64;
    }
    Ok(hasher.finish())
}

fn hash_blob_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Oid {
    let mut hasher = GitHasher::new(algorithm);
    hasher.update(format!("blob {}\0", data.len()).as_bytes());
    hasher.update(data);
    hasher.finish()
}

/// Reduces a directory map to its git tree object id.
fn hash_tree(dir: &BTreeMap<String, Node>, algorithm: HashAlgorithm) -> Oid {
    let mut children: Vec<(&String, &Node)> = dir.iter().collect();
    children.sort_by(|a, b| git_sort_key(a.0, a.1).cmp(&git_sort_key(b.0, b.1)));

    let mut body = Vec::new();
    for (name, node) in children {
        let (mode, oid) = match node {
            Node::Dir(map) => ("40000", hash_tree(map, algorithm)),
            Node::Leaf { mode, oid } => (*mode, *oid),
        };
        body.extend_from_slice(mode.as_bytes());
        body.push(b' ');
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body.extend_from_slice(oid.as_slice());
    }

    let mut hasher = GitHasher::new(algorithm);
    hasher.update(format!("tree {}\0", body.len()).as_bytes());
    hasher.update(&body);
    hasher.finish()
}

/// Git orders tree children as if directory names ended in `/`.
fn git_sort_key(name: &str, node: &Node) -> Vec<u8> {
    let mut key = name.as_bytes().to_vec();
    if matches!(node, Node::Dir(_)) {
        key.push(b'/');
    }
    key
}

/// Creates (or re-creates) the directory node at `path`.
fn ensure_dir<'t>(
    root: &'t mut BTreeMap<String, Node>,
    path: &str,
) -> &'t mut BTreeMap<String, Node> {
    let mut current = root;
    if path == "." {
        return current;
    }
    for comp in path.split('/') {
        let slot = current
            .entry(comp.to_string())
            .or_insert_with(|| Node::Dir(BTreeMap::new()));
        if !matches!(slot, Node::Dir(_)) {
            *slot = Node::Dir(BTreeMap::new());
        }
        let Node::Dir(map) = slot else { unreachable!() };
        current = map;
    }
    current
}

fn insert_leaf(root: &mut BTreeMap<String, Node>, path: &str, mode: &'static str, oid: Oid) {
    let (dir, name) = match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (".", path),
    };
    let map = ensure_dir(root, dir);
    map.insert(name.to_string(), Node::Leaf { mode, oid });
}

/// Drops directories that contain no files or symlinks anywhere below.
fn prune_empty(dir: &mut BTreeMap<String, Node>) {
    dir.retain(|_, node| match node {
        Node::Leaf { .. } => true,
        Node::Dir(map) => {
            prune_empty(map);
            !map.is_empty()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_TREE_SHA1: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    const EMPTY_TREE_SHA256: &str =
        "6ef19b41225c5369f1c104d45d8d85efa9b057b53b14b4b9b939dd74decc5321";

    #[test]
    fn empty_tree_vectors() {
        let root = BTreeMap::new();
        assert_eq!(hash_tree(&root, HashAlgorithm::GitSha1).to_hex(), EMPTY_TREE_SHA1);
        assert_eq!(
            hash_tree(&root, HashAlgorithm::GitSha256).to_hex(),
            EMPTY_TREE_SHA256
        );
    }

    #[test]
    fn known_blob_vectors() {
        // `git hash-object` of the empty file and of "hello world\n".
        assert_eq!(
            hash_blob_bytes(HashAlgorithm::GitSha1, b"").to_hex(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
        assert_eq!(
            hash_blob_bytes(HashAlgorithm::GitSha1, b"hello world\n").to_hex(),
            "3b18e512dba79e4c8300dd08aeb37f8e728b8dad"
        );
    }

    #[test]
    fn streaming_blob_matches_buffered() {
        let data = vec![42u8; 100_000];
        let buffered = hash_blob_bytes(HashAlgorithm::GitSha256, &data);
        let mut cursor = std::io::Cursor::new(data);
        let streamed =
            hash_blob_stream(HashAlgorithm::GitSha256, &mut cursor, 100_000).unwrap();
        assert_eq!(buffered, streamed);
    }

    #[test]
    fn directories_sort_with_trailing_slash() {
        // "foo.txt" must sort before directory "foo".
        let mut root = BTreeMap::new();
        insert_leaf(
            &mut root,
            "foo.txt",
            "100644",
            hash_blob_bytes(HashAlgorithm::GitSha1, b"a"),
        );
        insert_leaf(
            &mut root,
            "foo/inner",
            "100644",
            hash_blob_bytes(HashAlgorithm::GitSha1, b"b"),
        );
        let Node::Dir(_) = root.get("foo").unwrap() else {
            panic!("foo should be a directory");
        };
        // The BTreeMap orders "foo" < "foo.txt"; the git key must flip it.
        let children: Vec<&String> = root.keys().collect();
        assert_eq!(children, ["foo", "foo.txt"]);
        let mut sorted: Vec<(&String, &Node)> = root.iter().collect();
        sorted.sort_by(|a, b| git_sort_key(a.0, a.1).cmp(&git_sort_key(b.0, b.1)));
        let order: Vec<&str> = sorted.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, ["foo.txt", "foo"]);
    }

    #[test]
    fn prune_empty_drops_leafless_subtrees() {
        let mut root = BTreeMap::new();
        ensure_dir(&mut root, "empty/nested/deeper");
        insert_leaf(
            &mut root,
            "kept/file",
            "100644",
            hash_blob_bytes(HashAlgorithm::GitSha1, b"x"),
        );
        prune_empty(&mut root);
        assert!(root.contains_key("kept"));
        assert!(!root.contains_key("empty"));
    }

    #[test]
    fn pruned_empty_tree_matches_git_empty_tree() {
        let mut root = BTreeMap::new();
        ensure_dir(&mut root, "only/empty/dirs");
        prune_empty(&mut root);
        assert_eq!(hash_tree(&root, HashAlgorithm::GitSha1).to_hex(), EMPTY_TREE_SHA1);
    }

    #[test]
    fn algorithm_names_round_trip() {
        for algo in [HashAlgorithm::GitSha1, HashAlgorithm::GitSha256] {
            assert_eq!(HashAlgorithm::from_name(algo.name()), Some(algo));
        }
        assert_eq!(HashAlgorithm::from_name("md5"), None);
        assert_eq!(HashAlgorithm::GitSha1.oid_len(), 20);
        assert_eq!(HashAlgorithm::GitSha256.oid_len(), 32);
    }
}
