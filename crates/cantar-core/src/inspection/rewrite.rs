//! Rewriting arbitrary tarballs into canonical form.
//!
//! A first pass captures every entry's header and the stream offset of its
//! data region without touching the filesystem; the second pass walks the
//! captured tree in canonical order and re-emits it through the writer,
//! seeking back into the source for file bytes. Hardlinks are flattened
//! into file entries carrying the linked file's mode and bytes.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::creation::writer::{write_archive, WriteOutcome};
use crate::creation::{DataToken, EntrySource};
use crate::error::{ArchiveError, Result};
use crate::io::CopyBuffer;
use crate::reader::{read_stream, StreamConfig};
use crate::types::{EntryKind, Header, KnownPaths};

/// A captured entry, pre-canonical.
enum Node {
    Dir(BTreeMap<String, Node>),
    File { mode: u16, size: u64, offset: u64 },
    Symlink { target: String },
}

/// Rewrites the tarball on `src` into canonical form on `out`.
pub(crate) fn rewrite_stream<R: Read + Seek>(
    src: &mut R,
    out: &mut dyn Write,
    portable: bool,
    mut predicate: Option<&mut (dyn FnMut(&Header) -> bool + '_)>,
) -> Result<WriteOutcome> {
    let base = src.stream_position()?;

    let mut root: BTreeMap<String, Node> = BTreeMap::new();
    let mut files: std::collections::HashMap<String, (u16, u64, u64)> =
        std::collections::HashMap::new();
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
                    let record = (header.mode, header.size, base + entry.data_offset);
                    files.insert(header.path.clone(), record);
                    insert_node(
                        &mut root,
                        &header.path,
                        Node::File {
                            mode: record.0,
                            size: record.1,
                            offset: record.2,
                        },
                    );
                }
                EntryKind::SymLink => {
                    insert_node(
                        &mut root,
                        &header.path,
                        Node::Symlink {
                            target: header.link.clone(),
                        },
                    );
                }
                EntryKind::HardLink => {
                    // Flatten to a file entry with the linked file's mode
                    // and bytes.
                    let (mode, size, offset) =
                        *files.get(&header.link).ok_or_else(|| {
                            ArchiveError::HardlinkUnknownTarget {
                                path: header.path.clone(),
                                target: header.link.clone(),
                            }
                        })?;
                    files.insert(header.path.clone(), (mode, size, offset));
                    insert_node(&mut root, &header.path, Node::File { mode, size, offset });
                }
                _ => unreachable!("non-writable entry passed the flag check"),
            }
            Ok(())
        },
    )?;

    let mut entries = Vec::new();
    entries.push((Header::directory("."), None, 0usize));
    flatten(&root, String::new(), 1, &mut entries);

    let mut source = MemSource {
        entries,
        next: 0,
        src,
        buf: CopyBuffer::new(),
    };
    write_archive(out, &mut source, None, portable)
}

fn ensure_dir<'t>(root: &'t mut BTreeMap<String, Node>, path: &str) -> &'t mut BTreeMap<String, Node> {
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

fn insert_node(root: &mut BTreeMap<String, Node>, path: &str, node: Node) {
    let (dir, name) = match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (".", path),
    };
    ensure_dir(root, dir).insert(name.to_string(), node);
}

/// Flattens the tree depth-first in canonical sibling order.
fn flatten(
    dir: &BTreeMap<String, Node>,
    prefix: String,
    depth: usize,
    out: &mut Vec<(Header, Option<DataToken>, usize)>,
) {
    let mut children: Vec<(&String, &Node)> = dir.iter().collect();
    children.sort_by(|a, b| sort_key(a.0, a.1).cmp(&sort_key(b.0, b.1)));

    for (name, node) in children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        match node {
            Node::Dir(map) => {
                out.push((Header::directory(path.clone()), None, depth));
                flatten(map, path, depth + 1, out);
            }
            Node::File { mode, size, offset } => {
                out.push((
                    Header::file(path, *mode, *size),
                    Some(DataToken::SourceOffset(*offset)),
                    depth,
                ));
            }
            Node::Symlink { target } => {
                out.push((Header::symlink(path, target.clone()), None, depth));
            }
        }
    }
}

fn sort_key(name: &str, node: &Node) -> Vec<u8> {
    let mut key = name.as_bytes().to_vec();
    if matches!(node, Node::Dir(_)) {
        key.push(b'/');
    }
    key
}

/// Entry source over the captured tree, seeking into the original stream
/// for file bytes.
struct MemSource<'r, R: Read + Seek> {
    entries: Vec<(Header, Option<DataToken>, usize)>,
    next: usize,
    src: &'r mut R,
    buf: CopyBuffer,
}

impl<R: Read + Seek> EntrySource for MemSource<'_, R> {
    fn next_entry(&mut self) -> Result<Option<(Header, Option<DataToken>)>> {
        match self.entries.get(self.next) {
            None => Ok(None),
            Some((header, token, _)) => {
                self.next += 1;
                Ok(Some((header.clone(), token.clone())))
            }
        }
    }

    fn skip_children(&mut self) {
        let Some(depth) = self.next.checked_sub(1).and_then(|i| self.entries.get(i)) else {
            return;
        };
        let depth = depth.2;
        while self
            .entries
            .get(self.next)
            .is_some_and(|(_, _, d)| *d > depth)
        {
            self.next += 1;
        }
    }

    fn write_data(&mut self, token: &DataToken, len: u64, out: &mut dyn Write) -> Result<()> {
        let DataToken::SourceOffset(offset) = token else {
            return Err(ArchiveError::Io(std::io::Error::other(
                "rewrite source got a foreign data token",
            )));
        };
        self.src.seek(SeekFrom::Start(*offset))?;
        self.buf.copy_exact(self.src, out, len)?;
        Ok(())
    }
}
