//! Streaming tarball reader.
//!
//! Reads 512-byte blocks from a byte source, coalesces PAX (`x`/`g`) and
//! GNU (`L`/`K`) extended headers into logical [`Header`] records,
//! normalizes paths, maintains the known-path map and hands each entry's
//! data region to a consumer callback. Raw header bytes can be teed to a
//! side sink, which is how skeleton capture and replay are built.

use std::io::{Read, Write};

use crate::error::{ArchiveError, Result};
use crate::io::copy::{write_zeros, CopyBuffer};
use crate::types::{
    normalize_link, normalize_path, EntryKind, Header, KnownPaths, PathKind,
};
use crate::wire::block::{round_up_block, Block, BLOCK_SIZE};
use crate::wire::pax::{gnu_long_value, PaxOverrides, GNU_LONGNAME_PATH};

/// Extended headers larger than this are treated as malformed rather than
/// buffered.
const MAX_EXTENSION_SIZE: u64 = 8 * 1024 * 1024;

/// How the reader treats the stream.
///
/// Per-entry problems are never raised here; they travel as flags so the
/// driver can apply its predicate (or its strictness policy) first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamConfig {
    /// Yield extension headers as entries instead of coalescing them.
    pub raw: bool,
    /// When teeing, replace file data regions with zeros (skeleton
    /// capture). When false the consumer substitutes the data itself
    /// (skeleton replay).
    pub zero_file_data: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            raw: false,
            zero_file_data: true,
        }
    }
}

/// A problem detected while assembling one entry.
///
/// Problems are deferred: the driver decides after running the predicate
/// whether a flag becomes a hard error or the entry is quietly skipped.
#[derive(Debug, Clone)]
pub(crate) enum EntryFlag {
    /// Structural violation; the reason text lists every broken rule.
    Invalid(String),
    /// Entry type outside the writable subset.
    Unsupported,
    /// A proper prefix of the path was declared as a symlink earlier.
    SymlinkPrefix(String),
    /// Hardlink whose target was never seen as a plain file.
    HardlinkUnknown(String),
}

impl EntryFlag {
    /// Converts the flag into its public error.
    pub fn into_error(self, header: &Header) -> ArchiveError {
        match self {
            Self::Invalid(reason) => ArchiveError::invalid_header(header.path.clone(), reason),
            Self::Unsupported => ArchiveError::UnsupportedEntry {
                path: header.path.clone(),
                type_byte: header.kind.type_byte() as char,
            },
            Self::SymlinkPrefix(prefix) => ArchiveError::SymlinkAttack {
                path: header.path.clone(),
                prefix,
            },
            Self::HardlinkUnknown(target) => ArchiveError::HardlinkUnknownTarget {
                path: header.path.clone(),
                target,
            },
        }
    }
}

/// The not-yet-consumed data region of the current entry.
///
/// Implements [`Read`] capped at the region's wire length. Consumers must
/// either read the region fully or leave it untouched; anything in between
/// violates the callback protocol.
pub(crate) struct DataRegion<'a, R: Read + ?Sized> {
    src: &'a mut R,
    len: u64,
    remaining: u64,
}

impl<'a, R: Read + ?Sized> DataRegion<'a, R> {
    fn new(src: &'a mut R, len: u64) -> Self {
        Self {
            src,
            len,
            remaining: len,
        }
    }

    /// Wire length of the data region in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Bytes already consumed through this handle.
    pub fn consumed(&self) -> u64 {
        self.len - self.remaining
    }
}

impl<R: Read + ?Sized> Read for DataRegion<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let got = self.src.read(&mut buf[..cap])?;
        if got == 0 && cap > 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "archive ended inside a data region",
            ));
        }
        self.remaining -= got as u64;
        Ok(got)
    }
}

/// One decoded entry, handed to the consumer callback.
pub(crate) struct Entry<'a, 'b, 'w, R: Read + ?Sized> {
    /// The coalesced, normalized logical header.
    pub header: &'a Header,
    /// Deferred problem, if any.
    pub flag: Option<&'a EntryFlag>,
    /// The raw standard header block.
    pub raw_block: &'a Block,
    /// Stream offset of the first data byte, relative to where reading
    /// started.
    pub data_offset: u64,
    /// The entry's data region.
    pub data: &'a mut DataRegion<'b, R>,
    /// The tee sink, exposed so skeleton replay can substitute file data
    /// in stream order.
    pub sink: Option<&'a mut (dyn Write + 'w)>,
}

/// Drives a full streaming pass over `src`.
///
/// For every logical entry, `on_entry` is invoked with the header, any
/// deferred flag and the open data region; the reader itself advances the
/// stream to the next block boundary afterwards. When `tee` is given,
/// every raw header byte (including extension blocks, the terminating zero
/// block and any trailing bytes) is copied to it verbatim; file data is
/// zero-filled or left to the consumer per `config.zero_file_data`.
pub(crate) fn read_stream<'w, R, F>(
    src: &mut R,
    known: &mut KnownPaths,
    mut tee: Option<&mut (dyn Write + 'w)>,
    config: &StreamConfig,
    mut on_entry: F,
) -> Result<()>
where
    R: Read + ?Sized,
    F: FnMut(Entry<'_, '_, 'w, R>) -> Result<()>,
{
    let mut buf = CopyBuffer::new();
    let mut globals = PaxOverrides::default();
    let mut pending = PaxOverrides::default();
    let mut in_extension_run = false;
    let mut pos: u64 = 0;

    loop {
        let block = match read_block(src)? {
            Some(block) => block,
            None => {
                if in_extension_run {
                    return Err(ArchiveError::unexpected_eof(
                        "reading the header after an extended-header sequence",
                    ));
                }
                // Truncated archives without a terminator are tolerated.
                return Ok(());
            }
        };
        pos += BLOCK_SIZE as u64;

        if block.is_zero() {
            if let Some(sink) = tee.as_deref_mut() {
                sink.write_all(block.as_bytes())?;
            }
            drain_trailer(src, tee.as_deref_mut())?;
            return Ok(());
        }

        block.verify_format()?;

        let typeflag = block.typeflag();
        if !config.raw {
            match typeflag {
                b'x' | b'g' => {
                    let size = block.size()?;
                    let data = read_extension(src, &block, size, tee.as_deref_mut())?;
                    pos += round_up_block(size);
                    in_extension_run = true;
                    if typeflag == b'g' {
                        globals.merge_records(&data, &block.name_lossy())?;
                    } else {
                        pending.merge_records(&data, &block.name_lossy())?;
                    }
                    continue;
                }
                b'L' | b'K' if block.name_bytes() == GNU_LONGNAME_PATH => {
                    let size = block.size()?;
                    let data = read_extension(src, &block, size, tee.as_deref_mut())?;
                    pos += round_up_block(size);
                    let value = gnu_long_value(&data, &block.name_lossy())?;
                    if typeflag == b'L' {
                        pending.path = Some(value);
                    } else {
                        pending.link = Some(value);
                    }
                    in_extension_run = true;
                    continue;
                }
                _ => {}
            }
        }

        if let Some(sink) = tee.as_deref_mut() {
            sink.write_all(block.as_bytes())?;
        }

        let resolved = pending.resolved_over(&globals);
        pending.clear();
        in_extension_run = false;

        let (header, data_len, flag) = if config.raw {
            raw_header(&block)?
        } else {
            logical_header(&block, &resolved, known)?
        };

        let data_offset = pos;
        let region_total = round_up_block(data_len);
        let mut region = DataRegion::new(src, data_len);

        on_entry(Entry {
            header: &header,
            flag: flag.as_ref(),
            raw_block: &block,
            data_offset,
            data: &mut region,
            sink: tee.as_deref_mut(),
        })?;

        let consumed = region.consumed();
        if consumed != 0 && consumed != data_len {
            return Err(ArchiveError::CallbackProtocol {
                expected: data_len,
                actual: consumed,
            });
        }

        // Advance over whatever the consumer left, plus padding.
        let leftover = data_len - consumed + (region_total - data_len);
        let tee_drained = tee.as_deref_mut().filter(|_| header.kind != EntryKind::File);
        drain(src, tee_drained, &mut buf, leftover)?;
        if header.kind == EntryKind::File && config.zero_file_data {
            if let Some(sink) = tee.as_deref_mut() {
                write_zeros(sink, region_total)?;
            }
        }
        pos += region_total;
    }
}

/// Builds the logical header for a standard block, applying overrides,
/// normalization, hardlink resolution and validation, and records the path
/// in the known-path map.
fn logical_header(
    block: &Block,
    resolved: &PaxOverrides,
    known: &mut KnownPaths,
) -> Result<(Header, u64, Option<EntryFlag>)> {
    let mut flag: Option<EntryFlag> = None;

    let raw_path = match &resolved.path {
        Some(path) => path.clone(),
        None => match String::from_utf8(block.name_bytes()) {
            Ok(path) => path,
            Err(_) => {
                flag = Some(EntryFlag::Invalid("path is not UTF-8".into()));
                block.name_lossy()
            }
        },
    };
    let raw_link = match &resolved.link {
        Some(link) => link.clone(),
        None => match std::str::from_utf8(block.link_bytes()) {
            Ok(link) => link.to_string(),
            Err(_) => {
                if flag.is_none() {
                    flag = Some(EntryFlag::Invalid("link target is not UTF-8".into()));
                }
                String::from_utf8_lossy(block.link_bytes()).into_owned()
            }
        },
    };

    // The wire size governs the data region even when a later step
    // overrides the header's reported size.
    let data_len = match resolved.size {
        Some(size) => size,
        None => block.size()?,
    };

    let kind = EntryKind::from_type_byte(block.typeflag());
    let mode = match block.mode() {
        Ok(mode) => mode,
        Err(err) => {
            if flag.is_none() {
                flag = Some(EntryFlag::Invalid(err.to_string()));
            }
            0
        }
    };

    let link = match kind {
        EntryKind::SymLink => normalize_link(&raw_link),
        _ => normalize_path(&raw_link),
    };
    let mut header = Header {
        path: normalize_path(&raw_path),
        kind,
        mode,
        size: data_len,
        link,
    };

    if kind == EntryKind::HardLink && flag.is_none() {
        match known.file_size(&header.link) {
            Some(size) => header.size = size,
            None => flag = Some(EntryFlag::HardlinkUnknown(header.link.clone())),
        }
    }

    if flag.is_none() {
        if let Some(prefix) = known.symlink_prefix(&header.path) {
            flag = Some(EntryFlag::SymlinkPrefix(prefix.to_string()));
        }
    }

    if flag.is_none() {
        if let Err(err) = header.check() {
            let reason = match &err {
                ArchiveError::InvalidHeader { reason, .. } => reason.clone(),
                other => other.to_string(),
            };
            flag = Some(EntryFlag::Invalid(reason));
        }
    }

    if flag.is_none() && !kind.is_writable() {
        flag = Some(EntryFlag::Unsupported);
    }

    let record = match (&flag, kind) {
        (None, EntryKind::Directory) => PathKind::Directory,
        (None, EntryKind::SymLink) => PathKind::Symlink(header.link.clone()),
        (None, EntryKind::File) => PathKind::File(header.size),
        (None, EntryKind::HardLink) => PathKind::File(header.size),
        _ => PathKind::Other(block.typeflag()),
    };
    known.record(&header.path, record);

    Ok((header, data_len, flag))
}

/// Builds a best-effort header for raw mode: wire values, no coalescing,
/// no normalization, no map updates.
fn raw_header(block: &Block) -> Result<(Header, u64, Option<EntryFlag>)> {
    let size = block.size()?;
    let header = Header {
        path: block.name_lossy(),
        kind: EntryKind::from_type_byte(block.typeflag()),
        mode: block.mode().unwrap_or(0),
        size,
        link: String::from_utf8_lossy(block.link_bytes()).into_owned(),
    };
    Ok((header, size, None))
}

/// Reads one 512-byte block; `None` on clean EOF at a block boundary.
pub(crate) fn read_block<R: Read + ?Sized>(src: &mut R) -> Result<Option<Block>> {
    let mut bytes = [0u8; BLOCK_SIZE];
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        let got = src.read(&mut bytes[filled..])?;
        if got == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ArchiveError::unexpected_eof("reading a header block"));
        }
        filled += got;
    }
    Ok(Some(Block::from_bytes(bytes)))
}

/// Reads an extension entry's data region (plus padding), teeing the block
/// and its data verbatim when capturing.
fn read_extension<R: Read + ?Sized>(
    src: &mut R,
    block: &Block,
    size: u64,
    tee: Option<&mut (dyn Write + '_)>,
) -> Result<Vec<u8>> {
    if size > MAX_EXTENSION_SIZE {
        return Err(ArchiveError::invalid_header(
            block.name_lossy(),
            format!("extended header of {size} bytes is implausibly large"),
        ));
    }
    let padded = usize::try_from(round_up_block(size)).map_err(|_| {
        ArchiveError::invalid_header(block.name_lossy(), "extended header too large".to_string())
    })?;
    let mut data = vec![0u8; padded];
    src.read_exact(&mut data)
        .map_err(|_| ArchiveError::unexpected_eof("reading extended-header data"))?;
    if let Some(sink) = tee {
        sink.write_all(block.as_bytes())?;
        sink.write_all(&data)?;
    }
    data.truncate(size as usize);
    Ok(data)
}

/// Discards exactly `len` bytes, optionally copying them to `tee`.
fn drain<R: Read + ?Sized>(
    src: &mut R,
    tee: Option<&mut (dyn Write + '_)>,
    buf: &mut CopyBuffer,
    len: u64,
) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    match tee {
        Some(sink) => buf.copy_exact(src, sink, len)?,
        None => buf.skip_exact(src, len)?,
    }
    Ok(())
}

/// Consumes everything after the first zero block, preserving it on the
/// tee.
fn drain_trailer<R: Read + ?Sized>(
    src: &mut R,
    mut tee: Option<&mut (dyn Write + '_)>,
) -> Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let got = src.read(&mut chunk)?;
        if got == 0 {
            return Ok(());
        }
        if let Some(sink) = tee.as_deref_mut() {
            sink.write_all(&chunk[..got])?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn push_block(out: &mut Vec<u8>, block: &Block) {
        out.extend_from_slice(block.as_bytes());
    }

    fn file_block(name: &str, size: u64, typeflag: u8) -> Block {
        let mut block = Block::zeroed();
        block.set_name(name.as_bytes());
        block.set_mode(0o644);
        block.set_size(size);
        block.set_typeflag(typeflag);
        block.set_ustar_defaults();
        block.finalize_checksum();
        block
    }

    fn terminator(out: &mut Vec<u8>) {
        out.extend_from_slice(&[0u8; 1024]);
    }

    fn collect_entries(bytes: &[u8]) -> Vec<(Header, Option<String>)> {
        let mut known = KnownPaths::new();
        let mut entries = Vec::new();
        let mut cursor = Cursor::new(bytes);
        read_stream(
            &mut cursor,
            &mut known,
            None,
            &StreamConfig::default(),
            |entry| {
                entries.push((
                    entry.header.clone(),
                    entry.flag.map(|f| format!("{f:?}")),
                ));
                Ok(())
            },
        )
        .unwrap();
        entries
    }

    #[test]
    fn reads_a_simple_file_entry() {
        let mut bytes = Vec::new();
        push_block(&mut bytes, &file_block("hello.txt", 5, b'0'));
        bytes.extend_from_slice(b"hello");
        bytes.extend_from_slice(&[0u8; 507]);
        terminator(&mut bytes);

        let mut known = KnownPaths::new();
        let mut cursor = Cursor::new(bytes);
        let mut seen = Vec::new();
        read_stream(
            &mut cursor,
            &mut known,
            None,
            &StreamConfig::default(),
            |entry| {
                let mut content = String::new();
                entry.data.read_to_string(&mut content)?;
                seen.push((entry.header.path.clone(), content));
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(seen, vec![("hello.txt".to_string(), "hello".to_string())]);
        assert_eq!(known.file_size("hello.txt"), Some(5));
    }

    #[test]
    fn unread_data_is_skipped_for_the_consumer() {
        let mut bytes = Vec::new();
        push_block(&mut bytes, &file_block("a", 512, b'0'));
        bytes.extend_from_slice(&[b'x'; 512]);
        push_block(&mut bytes, &file_block("b", 0, b'0'));
        terminator(&mut bytes);

        let entries = collect_entries(&bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0.path, "b");
    }

    #[test]
    fn partial_consumption_is_a_protocol_error() {
        let mut bytes = Vec::new();
        push_block(&mut bytes, &file_block("a", 512, b'0'));
        bytes.extend_from_slice(&[b'x'; 512]);
        terminator(&mut bytes);

        let mut known = KnownPaths::new();
        let mut cursor = Cursor::new(bytes);
        let err = read_stream(
            &mut cursor,
            &mut known,
            None,
            &StreamConfig::default(),
            |entry| {
                let mut tiny = [0u8; 10];
                entry.data.read_exact(&mut tiny)?;
                Ok(())
            },
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::CallbackProtocol { .. }));
    }

    #[test]
    fn hardlink_size_is_overridden() {
        let mut bytes = Vec::new();
        push_block(&mut bytes, &file_block("orig", 512, b'0'));
        bytes.extend_from_slice(&[b'y'; 512]);
        let mut link = Block::zeroed();
        link.set_name(b"copy");
        link.set_link(b"orig");
        link.set_mode(0o644);
        link.set_size(0);
        link.set_typeflag(b'1');
        link.set_ustar_defaults();
        link.finalize_checksum();
        push_block(&mut bytes, &link);
        terminator(&mut bytes);

        let entries = collect_entries(&bytes);
        assert_eq!(entries[1].0.kind, EntryKind::HardLink);
        assert_eq!(entries[1].0.size, 512);
        assert!(entries[1].1.is_none());
    }

    #[test]
    fn unknown_hardlink_target_is_flagged() {
        let mut bytes = Vec::new();
        let mut link = Block::zeroed();
        link.set_name(b"copy");
        link.set_link(b"missing");
        link.set_typeflag(b'1');
        link.set_ustar_defaults();
        link.finalize_checksum();
        push_block(&mut bytes, &link);
        terminator(&mut bytes);

        let entries = collect_entries(&bytes);
        assert!(entries[0].1.as_deref().unwrap().contains("HardlinkUnknown"));
    }

    #[test]
    fn symlink_prefix_is_flagged() {
        let mut bytes = Vec::new();
        let mut link = Block::zeroed();
        link.set_name(b"link");
        link.set_link(b"/tmp");
        link.set_typeflag(b'2');
        link.set_mode(0o755);
        link.set_ustar_defaults();
        link.finalize_checksum();
        push_block(&mut bytes, &link);
        push_block(&mut bytes, &file_block("link/attack", 0, b'0'));
        terminator(&mut bytes);

        let entries = collect_entries(&bytes);
        assert!(entries[0].1.is_none());
        assert!(entries[1].1.as_deref().unwrap().contains("SymlinkPrefix"));
    }

    #[test]
    fn pax_path_override_applies() {
        let long_path = format!("{}/{}", "d".repeat(80), "f".repeat(60));
        let mut pax_data = Vec::new();
        {
            // Hand-rolled single record.
            let payload = format!("path={long_path}\n");
            let mut len = payload.len() + 1;
            loop {
                let total = payload.len() + 1 + len.to_string().len();
                if total == len {
                    break;
                }
                len = total;
            }
            pax_data.extend_from_slice(len.to_string().as_bytes());
            pax_data.push(b' ');
            pax_data.extend_from_slice(payload.as_bytes());
        }

        let mut bytes = Vec::new();
        let mut ext = Block::zeroed();
        ext.set_name(b"@PaxHeader");
        ext.set_typeflag(b'x');
        ext.set_mode(0o644);
        ext.set_size(pax_data.len() as u64);
        ext.set_ustar_defaults();
        ext.finalize_checksum();
        push_block(&mut bytes, &ext);
        bytes.extend_from_slice(&pax_data);
        bytes.extend_from_slice(&vec![0u8; 512 - pax_data.len() % 512]);
        push_block(&mut bytes, &file_block("short", 0, b'0'));
        terminator(&mut bytes);

        let entries = collect_entries(&bytes);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0.path, long_path);
    }

    #[test]
    fn eof_after_extension_is_unexpected() {
        let mut bytes = Vec::new();
        let mut ext = Block::zeroed();
        ext.set_name(b"@PaxHeader");
        ext.set_typeflag(b'x');
        ext.set_size(0);
        ext.set_ustar_defaults();
        ext.finalize_checksum();
        push_block(&mut bytes, &ext);

        let mut known = KnownPaths::new();
        let mut cursor = Cursor::new(bytes);
        let err = read_stream(
            &mut cursor,
            &mut known,
            None,
            &StreamConfig::default(),
            |_| Ok(()),
        )
        .unwrap_err();
        match err {
            ArchiveError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn garbage_stream_is_not_a_tarball() {
        let mut bytes = vec![b'G'; 1024];
        bytes.resize(2048, 0);
        let mut known = KnownPaths::new();
        let mut cursor = Cursor::new(bytes);
        let err = read_stream(
            &mut cursor,
            &mut known,
            None,
            &StreamConfig::default(),
            |_| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::NotATarball { .. }));
    }

    #[test]
    fn raw_mode_yields_extension_headers() {
        let mut bytes = Vec::new();
        let mut ext = Block::zeroed();
        ext.set_name(b"@PaxHeader");
        ext.set_typeflag(b'x');
        ext.set_size(0);
        ext.set_ustar_defaults();
        ext.finalize_checksum();
        push_block(&mut bytes, &ext);
        push_block(&mut bytes, &file_block("f", 0, b'0'));
        terminator(&mut bytes);

        let mut known = KnownPaths::new();
        let mut cursor = Cursor::new(bytes);
        let mut kinds = Vec::new();
        let config = StreamConfig {
            raw: true,
            zero_file_data: true,
        };
        read_stream(&mut cursor, &mut known, None, &config, |entry| {
            kinds.push(entry.header.kind);
            Ok(())
        })
        .unwrap();
        assert_eq!(kinds, vec![EntryKind::Other(b'x'), EntryKind::File]);
    }

    #[test]
    fn tee_reproduces_headers_and_zeroes_file_data() {
        let mut bytes = Vec::new();
        push_block(&mut bytes, &file_block("f", 3, b'0'));
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[0u8; 509]);
        terminator(&mut bytes);

        let mut known = KnownPaths::new();
        let mut cursor = Cursor::new(bytes.clone());
        let mut tee = Vec::new();
        read_stream(
            &mut cursor,
            &mut known,
            Some(&mut tee),
            &StreamConfig::default(),
            |entry| {
                std::io::copy(entry.data, &mut std::io::sink())?;
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(tee.len(), bytes.len());
        // Header block identical.
        assert_eq!(&tee[..512], &bytes[..512]);
        // Data region zeroed.
        assert!(tee[512..1024].iter().all(|&b| b == 0));
        // Terminator preserved.
        assert_eq!(&tee[1024..], &bytes[1024..]);
    }
}
