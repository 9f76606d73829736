//! Listing archive contents without touching the filesystem.

use std::io::Read;

use crate::config::ListOptions;
use crate::error::Result;
use crate::reader::{read_stream, StreamConfig};
use crate::types::{Header, KnownPaths};
use crate::wire::BLOCK_SIZE;

/// Collects the headers of every entry on `src`.
///
/// In strict mode (the default) structurally invalid or unsupported
/// entries fail the listing; otherwise they are listed as-is. With
/// `raw` set, extension headers (`x`, `g`, GNU `L`/`K`) are yielded as
/// entries of their own instead of being folded into the next standard
/// header.
///
/// The optional callback sees each header along with the raw bytes of its
/// standard block, so tooling can inspect the wire encoding directly.
pub(crate) fn list_stream(
    src: &mut dyn Read,
    opts: &ListOptions,
    mut callback: Option<&mut (dyn FnMut(&Header, &[u8; BLOCK_SIZE]) + '_)>,
) -> Result<Vec<Header>> {
    let config = StreamConfig {
        raw: opts.raw,
        zero_file_data: true,
    };
    let mut known = KnownPaths::new();
    let mut headers = Vec::new();

    read_stream(src, &mut known, None, &config, |entry| {
        if opts.strict {
            if let Some(flag) = entry.flag {
                return Err(flag.clone().into_error(entry.header));
            }
        }
        if let Some(cb) = callback.as_deref_mut() {
            cb(entry.header, entry.raw_block.as_bytes());
        }
        headers.push(entry.header.clone());
        Ok(())
    })?;

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;
    use crate::wire::block::Block;
    use std::io::Cursor;

    fn simple_tarball() -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut dir = Block::zeroed();
        dir.set_name(b"d");
        dir.set_typeflag(b'5');
        dir.set_mode(0o755);
        dir.set_ustar_defaults();
        dir.finalize_checksum();
        bytes.extend_from_slice(dir.as_bytes());

        let mut file = Block::zeroed();
        file.set_name(b"d/f");
        file.set_typeflag(b'0');
        file.set_mode(0o644);
        file.set_size(3);
        file.set_ustar_defaults();
        file.finalize_checksum();
        bytes.extend_from_slice(file.as_bytes());
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[0u8; 509]);
        bytes.extend_from_slice(&[0u8; 1024]);
        bytes
    }

    #[test]
    fn lists_entries_in_order() {
        let bytes = simple_tarball();
        let headers = list_stream(&mut Cursor::new(bytes), &ListOptions::default(), None).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].path, "d");
        assert_eq!(headers[0].kind, EntryKind::Directory);
        assert_eq!(headers[1].path, "d/f");
        assert_eq!(headers[1].size, 3);
    }

    #[test]
    fn callback_sees_raw_blocks() {
        let bytes = simple_tarball();
        let mut typeflags = Vec::new();
        let mut cb = |_h: &Header, raw: &[u8; BLOCK_SIZE]| {
            typeflags.push(raw[156]);
        };
        list_stream(
            &mut Cursor::new(bytes),
            &ListOptions::default(),
            Some(&mut cb),
        )
        .unwrap();
        assert_eq!(typeflags, vec![b'5', b'0']);
    }

    #[test]
    fn strict_mode_rejects_device_entries() {
        let mut bytes = Vec::new();
        let mut dev = Block::zeroed();
        dev.set_name(b"dev/sda");
        dev.set_typeflag(b'4');
        dev.set_ustar_defaults();
        dev.finalize_checksum();
        bytes.extend_from_slice(dev.as_bytes());
        bytes.extend_from_slice(&[0u8; 1024]);

        let strict = list_stream(
            &mut Cursor::new(bytes.clone()),
            &ListOptions::default(),
            None,
        );
        assert!(strict.is_err());

        let lenient = list_stream(
            &mut Cursor::new(bytes),
            &ListOptions::new().with_strict(false),
            None,
        )
        .unwrap();
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient[0].kind, EntryKind::BlockDevice);
    }
}
