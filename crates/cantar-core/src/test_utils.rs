//! In-memory tarball fixtures for tests.
//!
//! The canonical writer refuses to emit malformed or non-canonical
//! streams, so tests build those by crafting raw blocks here instead.
//!
//! # Panics
//!
//! Builders panic on oversized field values; they are for test use only.

#![allow(clippy::missing_panics_doc)]

use crate::wire::block::{round_up_block, Block};

/// Builds raw tarballs block by block.
///
/// # Examples
///
/// ```
/// use cantar_core::test_utils::TarFixture;
///
/// let bytes = TarFixture::new()
///     .dir("d")
///     .file("d/hello.txt", b"hi")
///     .build();
/// assert_eq!(bytes.len() % 512, 0);
/// ```
#[derive(Default)]
pub struct TarFixture {
    bytes: Vec<u8>,
}

impl TarFixture {
    /// Starts an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a regular file with mode `0o644`.
    #[must_use]
    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.entry(path, b'0', "", 0o644, data)
    }

    /// Appends a regular file with an explicit mode.
    #[must_use]
    pub fn file_mode(self, path: &str, mode: u16, data: &[u8]) -> Self {
        self.entry(path, b'0', "", mode, data)
    }

    /// Appends a directory.
    #[must_use]
    pub fn dir(self, path: &str) -> Self {
        self.entry(path, b'5', "", 0o755, b"")
    }

    /// Appends a symlink.
    #[must_use]
    pub fn symlink(self, path: &str, target: &str) -> Self {
        self.entry(path, b'2', target, 0o755, b"")
    }

    /// Appends a hardlink.
    #[must_use]
    pub fn hardlink(self, path: &str, target: &str) -> Self {
        self.entry(path, b'1', target, 0o644, b"")
    }

    /// Appends an arbitrary entry; the workhorse behind the shorthands.
    #[must_use]
    pub fn entry(mut self, path: &str, typeflag: u8, link: &str, mode: u16, data: &[u8]) -> Self {
        let mut block = Block::zeroed();
        block.set_name(path.as_bytes());
        block.set_link(link.as_bytes());
        block.set_mode(mode);
        block.set_size(data.len() as u64);
        block.set_typeflag(typeflag);
        block.set_ustar_defaults();
        block.finalize_checksum();
        self.bytes.extend_from_slice(block.as_bytes());
        self.bytes.extend_from_slice(data);
        let padded = round_up_block(data.len() as u64) as usize;
        self.bytes.resize(self.bytes.len() + padded - data.len(), 0);
        self
    }

    /// Appends a PAX `x` (or, with `global`, `g`) header carrying
    /// pre-encoded record data.
    #[must_use]
    pub fn pax(mut self, global: bool, records: &[u8]) -> Self {
        let mut block = Block::zeroed();
        block.set_name(b"@PaxHeader");
        block.set_typeflag(if global { b'g' } else { b'x' });
        block.set_mode(0o644);
        block.set_size(records.len() as u64);
        block.set_ustar_defaults();
        block.finalize_checksum();
        self.bytes.extend_from_slice(block.as_bytes());
        self.bytes.extend_from_slice(records);
        let padded = round_up_block(records.len() as u64) as usize;
        self.bytes
            .resize(self.bytes.len() + padded - records.len(), 0);
        self
    }

    /// Appends a header block with a declared size but no data bytes,
    /// for exercising truncation and huge-size handling.
    #[must_use]
    pub fn header_only(mut self, path: &str, typeflag: u8, mode: u16, size: u64) -> Self {
        let mut block = Block::zeroed();
        block.set_name(path.as_bytes());
        block.set_mode(mode);
        block.set_size(size);
        block.set_typeflag(typeflag);
        block.set_ustar_defaults();
        block.finalize_checksum();
        self.bytes.extend_from_slice(block.as_bytes());
        self
    }

    /// Appends raw bytes verbatim.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Finishes with the two-block end-of-archive marker.
    #[must_use]
    pub fn build(mut self) -> Vec<u8> {
        self.bytes.extend_from_slice(&[0u8; 1024]);
        self.bytes
    }

    /// Finishes without any end-of-archive marker.
    #[must_use]
    pub fn build_unterminated(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encodes one PAX record with a correct self-counting length prefix.
#[must_use]
pub fn pax_record(key: &str, value: &str) -> Vec<u8> {
    let base = 1 + key.len() + 1 + value.len() + 1;
    let mut len = base;
    loop {
        let total = base + len.to_string().len();
        if total == len {
            break;
        }
        len = total;
    }
    let mut out = Vec::new();
    out.extend_from_slice(len.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(key.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.as_bytes());
    out.push(b'\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{list_archive, ListOptions};

    #[test]
    fn fixture_streams_parse() {
        let bytes = TarFixture::new()
            .dir("d")
            .file("d/f", b"data")
            .symlink("l", "d/f")
            .build();
        let headers = list_archive(&bytes[..], &ListOptions::default()).unwrap();
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn pax_record_len_is_self_consistent() {
        let record = pax_record("path", "some/long/name");
        let space = record.iter().position(|&b| b == b' ').unwrap();
        let len: usize = std::str::from_utf8(&record[..space])
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(len, record.len());
    }
}
