//! Skeleton stream framing.
//!
//! A skeleton is a tar-format byte stream that records the exact header
//! layout of a tarball with file data zeroed out. It opens with a global
//! extended header whose name field holds a fixed 15-byte magic string, so
//! a skeleton can be told apart from an ordinary tarball before replay.

use crate::wire::block::Block;

/// The 15-byte skeleton magic: `%!skeleton:` followed by four tag bytes.
pub(crate) const SKELETON_MAGIC: [u8; 15] = [
    b'%', b'!', b's', b'k', b'e', b'l', b'e', b't', b'o', b'n', b':', 0x83, 0xE6, 0xA8, 0xFE,
];

/// Builds the magic `g` block that prefixes every skeleton stream.
pub(crate) fn magic_block() -> Block {
    let mut block = Block::zeroed();
    block.set_name(&SKELETON_MAGIC);
    block.set_typeflag(b'g');
    block.set_mode(0o644);
    block.set_size(0);
    block.set_ustar_defaults();
    block.finalize_checksum();
    block
}

/// Returns `true` if `block` is a skeleton magic prefix.
pub(crate) fn is_magic_block(block: &Block) -> bool {
    block.typeflag() == b'g' && block.name_raw() == SKELETON_MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_is_fifteen_bytes() {
        assert_eq!(SKELETON_MAGIC.len(), 15);
        assert!(SKELETON_MAGIC.starts_with(b"%!skeleton:"));
        assert_eq!(&SKELETON_MAGIC[11..], &[0x83, 0xE6, 0xA8, 0xFE]);
    }

    #[test]
    fn magic_block_round_trips() {
        let block = magic_block();
        assert!(is_magic_block(&block));
        assert!(block.verify_format().is_ok());
        assert_eq!(block.size().unwrap(), 0);
    }

    #[test]
    fn ordinary_global_header_is_not_magic() {
        let mut block = Block::zeroed();
        block.set_name(b"pax_global_header");
        block.set_typeflag(b'g');
        block.set_ustar_defaults();
        block.finalize_checksum();
        assert!(!is_magic_block(&block));
    }
}
