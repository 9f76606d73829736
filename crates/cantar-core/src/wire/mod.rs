//! Wire-level codecs: header blocks, PAX records, skeleton framing.

pub mod block;
pub(crate) mod pax;
pub(crate) mod skeleton;

pub use block::{round_up_block, Block, BLOCK_SIZE};
