//! Reusable copy/skip buffer for streaming data regions.

use std::io::{self, Read, Write};

/// Default I/O buffer size: 2 MiB, large enough to benefit from
/// transparent huge pages on hosts that offer them.
const COPY_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// A reusable heap buffer for copying and skipping byte ranges.
///
/// One buffer is allocated per streaming pass and shared by every entry in
/// it, so large archives do not churn the allocator.
pub struct CopyBuffer {
    buf: Vec<u8>,
}

impl CopyBuffer {
    /// Allocates the buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0; COPY_BUFFER_SIZE],
        }
    }

    /// Copies exactly `len` bytes from `src` to `dst`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the source ends early, or any write error.
    pub fn copy_exact<R, W>(&mut self, src: &mut R, dst: &mut W, len: u64) -> io::Result<()>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut remaining = len;
        while remaining > 0 {
            let chunk = self.buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let got = src.read(&mut self.buf[..chunk])?;
            if got == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended {remaining} bytes early"),
                ));
            }
            dst.write_all(&self.buf[..got])?;
            remaining -= got as u64;
        }
        Ok(())
    }

    /// Reads and discards exactly `len` bytes from `src`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the source ends early.
    pub fn skip_exact<R: Read + ?Sized>(&mut self, src: &mut R, len: u64) -> io::Result<()> {
        let mut remaining = len;
        while remaining > 0 {
            let chunk = self.buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let got = src.read(&mut self.buf[..chunk])?;
            if got == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended {remaining} bytes early"),
                ));
            }
            remaining -= got as u64;
        }
        Ok(())
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CopyBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyBuffer")
            .field("capacity", &self.buf.len())
            .finish()
    }
}

/// Writes `len` zero bytes to `dst` in block-sized chunks.
pub fn write_zeros<W: Write + ?Sized>(dst: &mut W, len: u64) -> io::Result<()> {
    const ZEROS: [u8; 4096] = [0; 4096];
    let mut remaining = len;
    while remaining > 0 {
        let chunk = ZEROS.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        dst.write_all(&ZEROS[..chunk])?;
        remaining -= chunk as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn copy_exact_moves_requested_bytes() {
        let data = vec![7u8; 10_000];
        let mut src = Cursor::new(data);
        let mut dst = Vec::new();
        let mut buf = CopyBuffer::new();
        buf.copy_exact(&mut src, &mut dst, 9_999).unwrap();
        assert_eq!(dst.len(), 9_999);
        assert!(dst.iter().all(|&b| b == 7));
    }

    #[test]
    fn copy_exact_fails_on_short_source() {
        let mut src = Cursor::new(vec![0u8; 10]);
        let mut dst = Vec::new();
        let mut buf = CopyBuffer::new();
        let err = buf.copy_exact(&mut src, &mut dst, 11).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn skip_exact_consumes() {
        let mut src = Cursor::new(vec![1u8; 600]);
        let mut buf = CopyBuffer::new();
        buf.skip_exact(&mut src, 512).unwrap();
        assert_eq!(src.position(), 512);
    }

    #[test]
    fn write_zeros_emits_exact_count() {
        let mut out = Vec::new();
        write_zeros(&mut out, 5000).unwrap();
        assert_eq!(out.len(), 5000);
        assert!(out.iter().all(|&b| b == 0));
    }
}
