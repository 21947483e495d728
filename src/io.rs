//! Position-tracking byte source.
use std::io::{self, Read};

/// Sequential reader that tracks how many bytes were consumed and can look
/// ahead by a few bytes without consuming them.
pub struct PosReader<R> {
    inner: R,
    pos: u64,
    lookahead: Vec<u8>,
}

impl<R: Read> PosReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_offset(inner, 0)
    }

    /// Start counting at `pos`, for readers that were already advanced.
    pub fn with_offset(inner: R, pos: u64) -> Self {
        PosReader {
            inner,
            pos,
            lookahead: Vec::new(),
        }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Look at the next byte without consuming it. `None` at end of input.
    pub fn peek_u8(&mut self) -> io::Result<Option<u8>> {
        if self.lookahead.is_empty() {
            let mut b = [0u8; 1];
            loop {
                match self.inner.read(&mut b) {
                    Ok(0) => return Ok(None),
                    Ok(_) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            self.lookahead.push(b[0]);
        }
        Ok(self.lookahead.first().copied())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for PosReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = if !self.lookahead.is_empty() {
            let n = self.lookahead.len().min(buf.len());
            buf[..n].copy_from_slice(&self.lookahead[..n]);
            self.lookahead.drain(..n);
            n
        } else {
            self.inner.read(buf)?
        };
        self.pos += n as u64;
        Ok(n)
    }
}
