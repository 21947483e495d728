//! MSB-first bit reader and writer.
use crate::error::{Error, Result};
use std::io::Read;

/// Reads a payload of known length bit by bit, pulling bytes from the
/// source only when the next field needs them.
pub struct BitReader<'a> {
    src: &'a mut dyn Read,
    base: u64,
    limit_bits: u64,
    consumed_bits: u64,
    cur: u8,
}

impl<'a> BitReader<'a> {
    /// `base` is the absolute offset of the first payload byte and is only
    /// used for error reporting.
    pub fn new(src: &'a mut dyn Read, base: u64, len_bytes: u64) -> Self {
        BitReader {
            src,
            base,
            limit_bits: len_bytes.saturating_mul(8),
            consumed_bits: 0,
            cur: 0,
        }
    }

    pub fn consumed_bits(&self) -> u64 {
        self.consumed_bits
    }

    pub fn remaining_bits(&self) -> u64 {
        self.limit_bits - self.consumed_bits
    }

    pub fn is_aligned(&self) -> bool {
        self.consumed_bits % 8 == 0
    }

    /// Absolute offset of the byte holding the next unread bit.
    pub fn offset(&self) -> u64 {
        self.base + self.consumed_bits / 8
    }

    fn truncated(&self) -> Error {
        Error::Truncated {
            box_type: None,
            offset: self.offset(),
        }
    }

    fn ensure(&self, bits: u64) -> Result<()> {
        if bits > self.remaining_bits() {
            Err(self.truncated())
        } else {
            Ok(())
        }
    }

    fn fetch(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        let at = self.offset();
        self.src
            .read_exact(&mut b)
            .map_err(|e| Error::from_io(e, at, None))?;
        Ok(b[0])
    }

    /// Read `n` bits (at most 64) as an unsigned integer.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        debug_assert!(n <= 64);
        self.ensure(u64::from(n))?;
        let mut out: u64 = 0;
        let mut left = n;
        while left > 0 {
            let bit_off = (self.consumed_bits % 8) as u32;
            if bit_off == 0 {
                self.cur = self.fetch()?;
            }
            let avail = 8 - bit_off;
            let take = avail.min(left);
            let shift = avail - take;
            let bits = (u64::from(self.cur) >> shift) & ((1u64 << take) - 1);
            out = (out << take) | bits;
            left -= take;
            self.consumed_bits += u64::from(take);
        }
        Ok(out)
    }

    pub fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>> {
        self.ensure(n.saturating_mul(8))?;
        if self.is_aligned() {
            let mut v = Vec::new();
            let at = self.offset();
            let got = Read::take(&mut *self.src, n).read_to_end(&mut v)?;
            if (got as u64) < n {
                return Err(Error::Truncated {
                    box_type: None,
                    offset: at + got as u64,
                });
            }
            self.consumed_bits += n * 8;
            Ok(v)
        } else {
            (0..n).map(|_| self.read_bits(8).map(|b| b as u8)).collect()
        }
    }
}

/// Accumulates bits MSB-first; the last byte is zero-filled.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    cur: u8,
    nbits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> u64 {
        self.buf.len() as u64 * 8 + u64::from(self.nbits)
    }

    pub fn is_aligned(&self) -> bool {
        self.nbits == 0
    }

    /// Write the low `n` bits of `value`. Callers check that it fits.
    pub fn write_bits(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 64);
        let mut left = n;
        while left > 0 {
            let space = 8 - self.nbits;
            let take = space.min(left);
            let bits = ((value >> (left - take)) & ((1u64 << take) - 1)) as u8;
            self.cur |= bits << (space - take);
            self.nbits += take;
            left -= take;
            if self.nbits == 8 {
                self.buf.push(self.cur);
                self.cur = 0;
                self.nbits = 0;
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.is_aligned() {
            self.buf.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u64::from(b), 8);
            }
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.buf.push(self.cur);
        }
        self.buf
    }
}
