//! Bit-level reading and writing, MSB-first within each byte

use crate::compress::CompressError;
use crate::decompress::DecompressError;

/// A read-only byte sequence the decoder pulls compressed data from
///
/// Compressed tables often live somewhere that is not plain RAM (flash behind
/// a cache, an SPI part, ...). Implement this to read from there directly
/// instead of copying the whole table out first.
pub trait ByteSource {
    /// Declared compressed length in bytes
    fn len(&self) -> usize;
    /// Fetch one byte. `index` is always less than `len()`.
    fn byte_at(&self, index: usize) -> u8;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl ByteSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }
    fn byte_at(&self, index: usize) -> u8 {
        self[index]
    }
}

/// Reads a bitstream one bit at a time
pub struct BitReader<'a, S: ?Sized> {
    src: &'a S,
    /// Index of the next bit
    pos: usize,
    end: usize,
    cur: u8,
}
impl<'a, S: ByteSource + ?Sized> BitReader<'a, S> {
    pub fn new(src: &'a S) -> Self {
        Self {
            src,
            pos: 0,
            end: src.len() * 8,
            cur: 0,
        }
    }

    pub fn bit(&mut self) -> Result<u16, DecompressError> {
        if self.pos == self.end {
            return Err(DecompressError::TruncatedInput);
        }
        if self.pos % 8 == 0 {
            self.cur = self.src.byte_at(self.pos / 8);
        }
        let b = (self.cur >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Ok(b as u16)
    }

    /// Read an `n`-bit field, most significant bit first
    pub fn bits(&mut self, n: u32) -> Result<u16, DecompressError> {
        debug_assert!(n <= 16);
        let mut v = 0;
        for _ in 0..n {
            v = (v << 1) | self.bit()?;
        }
        Ok(v)
    }

    /// Number of bits not yet consumed
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Check what follows the end-of-string code
    ///
    /// Only the zero padding of the final byte may remain.
    pub fn finish(mut self) -> Result<(), DecompressError> {
        let rest = self.remaining();
        if rest >= 8 || self.bits(rest as u32)? != 0 {
            return Err(DecompressError::TrailingData);
        }
        Ok(())
    }
}

/// Anything bits can be written to
pub trait BitSink {
    type Error;
    /// Write the low `len` bits of `value`, most significant first
    fn put_bits(&mut self, value: u32, len: u32) -> Result<(), Self::Error>;
}

/// Byte-granular output underneath a [BitWriter]
pub trait ByteSink {
    fn putc(&mut self, c: u8) -> Result<(), CompressError>;
}

/// Packs bits into bytes, MSB-first
pub struct BitWriter<O> {
    out: O,
    acc: u8,
    nacc: u32,
}
impl<O: ByteSink> BitWriter<O> {
    pub fn new(out: O) -> Self {
        Self {
            out,
            acc: 0,
            nacc: 0,
        }
    }

    /// Flush the last partial byte, padded with zero bits
    pub fn finish(mut self) -> Result<O, CompressError> {
        if self.nacc > 0 {
            self.out.putc(self.acc << (8 - self.nacc))?;
        }
        Ok(self.out)
    }
}
impl<O: ByteSink> BitSink for BitWriter<O> {
    type Error = CompressError;

    fn put_bits(&mut self, value: u32, len: u32) -> Result<(), CompressError> {
        debug_assert!(len <= 16);
        for i in (0..len).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1) as u8;
            self.nacc += 1;
            if self.nacc == 8 {
                self.out.putc(self.acc)?;
                self.acc = 0;
                self.nacc = 0;
            }
        }
        Ok(())
    }
}

/// Counts bits instead of writing them, for pricing encoding choices
#[derive(Debug, Default, Clone, Copy)]
pub struct BitCounter(pub usize);
impl BitSink for BitCounter {
    type Error = core::convert::Infallible;

    fn put_bits(&mut self, _value: u32, len: u32) -> Result<(), Self::Error> {
        self.0 += len as usize;
        Ok(())
    }
}
