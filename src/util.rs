//! Output targets shared by the encoder and the decoder

use crate::bits::ByteSink;
use crate::compress::CompressError;

#[cfg(feature = "alloc")]
extern crate alloc;

/// A caller-provided fixed buffer plus a write cursor
///
/// Never grows: running out of room is reported by whoever writes into it.
pub struct BufOutput<'a> {
    pub pos: usize,
    pub buf: &'a mut [u8],
}
impl<'a> From<&'a mut [u8]> for BufOutput<'a> {
    fn from(buf: &'a mut [u8]) -> Self {
        Self { pos: 0, buf }
    }
}
impl<'a> ByteSink for BufOutput<'a> {
    fn putc(&mut self, c: u8) -> Result<(), CompressError> {
        match self.buf.get_mut(self.pos) {
            Some(slot) => {
                *slot = c;
                self.pos += 1;
                Ok(())
            }
            None => Err(CompressError::OutputTooSmall),
        }
    }
}

/// A growable output
#[cfg(feature = "alloc")]
pub struct VecOutput {
    pub vec: alloc::vec::Vec<u8>,
}
#[cfg(feature = "alloc")]
impl From<alloc::vec::Vec<u8>> for VecOutput {
    fn from(vec: alloc::vec::Vec<u8>) -> Self {
        Self { vec }
    }
}
#[cfg(feature = "alloc")]
impl ByteSink for VecOutput {
    fn putc(&mut self, c: u8) -> Result<(), CompressError> {
        self.vec.push(c);
        Ok(())
    }
}
