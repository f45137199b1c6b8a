use core::fmt::{self};

use crate::bits::{BitReader, ByteSource};
use crate::tables::*;
use crate::util::*;

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

/// Decompression errors
///
/// Compressed text is generated at build time, so any of these at run time
/// means the stored table is corrupt or was built with different code tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecompressError {
    /// The input ended before the end-of-string code, possibly mid-code
    TruncatedInput,
    /// A back-reference or repeat reaches before the start of the output
    InvalidBackReference,
    /// The output buffer filled up before the end-of-string code
    ///
    /// The buffer has been filled with a valid prefix of the output.
    OutputTooSmall,
    /// More than the final byte's zero padding follows the end-of-string code
    TrailingData,
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompressError::TruncatedInput => write!(f, "input was truncated"),
            DecompressError::InvalidBackReference => write!(f, "invalid backreference"),
            DecompressError::OutputTooSmall => write!(f, "output buffer was insufficient"),
            DecompressError::TrailingData => write!(f, "data after end of string"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecompressError {}

/// Internal abstraction for the two different types of outputs
///
/// Note for both functions: we guarantee writing all the way up to the limit
trait OutputSink {
    /// Add the given literal bytes to the output
    ///
    /// If this would overflow the output, return Err.
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), DecompressError>;
    /// Add a backreference to the output
    ///
    /// A `disp` of 0 means the current position minus 1.
    /// Increasing `disp` means further backwards
    ///
    /// Copy `len` bytes, which may exceed `disp`.
    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), DecompressError>;
}

impl<'a> OutputSink for BufOutput<'a> {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), DecompressError> {
        let mut len = lits.len();
        let mut did_overflow = false;
        if self.pos + len > self.buf.len() {
            did_overflow = true;
            len = self.buf.len() - self.pos;
        }

        self.buf[self.pos..self.pos + len].copy_from_slice(&lits[..len]);
        self.pos += len;

        if did_overflow {
            Err(DecompressError::OutputTooSmall)
        } else {
            Ok(())
        }
    }

    fn put_backref(&mut self, disp: usize, mut len: usize) -> Result<(), DecompressError> {
        if disp + 1 > self.pos {
            return Err(DecompressError::InvalidBackReference);
        }

        let mut did_overflow = false;
        if self.pos + len > self.buf.len() {
            did_overflow = true;
            len = self.buf.len() - self.pos;
        }

        for i in 0..len {
            self.buf[self.pos + i] = self.buf[self.pos - disp - 1 + i];
        }
        self.pos += len;

        if did_overflow {
            Err(DecompressError::OutputTooSmall)
        } else {
            Ok(())
        }
    }
}

#[cfg(feature = "alloc")]
impl OutputSink for VecOutput {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), DecompressError> {
        self.vec.extend_from_slice(lits);
        Ok(())
    }

    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), DecompressError> {
        let pos = self.vec.len();
        if disp + 1 > pos {
            return Err(DecompressError::InvalidBackReference);
        }

        self.vec.reserve(len);
        for i in 0..len {
            let c = self.vec[pos - disp - 1 + i];
            self.vec.push(c);
        }

        Ok(())
    }
}

fn read_token<S: ByteSource + ?Sized>(
    table: &CodeTable,
    inp: &mut BitReader<S>,
) -> Result<Token, DecompressError> {
    table.decode_with(|| inp.bit())
}

fn decompress_impl<S: ByteSource + ?Sized>(
    inp: &S,
    outp: &mut impl OutputSink,
) -> Result<(), DecompressError> {
    // even the empty string carries an end code
    if inp.is_empty() {
        return Err(DecompressError::TruncatedInput);
    }

    let mut inp = BitReader::new(inp);
    let mut mode = Mode::Lower;
    let mut shift = None;

    loop {
        let active = table(shift.take().unwrap_or(mode));
        match read_token(active, &mut inp)? {
            Token::Lit(c) => outp.put_lits(&[c])?,
            Token::Raw => {
                let c = inp.bits(8)? as u8;
                outp.put_lits(&[c])?;
            }
            Token::Switch(m) => mode = m,
            Token::Shift(m) => shift = Some(m),
            Token::Repeat => {
                let count = inp.bits(REPEAT_BITS)? as usize + 1;
                outp.put_backref(0, count)?;
            }
            Token::BackRef => {
                let len = inp.bits(LEN_BITS)? as usize + MIN_MATCH;
                let dist = if inp.bit()? == 0 {
                    inp.bits(NEAR_BITS)? as usize + 1
                } else {
                    inp.bits(FAR_BITS)? as usize + NEAR_WINDOW + 1
                };
                outp.put_backref(dist - 1, len)?;
            }
            Token::End => return inp.finish(),
        }
    }
}

/// Decompress the input into a preallocated buffer
///
/// The whole of `inp` is the compressed data: its length is the declared
/// compressed size, and only the zero padding of its final byte may follow the
/// end-of-string code. `outp.len()` is the output capacity.
///
/// Returns the decompressed size on success. On error, `outp` holds a valid
/// prefix of the output (up to its full length for
/// [DecompressError::OutputTooSmall]) and nothing past its end is touched.
pub fn decompress_to_buf(inp: &[u8], outp: &mut [u8]) -> Result<usize, DecompressError> {
    decompress_from(inp, outp)
}

/// Decompress from any [ByteSource] into a preallocated buffer
///
/// Behaves exactly like [decompress_to_buf].
pub fn decompress_from<S: ByteSource + ?Sized>(
    inp: &S,
    outp: &mut [u8],
) -> Result<usize, DecompressError> {
    let mut outp: BufOutput = outp.into();
    decompress_impl(inp, &mut outp)?;
    Ok(outp.pos)
}

#[cfg(feature = "alloc")]
/// Decompress the input into a [Vec](alloc::vec::Vec)
///
/// Returns the result on success, or an error otherwise
pub fn decompress_to_vec(
    inp: &[u8],
    capacity_hint: Option<usize>,
) -> Result<alloc::vec::Vec<u8>, DecompressError> {
    let mut ret: VecOutput = if let Some(capacity_hint) = capacity_hint {
        alloc::vec::Vec::with_capacity(capacity_hint)
    } else {
        alloc::vec::Vec::new()
    }
    .into();
    decompress_impl(inp, &mut ret)?;
    Ok(ret.vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{BitSink, BitWriter};

    /// Hand-assemble a stream from (code or field, width) pairs
    fn assemble(parts: &[(u32, u32)], out: &mut [u8]) -> usize {
        let mut w = BitWriter::new(BufOutput::from(out));
        for &(v, n) in parts {
            w.put_bits(v, n).unwrap();
        }
        w.finish().unwrap().pos
    }

    fn code(mode: Mode, token: Token) -> (u32, u32) {
        let c = table(mode).code(token).unwrap();
        (c.bits as u32, c.len as u32)
    }

    /// "xyz" then an overlapping 6-byte copy from 2 back
    fn overlapping_stream(stream: &mut [u8]) -> usize {
        assemble(
            &[
                code(Mode::Lower, Token::Lit(b'x')),
                code(Mode::Lower, Token::Lit(b'y')),
                code(Mode::Lower, Token::Lit(b'z')),
                code(Mode::Lower, Token::BackRef),
                (6 - MIN_MATCH as u32, LEN_BITS),
                (0, 1),
                (2 - 1, NEAR_BITS),
                code(Mode::Lower, Token::End),
            ],
            stream,
        )
    }

    #[test]
    fn test_literals_up_to_capacity() {
        let mut stream = [0u8; 8];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Lit(b'o')),
                code(Mode::Lower, Token::Lit(b'k')),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );

        // exact fit
        let mut out = [0u8; 2];
        assert_eq!(decompress_to_buf(&stream[..len], &mut out), Ok(2));
        assert_eq!(out, *b"ok");

        // one short, the literal that fits is kept
        let mut out = [0u8; 1];
        assert_eq!(
            decompress_to_buf(&stream[..len], &mut out),
            Err(DecompressError::OutputTooSmall)
        );
        assert_eq!(out, *b"o");
    }

    #[test]
    fn test_overlapping_backref_up_to_capacity() {
        let mut stream = [0u8; 16];
        let len = overlapping_stream(&mut stream);

        let mut out = [0u8; 9];
        assert_eq!(decompress_to_buf(&stream[..len], &mut out), Ok(9));
        assert_eq!(out, *b"xyzyzyzyz");

        // the copy still runs up to the limit
        let mut out = [0u8; 8];
        assert_eq!(
            decompress_to_buf(&stream[..len], &mut out),
            Err(DecompressError::OutputTooSmall)
        );
        assert_eq!(out, *b"xyzyzyzy");
    }

    #[test]
    fn test_far_backref_copies() {
        let mut stream = [0u8; 32];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Lit(b'b')),
                code(Mode::Lower, Token::Lit(b'c')),
                code(Mode::Lower, Token::Lit(b'a')),
                code(Mode::Lower, Token::Repeat),
                (15, REPEAT_BITS),
                code(Mode::Lower, Token::Repeat),
                (15, REPEAT_BITS),
                code(Mode::Lower, Token::Repeat),
                (15, REPEAT_BITS),
                code(Mode::Lower, Token::Repeat),
                (15, REPEAT_BITS),
                // 67 bytes out so far, copy the first three
                code(Mode::Lower, Token::BackRef),
                (0, LEN_BITS),
                (1, 1),
                ((67 - NEAR_WINDOW - 1) as u32, FAR_BITS),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );

        let mut expected = [b'a'; 70];
        expected[..2].copy_from_slice(b"bc");
        expected[67..].copy_from_slice(b"bca");

        let mut out = [0u8; 80];
        let n = decompress_to_buf(&stream[..len], &mut out).unwrap();
        assert_eq!(&out[..n], expected);
    }

    #[test]
    fn test_empty_string() {
        // just the lower-table end code, padded
        let mut out = [0u8; 4];
        assert_eq!(decompress_to_buf(&[0xff, 0xc0], &mut out), Ok(0));
        assert_eq!(decompress_to_buf(&[0xff, 0xc0], &mut []), Ok(0));
    }

    #[test]
    fn test_literals_and_modes() {
        let mut stream = [0u8; 16];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Shift(Mode::Upper)),
                code(Mode::Upper, Token::Lit(b'H')),
                code(Mode::Lower, Token::Lit(b'i')),
                code(Mode::Lower, Token::Switch(Mode::Sym)),
                code(Mode::Sym, Token::Lit(b'4')),
                code(Mode::Sym, Token::Lit(b'2')),
                code(Mode::Sym, Token::Raw),
                (0xe9, 8),
                code(Mode::Sym, Token::End),
            ],
            &mut stream,
        );

        let mut out = [0u8; 8];
        let n = decompress_to_buf(&stream[..len], &mut out).unwrap();
        assert_eq!(&out[..n], b"Hi42\xe9");
    }

    #[test]
    fn test_backref_and_repeat() {
        let mut stream = [0u8; 16];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Lit(b'a')),
                code(Mode::Lower, Token::Lit(b'b')),
                // 5 bytes from 2 back, overlapping itself
                code(Mode::Lower, Token::BackRef),
                (5 - MIN_MATCH as u32, LEN_BITS),
                (0, 1),
                (2 - 1, NEAR_BITS),
                code(Mode::Lower, Token::Repeat),
                (3 - 1, REPEAT_BITS),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );

        let mut out = [0u8; 16];
        let n = decompress_to_buf(&stream[..len], &mut out).unwrap();
        assert_eq!(&out[..n], b"abababaaaa");
    }

    #[test]
    fn test_far_backref() {
        let mut stream = [0u8; 16];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Lit(b'x')),
                code(Mode::Lower, Token::BackRef),
                (0, LEN_BITS),
                (1, 1),
                (0, FAR_BITS),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );

        // the smallest far distance is one past the near window
        let mut out = [0u8; 16];
        assert_eq!(
            decompress_to_buf(&stream[..len], &mut out),
            Err(DecompressError::InvalidBackReference)
        );
        assert_eq!(out[0], b'x');
    }

    #[test]
    fn test_invalid_backref() {
        let mut stream = [0u8; 16];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Repeat),
                (0, REPEAT_BITS),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );
        let mut out = [0u8; 16];
        assert_eq!(
            decompress_to_buf(&stream[..len], &mut out),
            Err(DecompressError::InvalidBackReference)
        );
    }

    #[test]
    fn test_output_too_small() {
        let mut stream = [0u8; 16];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Lit(b'a')),
                code(Mode::Lower, Token::Repeat),
                (15, REPEAT_BITS),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );

        let mut out = [0u8; 6];
        assert_eq!(
            decompress_to_buf(&stream[..len], &mut out),
            Err(DecompressError::OutputTooSmall)
        );
        assert_eq!(out, *b"aaaaaa");
    }

    #[test]
    fn test_truncated() {
        // empty input
        assert_eq!(
            decompress_to_buf(&[], &mut [0u8; 4]),
            Err(DecompressError::TruncatedInput)
        );
        // 'a' then nothing, no end code
        assert_eq!(
            decompress_to_buf(&[0x00], &mut [0u8; 4]),
            Err(DecompressError::TruncatedInput)
        );
        // end code cut short
        assert_eq!(
            decompress_to_buf(&[0xff], &mut [0u8; 4]),
            Err(DecompressError::TruncatedInput)
        );
    }

    #[test]
    fn test_trailing_data() {
        assert_eq!(
            decompress_to_buf(&[0xff, 0xc0, 0x00], &mut [0u8; 4]),
            Err(DecompressError::TrailingData)
        );
        assert_eq!(
            decompress_to_buf(&[0xff, 0xc1], &mut [0u8; 4]),
            Err(DecompressError::TrailingData)
        );
    }

    #[test]
    fn test_bounded_output_on_garbage() {
        // whatever the stream says, nothing past the buffer is written
        let mut seed = 0x2545_f491_4f6c_dd1du64;
        for _ in 0..500 {
            let mut junk = [0u8; 24];
            for b in junk.iter_mut() {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                *b = seed as u8;
            }
            let mut out = [0u8; 40];
            let (head, guard) = out.split_at_mut(32);
            let res = decompress_to_buf(&junk, head);
            if let Ok(n) = res {
                assert!(n <= 32);
            }
            assert_eq!(guard, [0u8; 8]);
        }
    }

    struct Flash<'a>(&'a [u8]);
    impl<'a> ByteSource for Flash<'a> {
        fn len(&self) -> usize {
            self.0.len()
        }
        fn byte_at(&self, index: usize) -> u8 {
            self.0[index]
        }
    }

    #[test]
    fn test_custom_source() {
        let mut out = [0u8; 4];
        assert_eq!(decompress_from(&Flash(&[0xff, 0xc0]), &mut out), Ok(0));
        assert_eq!(
            decompress_from(&Flash(&[]), &mut out),
            Err(DecompressError::TruncatedInput)
        );
        assert_eq!(
            decompress_from(&Flash(&[0xff]), &mut out),
            Err(DecompressError::TruncatedInput)
        );
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn test_to_vec() {
        let mut stream = [0u8; 16];
        let len = assemble(
            &[
                code(Mode::Lower, Token::Lit(b'a')),
                code(Mode::Lower, Token::Repeat),
                (15, REPEAT_BITS),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );
        let v = decompress_to_vec(&stream[..len], None).unwrap();
        assert_eq!(v, [b'a'; 17]);
        let v = decompress_to_vec(&stream[..len], Some(17)).unwrap();
        assert_eq!(v.len(), 17);

        let len = overlapping_stream(&mut stream);
        let v = decompress_to_vec(&stream[..len], Some(4)).unwrap();
        assert_eq!(v, b"xyzyzyzyz");

        // repeat with nothing before it
        let len = assemble(
            &[
                code(Mode::Lower, Token::Repeat),
                (0, REPEAT_BITS),
                code(Mode::Lower, Token::End),
            ],
            &mut stream,
        );
        assert_eq!(
            decompress_to_vec(&stream[..len], None),
            Err(DecompressError::InvalidBackReference)
        );
    }
}
