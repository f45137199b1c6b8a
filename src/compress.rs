use core::convert::Infallible;
use core::fmt;

use crate::bits::{BitCounter, BitSink, BitWriter};
use crate::tables::*;
use crate::util::*;

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

/// Compression errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompressError {
    /// The output buffer was too small to hold all the output.
    ///
    /// The output that has been written *is* valid, but has been truncated.
    OutputTooSmall,
}
impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressError::OutputTooSmall => write!(f, "output buffer was insufficient"),
        }
    }
}
#[cfg(feature = "std")]
impl std::error::Error for CompressError {}

/// Compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Literals plus back-references and repeats
    #[default]
    Full,
    /// Table codes only, no back-references or repeats
    ///
    /// Mostly useful to see how much the back-references are buying.
    LiteralsOnly,
}

/// Emits tokens, tracking which table is active
struct CodeWriter<B> {
    sink: B,
    mode: Mode,
}

impl<B: BitSink> CodeWriter<B> {
    fn new(sink: B, mode: Mode) -> Self {
        Self { sink, mode }
    }

    fn put_code(&mut self, code: Code) -> Result<(), B::Error> {
        self.sink.put_bits(code.bits as u32, code.len as u32)
    }

    fn put_control(&mut self, mode: Mode, token: Token) -> Result<(), B::Error> {
        self.put_code(table(mode).control(token))
    }

    /// Emit one byte, changing tables if the active one lacks it
    ///
    /// `next` is the byte after this one, used to decide between switching
    /// for good and shifting for a single byte.
    fn put_literal(&mut self, c: u8, next: Option<u8>) -> Result<(), B::Error> {
        let active = table(self.mode);
        if let Some(code) = active.literal(c) {
            return self.put_code(code);
        }

        match find_literal(c) {
            None => {
                self.put_control(self.mode, Token::Raw)?;
                self.sink.put_bits(c as u32, 8)
            }
            Some((home, code)) => {
                let stay = next.map_or(false, |n| {
                    !active.has_literal(n) && table(home).has_literal(n)
                });
                if stay {
                    self.put_control(self.mode, Token::Switch(home))?;
                    self.mode = home;
                } else {
                    self.put_control(self.mode, Token::Shift(home))?;
                }
                self.put_code(code)
            }
        }
    }

    fn put_backref(&mut self, dist: usize, len: usize) -> Result<(), B::Error> {
        debug_assert!((1..=MAX_DISTANCE).contains(&dist));
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len));

        self.put_control(self.mode, Token::BackRef)?;
        self.sink.put_bits((len - MIN_MATCH) as u32, LEN_BITS)?;
        if dist <= NEAR_WINDOW {
            self.sink.put_bits(0, 1)?;
            self.sink.put_bits((dist - 1) as u32, NEAR_BITS)
        } else {
            self.sink.put_bits(1, 1)?;
            self.sink.put_bits((dist - NEAR_WINDOW - 1) as u32, FAR_BITS)
        }
    }

    fn put_repeat(&mut self, count: usize) -> Result<(), B::Error> {
        debug_assert!((1..=MAX_REPEAT).contains(&count));

        self.put_control(self.mode, Token::Repeat)?;
        self.sink.put_bits((count - 1) as u32, REPEAT_BITS)
    }

    fn finish(mut self) -> Result<B, B::Error> {
        self.put_control(self.mode, Token::End)?;
        Ok(self.sink)
    }
}

fn infallible<T>(r: Result<T, Infallible>) -> T {
    match r {
        Ok(v) => v,
        Err(e) => match e {},
    }
}

/// Bits needed to send `inp[start..end]` as literals starting in `mode`
fn literal_cost(inp: &[u8], start: usize, end: usize, mode: Mode) -> usize {
    let mut w = CodeWriter::new(BitCounter::default(), mode);
    for pos in start..end {
        infallible(w.put_literal(inp[pos], inp.get(pos + 1).copied()));
    }
    w.sink.0
}

/// Longest earlier occurrence of the bytes at `pos`, as (distance, length)
///
/// Inputs are small, so this just scans the window. The nearest of equally
/// long matches wins since it may fit the short distance form.
fn longest_match(inp: &[u8], pos: usize) -> Option<(usize, usize)> {
    let max_len = usize::min(MAX_MATCH, inp.len() - pos);
    if max_len < MIN_MATCH {
        return None;
    }

    let mut best = None;
    let mut best_len = MIN_MATCH - 1;
    for dist in 1..=usize::min(pos, MAX_DISTANCE) {
        let len = (0..max_len)
            .take_while(|&i| inp[pos + i] == inp[pos + i - dist])
            .count();
        if len > best_len {
            best = Some((dist, len));
            best_len = len;
            if len == max_len {
                break;
            }
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reuse {
    Repeat(usize),
    BackRef { dist: usize, len: usize },
}

/// The repeat or back-reference at `pos` saving the most bits over literals
fn best_reuse(inp: &[u8], pos: usize, mode: Mode) -> Option<Reuse> {
    let active = table(mode);
    let mut best: Option<(usize, Reuse)> = None;

    if let Some(&prev) = pos.checked_sub(1).and_then(|p| inp.get(p)) {
        let run = inp[pos..]
            .iter()
            .take(MAX_REPEAT)
            .take_while(|&&c| c == prev)
            .count();
        if run > 0 {
            let cost = active.control(Token::Repeat).len as usize + REPEAT_BITS as usize;
            let lits = literal_cost(inp, pos, pos + run, mode);
            if lits > cost {
                best = Some((lits - cost, Reuse::Repeat(run)));
            }
        }
    }

    if let Some((dist, len)) = longest_match(inp, pos) {
        let dist_bits = if dist <= NEAR_WINDOW {
            NEAR_BITS
        } else {
            FAR_BITS
        };
        let cost = active.control(Token::BackRef).len as usize
            + (LEN_BITS + 1 + dist_bits) as usize;
        let lits = literal_cost(inp, pos, pos + len, mode);
        if lits > cost && best.map_or(true, |(saved, _)| lits - cost >= saved) {
            best = Some((lits - cost, Reuse::BackRef { dist, len }));
        }
    }

    best.map(|(_, reuse)| reuse)
}

fn compress_impl<B: BitSink>(
    inp: &[u8],
    sink: B,
    level: CompressionLevel,
) -> Result<B, B::Error> {
    let mut w = CodeWriter::new(sink, Mode::Lower);
    let mut pos = 0;

    while pos < inp.len() {
        let reuse = match level {
            CompressionLevel::Full => best_reuse(inp, pos, w.mode),
            CompressionLevel::LiteralsOnly => None,
        };

        match reuse {
            Some(Reuse::Repeat(count)) => {
                w.put_repeat(count)?;
                pos += count;
            }
            Some(Reuse::BackRef { dist, len }) => {
                w.put_backref(dist, len)?;
                pos += len;
            }
            None => {
                w.put_literal(inp[pos], inp.get(pos + 1).copied())?;
                pos += 1;
            }
        }
    }

    w.finish()
}

/// Size in bits of the compressed stream, before padding to a whole byte
pub fn compressed_bits(inp: &[u8], level: CompressionLevel) -> usize {
    infallible(compress_impl(inp, BitCounter::default(), level)).0
}

/// Compress the input into a preallocated buffer
///
/// Returns the compressed size on success, or an error otherwise.
/// The same input and level always produce the same bytes.
pub fn compress_to_buf(
    inp: &[u8],
    outp: &mut [u8],
    level: CompressionLevel,
) -> Result<usize, CompressError> {
    let w = BitWriter::new(BufOutput::from(outp));
    let outp = compress_impl(inp, w, level)?.finish()?;
    Ok(outp.pos)
}

#[cfg(feature = "alloc")]
/// Compress the input into a [Vec](alloc::vec::Vec)
///
/// Returns the result on success, or an error otherwise
pub fn compress_to_vec(
    inp: &[u8],
    level: CompressionLevel,
) -> Result<alloc::vec::Vec<u8>, CompressError> {
    let w = BitWriter::new(VecOutput::from(alloc::vec::Vec::new()));
    let ret = compress_impl(inp, w, level)?.finish()?;

    #[cfg(feature = "std")]
    tracing::debug!(
        input_len = inp.len(),
        compressed_len = ret.vec.len(),
        ?level,
        "compressed text"
    );

    Ok(ret.vec)
}
