//! Compressed text stored as a constant, and the accessors that expand it

use core::fmt;
use core::str;

#[cfg(feature = "alloc")]
use crate::compress::{CompressError, CompressionLevel};
use crate::decompress::{decompress_to_buf, DecompressError};

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

/// Errors expanding a [CompressedBlob]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BlobError {
    Decompress(DecompressError),
    /// Decoding succeeded but produced a different length than was stored
    LengthMismatch { expected: usize, actual: usize },
    /// The decoded bytes are not UTF-8
    NotUtf8,
}
impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::Decompress(e) => write!(f, "{}", e),
            BlobError::LengthMismatch { expected, actual } => write!(
                f,
                "decoded {} bytes, expected {}",
                actual, expected
            ),
            BlobError::NotUtf8 => write!(f, "decoded text is not UTF-8"),
        }
    }
}
#[cfg(feature = "std")]
impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobError::Decompress(e) => Some(e),
            _ => None,
        }
    }
}
impl From<DecompressError> for BlobError {
    fn from(e: DecompressError) -> Self {
        BlobError::Decompress(e)
    }
}

/// A compressed string as it is persisted: the compressed bytes and the
/// length of the text they expand to
///
/// The length of `bytes` is the declared compressed size; the decoder needs it
/// because the last byte carries padding after the end-of-string code.
/// `decoded_len` sizes the output buffer.
///
/// ```
/// use htmlz_rs::CompressedBlob;
///
/// const GREETING: CompressedBlob = CompressedBlob::new(&[0xcc, 0x5a, 0xd7, 0x7f, 0xe0], 5);
///
/// let mut buf = [0u8; GREETING.decoded_len()];
/// assert_eq!(GREETING.decompress_str(&mut buf), Ok("hello"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedBlob<'a> {
    bytes: &'a [u8],
    decoded_len: usize,
}

impl<'a> CompressedBlob<'a> {
    pub const fn new(bytes: &'a [u8], decoded_len: usize) -> Self {
        Self { bytes, decoded_len }
    }

    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub const fn compressed_len(&self) -> usize {
        self.bytes.len()
    }

    pub const fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Expand into `outp`, returning the number of bytes written
    ///
    /// Fails unless exactly `decoded_len` bytes come out.
    pub fn decompress_to_buf(&self, outp: &mut [u8]) -> Result<usize, BlobError> {
        let n = decompress_to_buf(self.bytes, outp)?;
        if n != self.decoded_len {
            return Err(BlobError::LengthMismatch {
                expected: self.decoded_len,
                actual: n,
            });
        }
        Ok(n)
    }

    /// Expand into `outp` and borrow the result as text
    pub fn decompress_str<'b>(&self, outp: &'b mut [u8]) -> Result<&'b str, BlobError> {
        let n = self.decompress_to_buf(outp)?;
        str::from_utf8(&outp[..n]).map_err(|_| BlobError::NotUtf8)
    }

    #[cfg(feature = "alloc")]
    /// Expand into a freshly allocated [String](alloc::string::String)
    pub fn decompress_to_string(&self) -> Result<alloc::string::String, BlobError> {
        let mut buf = alloc::vec![0u8; self.decoded_len];
        self.decompress_to_buf(&mut buf)?;
        alloc::string::String::from_utf8(buf).map_err(|_| BlobError::NotUtf8)
    }

    #[cfg(feature = "alloc")]
    /// Expand for immediate use, e.g. as a response body
    ///
    /// A blob is build-time data, so failing to expand one is a build bug.
    /// Rather than hand out garbage this returns a marker comment that names
    /// the failure, and logs it when `std` is enabled.
    pub fn expand(&self) -> alloc::string::String {
        match self.decompress_to_string() {
            Ok(s) => s,
            Err(e) => {
                #[cfg(feature = "std")]
                tracing::error!(
                    error = %e,
                    compressed_len = self.compressed_len(),
                    decoded_len = self.decoded_len,
                    "corrupt compressed text"
                );
                alloc::format!("<!-- htmlz: corrupt compressed text: {} -->", e)
            }
        }
    }
}

/// A freshly compressed blob, before it is baked into a constant
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedBlob {
    pub bytes: alloc::vec::Vec<u8>,
    pub decoded_len: usize,
}

#[cfg(feature = "alloc")]
impl OwnedBlob {
    pub fn compress(text: &str, level: CompressionLevel) -> Result<Self, CompressError> {
        let bytes = crate::compress::compress_to_vec(text.as_bytes(), level)?;
        Ok(Self {
            bytes,
            decoded_len: text.len(),
        })
    }

    pub fn as_blob(&self) -> CompressedBlob<'_> {
        CompressedBlob::new(&self.bytes, self.decoded_len)
    }
}
