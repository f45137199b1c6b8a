#![no_std]

//! A small codec for short HTML/JS text kept in read-only memory
//!
//! Text is coded with three fixed prefix-code tables (lowercase, uppercase,
//! digits and symbols) plus short back-references into what has already been
//! decoded. Nothing is transmitted besides the codes themselves, which is what
//! makes it worthwhile for strings of a few hundred bytes. Decoding needs no
//! allocation beyond the caller's output buffer.

mod bits;
mod blob;
mod compress;
mod decompress;
pub mod tables;
mod util;

pub use bits::ByteSource;
#[cfg(feature = "alloc")]
pub use blob::OwnedBlob;
pub use blob::{BlobError, CompressedBlob};
#[cfg(feature = "alloc")]
pub use compress::compress_to_vec;
pub use compress::{compress_to_buf, compressed_bits, CompressError, CompressionLevel};
#[cfg(feature = "alloc")]
pub use decompress::decompress_to_vec;
pub use decompress::{decompress_from, decompress_to_buf, DecompressError};
pub use tables::{verify_tables, TableError};
