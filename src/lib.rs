//! # Byte-oriented Huffman archives
//! This library compresses files into a simple archive format made of entries.
//! Each entry is a short text header (the weight of every byte value that
//! occurs, its codeword, and the file name) followed by the codewords packed
//! MSB-first into bytes.
//!
//! The Huffman tree itself is never written. The reader rebuilds it from the
//! recorded weights with the same deterministic merge order as the writer, and
//! decodes exactly as many symbols as the weights add up to, ignoring padding.
//!
//! ```
//! use huffpack::archive::{read_all, ArchiveWriter};
//!
//! let mut writer = ArchiveWriter::new(Vec::new());
//! writer.add_bytes("notes.txt", b"ABAB A")?;
//! writer.add_bytes("empty.txt", b"")?;
//! let archive = writer.finish()?;
//!
//! let entries = read_all(&archive)?;
//! assert_eq!(entries[0].data, b"ABAB A");
//! assert_eq!(entries[1].name, "empty.txt");
//! # Ok::<(), huffpack::ArchiveError>(())
//! ```
pub mod archive;

pub mod bit_stream;

pub mod codec;

pub mod config;

pub mod error;

pub mod frequency;

pub mod header;

pub mod huffman;

pub use archive::{ArchiveReader, ArchiveWriter, Entry};
pub use codec::{compress, decompress, EntryStats};
pub use config::ArchiveConfig;
pub use error::{ArchiveError, Result};
pub use frequency::FrequencyTable;
pub use huffman::{Alphabet, Codeword, HuffmanTree};
