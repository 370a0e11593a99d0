//! Compress and decompress single archive entries.

use crate::bit_stream::{BitReader, BitWriter};
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::frequency::FrequencyTable;
use crate::header::{validate_name, EntryHeader};
use crate::huffman::{Alphabet, HuffmanTree};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind, Read, Write};

const READ_CHUNK: usize = 8 * 1024;

/// Decoded bytes gathered before each write to the sink.
const WRITE_CHUNK: usize = 8 * 1024;

/// Sizes of one entry, as written or as read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStats {
    pub name: String,
    /// Bytes before compression.
    pub original_len: u64,
    /// Distinct symbols, i.e. header records.
    pub leaf_count: usize,
    pub header_len: u64,
    /// Bits of packed codewords, padding excluded.
    pub encoded_bits: u64,
    /// Bytes of packed body, padding included.
    pub body_len: u64,
}

impl EntryStats {
    /// Bytes the entry occupies in the archive.
    pub fn archived_len(&self) -> u64 {
        self.header_len + self.body_len
    }

    /// Archived size over original size; 0 for an empty entry.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_len == 0 {
            return 0.0;
        }
        self.archived_len() as f64 / self.original_len as f64
    }
}

/// Compress `data` into a single-entry archive.
pub fn compress(data: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = Vec::new();
    encode_entry(data, name, &mut archive, &ArchiveConfig::default())?;
    Ok(archive)
}

/// Decompress the first entry of `archive`, returning its bytes and name.
pub fn decompress(archive: &[u8]) -> Result<(Vec<u8>, String)> {
    let config = ArchiveConfig::default();
    let mut source = archive;
    let header = EntryHeader::read_from(&mut source, &config)?
        .ok_or_else(|| ArchiveError::corrupt("archive contains no entry"))?;
    let mut data = output_buffer(&header)?;
    let stats = decode_entry(&header, &mut source, &mut data, &config)?;
    Ok((data, stats.name))
}

/// An empty buffer with room for every byte the entry decodes to.
pub fn output_buffer(header: &EntryHeader) -> Result<Vec<u8>> {
    let size = header.total_symbols()?;
    let mut buffer = Vec::new();
    usize::try_from(size)
        .ok()
        .and_then(|len| buffer.try_reserve_exact(len).ok())
        .ok_or(ArchiveError::OutOfMemory { size })?;
    Ok(buffer)
}

/// Write the header and packed body of `data` to `sink`.
pub fn encode_entry<W: Write>(
    data: &[u8],
    name: &str,
    sink: &mut W,
    config: &ArchiveConfig,
) -> Result<EntryStats> {
    let frequencies = FrequencyTable::from_bytes(data);
    encode_stream(&frequencies, data, name, sink, config)
}

/// Write one entry whose bytes have already been counted into `frequencies`.
///
/// `input` must yield exactly the counted bytes; anything else fails with an
/// I/O error of kind `InvalidData`.
pub fn encode_stream<R: Read, W: Write>(
    frequencies: &FrequencyTable,
    mut input: R,
    name: &str,
    sink: &mut W,
    config: &ArchiveConfig,
) -> Result<EntryStats> {
    validate_name(name, config.max_name_len)?;
    let tree = HuffmanTree::build(frequencies);
    let alphabet = tree.as_ref().map(HuffmanTree::alphabet);
    let header = EntryHeader::from_parts(frequencies, alphabet.as_ref(), name);
    let header_len = header.write_to(sink)?;

    let mut writer = BitWriter::new(&mut *sink);
    let mut consumed = 0u64;
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        for &byte in &buf[..n] {
            let codeword = alphabet
                .as_ref()
                .and_then(|alphabet| alphabet.get(byte))
                .ok_or_else(input_changed)?;
            writer.write_codeword(&codeword)?;
        }
        consumed += n as u64;
    }
    if consumed != frequencies.total() {
        return Err(input_changed().into());
    }

    let encoded_bits = writer.bits_written();
    let (_, body_len) = writer.finish()?;
    let stats = EntryStats {
        name: name.to_string(),
        original_len: consumed,
        leaf_count: header.leaf_count(),
        header_len,
        encoded_bits,
        body_len,
    };
    debug!(
        "wrote entry {:?}: {} bytes -> {} header + {} body bytes, {} symbols",
        stats.name, stats.original_len, stats.header_len, stats.body_len, stats.leaf_count
    );
    Ok(stats)
}

/// Read the body that follows `header` from `source` and write the decoded
/// bytes to `sink`.
///
/// Exactly `ceil(encoded bits / 8)` bytes are taken from `source`, so the
/// next entry's header is left unread.
pub fn decode_entry<R: Read, W: Write>(
    header: &EntryHeader,
    source: &mut R,
    sink: &mut W,
    config: &ArchiveConfig,
) -> Result<EntryStats> {
    let frequencies = header.frequencies()?;
    let tree = HuffmanTree::build(&frequencies);
    let alphabet = tree.as_ref().map(HuffmanTree::alphabet);
    if config.verify_codewords {
        verify_codewords(header, alphabet.as_ref())?;
    }

    let encoded_bits = alphabet
        .as_ref()
        .map_or(0, |alphabet| alphabet.encoded_bits(&frequencies));
    let encoded_bits = u64::try_from(encoded_bits)
        .map_err(|_| ArchiveError::corrupt("encoded body length overflows 64 bits"))?;
    let body_len = encoded_bits.div_ceil(8);

    let symbols = frequencies.total();
    if let Some(tree) = &tree {
        decode_body(tree, &mut *source, body_len, symbols, config.strict_padding, sink)?;
    }

    // Canonical length; a legacy header with unpadded codewords is shorter.
    let header_len = header.write_to(&mut io::sink())?;
    let stats = EntryStats {
        name: header.file_name.clone(),
        original_len: symbols,
        leaf_count: header.leaf_count(),
        header_len,
        encoded_bits,
        body_len,
    };
    debug!(
        "read entry {:?}: {} body bytes -> {} bytes",
        stats.name, stats.body_len, stats.original_len
    );
    Ok(stats)
}

/// Decode exactly `count` symbols from the next `body_len` bytes of `body`
/// and write them to `sink`.
///
/// The body is read and the output written in fixed-size chunks. Bits after
/// the last symbol are padding and are never decoded. On error, bytes decoded
/// so far may already have reached `sink`.
pub fn decode_body<R: Read, W: Write>(
    tree: &HuffmanTree,
    body: R,
    body_len: u64,
    count: u64,
    strict_padding: bool,
    sink: &mut W,
) -> Result<()> {
    let mut body = body.take(body_len);
    let mut chunk = [0u8; READ_CHUNK];
    let mut output = Vec::with_capacity(WRITE_CHUNK);
    let mut decoder = tree.decoder();
    let mut decoded = 0u64;
    let mut found = 0u64;
    loop {
        let n = read_chunk(&mut body, &mut chunk)?;
        found += n as u64;
        let mut reader = BitReader::new(&chunk[..n]);
        while decoded < count {
            let Some(symbol) = decoder.next_symbol(&mut reader) else {
                break;
            };
            output.push(symbol);
            decoded += 1;
            if output.len() == WRITE_CHUNK {
                sink.write_all(&output)?;
                output.clear();
            }
        }
        if decoded == count && strict_padding && !reader.remaining_bits_are_zero() {
            return Err(ArchiveError::corrupt("nonzero padding after the last symbol"));
        }
        if n == 0 {
            break;
        }
    }

    if found < body_len {
        return Err(ArchiveError::PrematureEnd {
            expected: body_len,
            found,
        });
    }
    if decoded < count {
        return Err(ArchiveError::UnreachableCode {
            decoded,
            expected: count,
        });
    }
    sink.write_all(&output)?;
    Ok(())
}

/// Check every recorded codeword against the tree rebuilt from the weights.
fn verify_codewords(header: &EntryHeader, alphabet: Option<&Alphabet>) -> Result<()> {
    for record in &header.records {
        let expected = alphabet.and_then(|alphabet| alphabet.get(record.symbol));
        if expected != Some(record.codeword) {
            return Err(ArchiveError::corrupt(format!(
                "codeword {} ({} bits) recorded for symbol 0x{:02x} does not match its weights",
                record.codeword,
                record.codeword.len(),
                record.symbol
            )));
        }
    }
    Ok(())
}

fn read_chunk<R: Read>(source: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(chunk) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn input_changed() -> io::Error {
    io::Error::new(
        ErrorKind::InvalidData,
        "input changed between counting and encoding",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abab_archive_bytes() {
        let archive = compress(b"ABAB A", "abab.txt").unwrap();
        // A=0 B=10 ' '=11: 0 10 0 10 11 0 -> 01001011 0(0000000)
        let mut expected = b"3\n  1 11 2\nA 3 0 1\nB 2 10 2\n\nabab.txt\n".to_vec();
        expected.extend_from_slice(&[0b0100_1011, 0b0000_0000]);
        assert_eq!(archive, expected);
    }

    #[test]
    fn test_roundtrip_small_inputs() {
        let inputs: [&[u8]; 5] = [b"", b"a", b"aaaa", b"ABAB A", b"\n\n\n\n x"];
        for input in inputs {
            let archive = compress(input, "entry").unwrap();
            let (data, name) = decompress(&archive).unwrap();
            assert_eq!(data, input);
            assert_eq!(name, "entry");
        }
    }

    #[test]
    fn test_single_symbol_has_no_body() {
        let archive = compress(b"aaaa", "a.txt").unwrap();
        assert_eq!(archive, b"1\na 4 0 0\n\na.txt\n".to_vec());
        assert_eq!(decompress(&archive).unwrap().0, b"aaaa".to_vec());
    }

    #[test]
    fn test_full_alphabet_roundtrip() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 256) as u8).collect();
        let archive = compress(&data, "bin").unwrap();
        assert_eq!(decompress(&archive).unwrap().0, data);
    }

    #[test]
    fn test_stats() {
        let mut sink = Vec::new();
        let stats =
            encode_entry(b"ABAB A", "abab.txt", &mut sink, &ArchiveConfig::default()).unwrap();
        assert_eq!(stats.original_len, 6);
        assert_eq!(stats.leaf_count, 3);
        assert_eq!(stats.encoded_bits, 9);
        assert_eq!(stats.body_len, 2);
        assert_eq!(stats.archived_len(), sink.len() as u64);
        // A six byte input cannot pay for its header.
        assert!(stats.compression_ratio() > 1.0);
        let json = serde_json::to_string(&stats).unwrap();
        let back: EntryStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }

    #[test]
    fn test_truncated_body_is_premature_end() {
        let mut archive = compress(b"ABAB A", "abab.txt").unwrap();
        archive.pop();
        let err = decompress(&archive).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::PrematureEnd {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_nonzero_padding_rejected() {
        let mut archive = compress(b"ABAB A", "abab.txt").unwrap();
        *archive.last_mut().unwrap() |= 0b0000_0001;
        assert!(decompress(&archive).unwrap_err().is_corruption());

        // Lenient readers ignore it.
        let mut source = &archive[..];
        let config = ArchiveConfig::lenient();
        let header = EntryHeader::read_from(&mut source, &config).unwrap().unwrap();
        let mut data = Vec::new();
        decode_entry(&header, &mut source, &mut data, &config).unwrap();
        assert_eq!(data, b"ABAB A".to_vec());
    }

    #[test]
    fn test_mismatched_codeword_rejected() {
        let mut archive = b"2\nx 1 0 1\ny 1 1 1\n\nxy\n".to_vec();
        archive.push(0b0100_0000);
        // Equal weights put the later symbol on the 0 branch.
        let err = decompress(&archive).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupt { .. }));

        let mut archive = b"2\nx 1 1 1\ny 1 0 1\n\nxy\n".to_vec();
        archive.push(0b1000_0000);
        assert_eq!(decompress(&archive).unwrap(), (b"xy".to_vec(), "xy".to_string()));
    }

    #[test]
    fn test_unreachable_code() {
        let tree = HuffmanTree::build(&FrequencyTable::from_bytes(b"ABAB A")).unwrap();
        let mut out = Vec::new();
        let err = decode_body(&tree, &[0b0100_1011][..], 1, 6, true, &mut out).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::UnreachableCode {
                decoded: 5,
                expected: 6
            }
        ));
    }

    #[test]
    fn test_decode_stops_at_symbol_count() {
        let tree = HuffmanTree::build(&FrequencyTable::from_bytes(b"ABAB A")).unwrap();
        // Trailing zero bits would decode as more 'A's.
        let mut out = Vec::new();
        decode_body(&tree, &[0b0100_1011, 0b0000_0000][..], 2, 6, true, &mut out).unwrap();
        assert_eq!(out, b"ABAB A".to_vec());
    }

    /// Counts bytes and remembers the largest single write.
    #[derive(Default)]
    struct CountingSink {
        total: u64,
        largest_write: usize,
    }

    impl Write for CountingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.total += buf.len() as u64;
            self.largest_write = self.largest_write.max(buf.len());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_decode_writes_in_chunks() {
        // A single-symbol entry has no body, so nothing but the weight bounds
        // its output.
        let archive = b"1\na 5000000 0 0\n\nbig\n";
        let config = ArchiveConfig::default();
        let mut source = &archive[..];
        let header = EntryHeader::read_from(&mut source, &config).unwrap().unwrap();
        let mut sink = CountingSink::default();
        let stats = decode_entry(&header, &mut source, &mut sink, &config).unwrap();
        assert_eq!(stats.original_len, 5_000_000);
        assert_eq!(sink.total, 5_000_000);
        assert!(sink.largest_write <= WRITE_CHUNK);
    }

    #[test]
    fn test_body_spanning_many_chunks() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 7 * 40) as u8).collect();
        let archive = compress(&data, "chunks").unwrap();
        let config = ArchiveConfig::default();
        let mut source = &archive[..];
        let header = EntryHeader::read_from(&mut source, &config).unwrap().unwrap();
        let mut sink = CountingSink::default();
        let stats = decode_entry(&header, &mut source, &mut sink, &config).unwrap();
        assert!(stats.body_len > 3 * READ_CHUNK as u64);
        assert_eq!(sink.total, data.len() as u64);
        assert!(sink.largest_write <= WRITE_CHUNK);
        assert!(source.is_empty());
        assert_eq!(decompress(&archive).unwrap().0, data);
    }

    #[test]
    fn test_huge_declared_count_is_out_of_memory() {
        let archive = format!("1\na {} 0 0\n\nbig\n", u64::MAX);
        let err = decompress(archive.as_bytes()).unwrap_err();
        assert!(matches!(err, ArchiveError::OutOfMemory { .. }));
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(
            compress(b"data", "").unwrap_err(),
            ArchiveError::InvalidName { .. }
        ));
        assert!(matches!(
            compress(b"data", "a\nb").unwrap_err(),
            ArchiveError::InvalidName { .. }
        ));
    }

    #[test]
    fn test_input_changed_between_passes() {
        let frequencies = FrequencyTable::from_bytes(b"abc");
        let mut sink = Vec::new();
        let err = encode_stream(
            &frequencies,
            &b"abcd"[..],
            "x",
            &mut sink,
            &ArchiveConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::Io(ref e) if e.kind() == ErrorKind::InvalidData));
    }

    #[test]
    fn test_empty_archive() {
        assert!(decompress(b"").unwrap_err().is_corruption());
    }
}
