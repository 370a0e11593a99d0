//! The textual entry header.
//!
//! ```text
//! <leaf count>\n
//! <symbol byte> <weight> <codeword digits> <code length>\n   (one per leaf)
//! \n
//! <file name>\n
//! ```
//!
//! The symbol is the raw byte, so it may itself be a space or a newline.
//! Records are written in ascending symbol order. The packed body follows the
//! file name line directly.

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::frequency::{FrequencyTable, ALPHABET_SIZE};
use crate::huffman::{Alphabet, Codeword, MAX_CODE_LEN};
use log::warn;
use std::io::{BufRead, ErrorKind, Write};

/// Decimal digits in `u64::MAX`.
const MAX_NUMBER_DIGITS: usize = 20;

/// One leaf of the entry's tree as recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRecord {
    pub symbol: u8,
    pub weight: u64,
    pub codeword: Codeword,
}

/// Header of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub records: Vec<SymbolRecord>,
    pub file_name: String,
}

impl EntryHeader {
    /// Header for an entry with the given counts and codes.
    /// `alphabet` is `None` for an empty entry.
    pub fn from_parts(
        frequencies: &FrequencyTable,
        alphabet: Option<&Alphabet>,
        file_name: &str,
    ) -> Self {
        let records = alphabet
            .into_iter()
            .flat_map(|alphabet| alphabet.iter())
            .map(|(symbol, codeword)| SymbolRecord {
                symbol,
                weight: frequencies.count(symbol),
                codeword,
            })
            .collect();
        Self {
            records,
            file_name: file_name.to_string(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.records.len()
    }

    /// Rebuild the frequency table the entry was compressed with.
    pub fn frequencies(&self) -> Result<FrequencyTable> {
        let mut counts = [0u64; ALPHABET_SIZE];
        for record in &self.records {
            counts[record.symbol as usize] = record.weight;
        }
        FrequencyTable::from_counts(counts)
    }

    /// Number of symbols the body decodes to.
    pub fn total_symbols(&self) -> Result<u64> {
        Ok(self.frequencies()?.total())
    }

    /// Write the header and return its length in bytes.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let mut out = Vec::new();
        writeln!(out, "{}", self.records.len())?;
        for record in &self.records {
            out.push(record.symbol);
            writeln!(
                out,
                " {} {} {}",
                record.weight,
                record.codeword,
                record.codeword.len()
            )?;
        }
        writeln!(out)?;
        writeln!(out, "{}", self.file_name)?;
        writer.write_all(&out)?;
        Ok(out.len() as u64)
    }

    /// Read the next header.
    ///
    /// Blank lines in front of the header are skipped, so archives with
    /// newline separators between entries are accepted. Returns `None` when
    /// the source ends before a header starts.
    pub fn read_from<R: BufRead>(reader: &mut R, config: &ArchiveConfig) -> Result<Option<Self>> {
        let mut skipped = 0usize;
        loop {
            match peek_byte(reader)? {
                Some(b'\n') => {
                    reader.consume(1);
                    skipped += 1;
                }
                Some(_) => break,
                None => return Ok(None),
            }
        }
        if skipped > 0 {
            warn!("skipped {} blank separator line(s) before entry header", skipped);
        }

        let leaf_count = read_number(reader, b'\n', "leaf count")?;
        if leaf_count > ALPHABET_SIZE as u64 {
            return Err(ArchiveError::corrupt(format!(
                "leaf count {} exceeds {} symbols",
                leaf_count, ALPHABET_SIZE
            )));
        }

        let mut records = Vec::with_capacity(leaf_count as usize);
        let mut seen = [false; ALPHABET_SIZE];
        for _ in 0..leaf_count {
            let record = read_record(reader)?;
            if std::mem::replace(&mut seen[record.symbol as usize], true) {
                return Err(ArchiveError::corrupt(format!(
                    "symbol 0x{:02x} recorded twice",
                    record.symbol
                )));
            }
            records.push(record);
        }

        expect_byte(reader, b'\n', "blank line after symbol records")?;
        let name = read_field(reader, b'\n', "file name", config.max_name_len)?;
        if name.is_empty() {
            return Err(ArchiveError::corrupt("missing file name"));
        }
        let file_name = String::from_utf8(name)
            .map_err(|_| ArchiveError::corrupt("file name is not valid UTF-8"))?;

        Ok(Some(Self { records, file_name }))
    }
}

/// Check that `name` fits on a single header line.
pub fn validate_name(name: &str, max_len: usize) -> Result<()> {
    if name.is_empty() || name.len() > max_len || name.contains('\n') {
        return Err(ArchiveError::invalid_name(name));
    }
    Ok(())
}

fn read_record<R: BufRead>(reader: &mut R) -> Result<SymbolRecord> {
    let symbol = next_byte(reader)?
        .ok_or_else(|| ArchiveError::corrupt("unexpected end of header, expected symbol"))?;
    expect_byte(reader, b' ', "space after symbol")?;
    let weight = read_number(reader, b' ', "weight")?;
    let digits = read_field(reader, b' ', "codeword", MAX_CODE_LEN)?;
    let length = read_number(reader, b'\n', "code length")?;

    if weight == 0 {
        return Err(ArchiveError::corrupt(format!(
            "symbol 0x{:02x} recorded with weight 0",
            symbol
        )));
    }
    if length > MAX_CODE_LEN as u64 {
        return Err(ArchiveError::corrupt(format!(
            "code length {} exceeds {} bits",
            length, MAX_CODE_LEN
        )));
    }
    let codeword = std::str::from_utf8(&digits)
        .ok()
        .and_then(|digits| Codeword::parse(digits, length as usize))
        .ok_or_else(|| {
            ArchiveError::corrupt(format!(
                "invalid codeword {:?} of length {} for symbol 0x{:02x}",
                String::from_utf8_lossy(&digits),
                length,
                symbol
            ))
        })?;

    Ok(SymbolRecord {
        symbol,
        weight,
        codeword,
    })
}

fn peek_byte<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(buf.first().copied()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn next_byte<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    let byte = peek_byte(reader)?;
    if byte.is_some() {
        reader.consume(1);
    }
    Ok(byte)
}

fn expect_byte<R: BufRead>(reader: &mut R, expected: u8, what: &str) -> Result<()> {
    match next_byte(reader)? {
        Some(byte) if byte == expected => Ok(()),
        Some(byte) => Err(ArchiveError::corrupt(format!(
            "expected {}, found byte 0x{:02x}",
            what, byte
        ))),
        None => Err(ArchiveError::corrupt(format!(
            "unexpected end of header, expected {}",
            what
        ))),
    }
}

/// Read bytes up to `terminator`, which is consumed but not returned.
fn read_field<R: BufRead>(
    reader: &mut R,
    terminator: u8,
    what: &str,
    max_len: usize,
) -> Result<Vec<u8>> {
    let mut field = Vec::new();
    loop {
        match next_byte(reader)? {
            Some(byte) if byte == terminator => return Ok(field),
            Some(byte) => {
                if field.len() == max_len {
                    return Err(ArchiveError::corrupt(format!(
                        "{} longer than {} bytes",
                        what, max_len
                    )));
                }
                field.push(byte);
            }
            None => {
                return Err(ArchiveError::corrupt(format!(
                    "unexpected end of header in {}",
                    what
                )))
            }
        }
    }
}

fn read_number<R: BufRead>(reader: &mut R, terminator: u8, what: &str) -> Result<u64> {
    let field = read_field(reader, terminator, what, MAX_NUMBER_DIGITS)?;
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return Err(ArchiveError::corrupt(format!(
            "{} is not a number: {:?}",
            what,
            String::from_utf8_lossy(&field)
        )));
    }
    // All digits, so only overflow can fail here.
    std::str::from_utf8(&field)
        .ok()
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| ArchiveError::corrupt(format!("{} overflows 64 bits", what)))
}
