//! Byte occurrence counting.

use crate::error::{ArchiveError, Result};
use std::io::{ErrorKind, Read};

/// Number of distinct symbols: one per byte value.
pub const ALPHABET_SIZE: usize = 256;

const READ_CHUNK: usize = 8 * 1024;

/// Occurrence count of every byte value in one input.
///
/// The sum of all counts always fits in a `u64`; the tree builder and the
/// code assigner rely on that bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; ALPHABET_SIZE],
    total: u64,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self {
            counts: [0; ALPHABET_SIZE],
            total: 0,
        }
    }

    /// Build a table from explicit counts.
    /// Fails when the counts sum past `u64::MAX`.
    pub fn from_counts(counts: [u64; ALPHABET_SIZE]) -> Result<Self> {
        let total = counts
            .iter()
            .try_fold(0u64, |acc, &count| acc.checked_add(count))
            .ok_or_else(|| ArchiveError::corrupt("symbol weights overflow a 64-bit total"))?;
        Ok(Self { counts, total })
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        let mut table = Self::new();
        table.add_bytes(data);
        table
    }

    /// Count every byte of `reader` until end of stream.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut table = Self::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => table.add_bytes(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(table)
    }

    pub fn add_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.counts[byte as usize] += 1;
        }
        self.total += data.len() as u64;
    }

    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    pub fn counts(&self) -> &[u64; ALPHABET_SIZE] {
        &self.counts
    }

    /// Total number of symbols counted.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of symbols with a nonzero count.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Symbols that occur at least once, in ascending byte order.
    pub fn present(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(symbol, &count)| (symbol as u8, count))
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}
