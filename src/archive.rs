//! Multi-entry archives.
//!
//! An archive is a plain concatenation of entries, each a header followed by
//! its packed body. Nothing separates two entries: the body length follows
//! from the header, so a reader always knows where the next header starts.

use crate::codec::{decode_entry, encode_entry, encode_stream, output_buffer, EntryStats};
use crate::config::ArchiveConfig;
use crate::error::Result;
use crate::frequency::FrequencyTable;
use crate::header::EntryHeader;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// One decompressed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Appends compressed entries to a sink, in call order.
#[derive(Debug)]
pub struct ArchiveWriter<W: Write> {
    sink: W,
    config: ArchiveConfig,
    entries: Vec<EntryStats>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            config: ArchiveConfig::default(),
            entries: Vec::new(),
        }
    }

    pub fn with_config(sink: W, config: ArchiveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sink,
            config,
            entries: Vec::new(),
        })
    }

    /// Compress `data` as an entry called `name`.
    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<EntryStats> {
        let stats = encode_entry(data, name, &mut self.sink, &self.config)?;
        Ok(self.record(stats))
    }

    /// Compress the rest of `reader` as an entry called `name`.
    ///
    /// The reader is read twice: once to count symbols, then again from the
    /// same position to encode them.
    pub fn add_reader<R: Read + Seek>(&mut self, name: &str, mut reader: R) -> Result<EntryStats> {
        let start = reader.stream_position()?;
        let frequencies = FrequencyTable::from_reader(&mut reader)?;
        reader.seek(SeekFrom::Start(start))?;
        let stats = encode_stream(&frequencies, reader, name, &mut self.sink, &self.config)?;
        Ok(self.record(stats))
    }

    /// Compress the file at `path` as an entry called `name`.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, name: &str) -> Result<EntryStats> {
        let file = File::open(path)?;
        self.add_reader(name, BufReader::new(file))
    }

    /// Stats of the entries written so far.
    pub fn entries(&self) -> &[EntryStats] {
        &self.entries
    }

    /// Flush and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.sink.flush()?;
        debug!("finished archive with {} entries", self.entries.len());
        Ok(self.sink)
    }

    fn record(&mut self, stats: EntryStats) -> EntryStats {
        self.entries.push(stats.clone());
        stats
    }
}

/// Reads entries back out of an archive.
///
/// As an iterator it yields `Result<Entry>` and stops after the first error.
#[derive(Debug)]
pub struct ArchiveReader<R: BufRead> {
    source: R,
    config: ArchiveConfig,
    entries_read: usize,
    failed: bool,
}

impl<R: BufRead> ArchiveReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            config: ArchiveConfig::default(),
            entries_read: 0,
            failed: false,
        }
    }

    pub fn with_config(source: R, config: ArchiveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            entries_read: 0,
            failed: false,
        })
    }

    pub fn entries_read(&self) -> usize {
        self.entries_read
    }

    /// Decompress the next entry into `sink`, a chunk at a time.
    /// Returns `None` at the end of the archive.
    pub fn next_entry_into<W: Write>(&mut self, sink: &mut W) -> Result<Option<EntryStats>> {
        let Some(header) = EntryHeader::read_from(&mut self.source, &self.config)? else {
            return Ok(None);
        };
        self.decode(&header, sink).map(Some)
    }

    /// Decompress the next entry into memory.
    ///
    /// Room for the whole entry is reserved up front; a declared size that
    /// cannot be reserved fails with `OutOfMemory`.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        let Some(header) = EntryHeader::read_from(&mut self.source, &self.config)? else {
            return Ok(None);
        };
        let mut data = output_buffer(&header)?;
        let stats = self.decode(&header, &mut data)?;
        Ok(Some(Entry {
            name: stats.name,
            data,
        }))
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn decode<W: Write>(&mut self, header: &EntryHeader, sink: &mut W) -> Result<EntryStats> {
        let stats = decode_entry(header, &mut self.source, sink, &self.config)?;
        self.entries_read += 1;
        Ok(stats)
    }
}

impl<R: BufRead> Iterator for ArchiveReader<R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Decompress every entry of an in-memory archive.
pub fn read_all(archive: &[u8]) -> Result<Vec<Entry>> {
    ArchiveReader::new(archive).collect()
}
