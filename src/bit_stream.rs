//! Bit-level reading and writing of the packed body.
//!
//! Bits are stored most-significant-bit first within each byte. The last byte of
//! a body is padded with zero bits.
use crate::huffman::Codeword;
use std::io::{self, Write};

/// The number of bits in a byte.
const BITS_PER_BYTE: usize = 8;

/// Bytes buffered by a [`BitWriter`] before they are handed to the sink.
const WRITE_BUFFER_LEN: usize = 8 * 1024;

/// A struct representing the position of a bit in a byte array.
/// The position is represented by the byte index and the bit index within the byte,
/// counted from the most significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct BitPosition {
    pub byte_index: usize,
    pub bit_index: usize,
}

impl BitPosition {
    /// Try to add the given number of bits to the current position.
    fn try_add_bits(&self, bits: usize) -> Option<Self> {
        let byte_added = bits / BITS_PER_BYTE;
        let bit_rem = bits % BITS_PER_BYTE;

        let byte_index = self.byte_index.checked_add(byte_added)?;
        let bit_index = self.bit_index + bit_rem;

        if bit_index >= BITS_PER_BYTE {
            Some(Self {
                byte_index: byte_index.checked_add(1)?,
                bit_index: bit_index - BITS_PER_BYTE,
            })
        } else {
            Some(Self {
                byte_index,
                bit_index,
            })
        }
    }
}

/// Packs bits MSB-first into bytes and writes them to a sink.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    inner: W,
    /// Bits received for the byte being assembled, oldest in the highest position.
    pending: u8,
    /// Number of bits in `pending`.
    filled: usize,
    buffer: Vec<u8>,
    bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending: 0,
            filled: 0,
            buffer: Vec::with_capacity(WRITE_BUFFER_LEN),
            bits_written: 0,
        }
    }

    /// Number of bits accepted so far, padding excluded.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        self.pending = (self.pending << 1) | bit as u8;
        self.filled += 1;
        self.bits_written += 1;
        if self.filled == BITS_PER_BYTE {
            self.emit_pending()?;
        }
        Ok(())
    }

    /// Write every bit of `codeword`, first-assigned bit first.
    pub fn write_codeword(&mut self, codeword: &Codeword) -> io::Result<()> {
        for bit in codeword.bits() {
            self.write_bit(bit)?;
        }
        Ok(())
    }

    /// Pad the final partial byte with zeros and flush everything to the sink.
    /// Returns the sink and the number of bytes written.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        if self.filled > 0 {
            self.pending <<= BITS_PER_BYTE - self.filled;
            self.emit_pending()?;
        }
        self.flush_buffer()?;
        self.inner.flush()?;
        let bytes = self.bits_written.div_ceil(BITS_PER_BYTE as u64);
        Ok((self.inner, bytes))
    }

    fn emit_pending(&mut self) -> io::Result<()> {
        self.buffer.push(self.pending);
        self.pending = 0;
        self.filled = 0;
        if self.buffer.len() >= WRITE_BUFFER_LEN {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        self.inner.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

/// A struct that reads bits from a byte array, most significant bit first.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: BitPosition,
}

impl<'a> BitReader<'a> {
    /// Create a new BitReader with the given byte array.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: BitPosition::default(),
        }
    }

    /// Read one bit, or `None` at the end of the data.
    pub fn read_bit(&mut self) -> Option<bool> {
        let byte = *self.data.get(self.position.byte_index)?;
        let bit = (byte >> (BITS_PER_BYTE - 1 - self.position.bit_index)) & 1;
        self.position = self.position.try_add_bits(1)?;
        Some(bit == 1)
    }

    /// True when every bit left in the data is zero.
    pub fn remaining_bits_are_zero(&self) -> bool {
        let Some(&current) = self.data.get(self.position.byte_index) else {
            return true;
        };
        // Mask off the bits already consumed from the current byte.
        let mask = 0xFFu8 >> self.position.bit_index;
        current & mask == 0
            && self.data[self.position.byte_index + 1..]
                .iter()
                .all(|&byte| byte == 0)
    }
}
