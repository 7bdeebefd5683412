use std::fmt;
use std::io::{self, Write};

use crate::tape::container::{Chunk, Version, DEFINED_FORMAT_DATA_CHUNK};
use crate::tape::error::TapeError;
use crate::util::{self, Slice};

/// Bytes following the filename terminator: load (4), execution (4), block
/// number (2), data length (2), flags (1), spare (4), header CRC (2).
pub const HEADER_SIZE: usize = 19;
/// The data CRC that follows the block data.
pub const TRAILER_SIZE: usize = 2;
/// The filename starts after the sync byte.
const NAME_OFFSET: usize = 1;
/// Load, execution, and block number are required; the rest of the header
/// is optional in practice.
const FIXED_FIELDS_SIZE: usize = 10;

const FLAG_LAST_BLOCK: u8 = 0x80;
const FLAG_EMPTY_BLOCK: u8 = 0x40;
const FLAG_LOCKED: u8 = 0x01;

/// Each byte on tape is framed by a start bit and a stop bit.
const START_BITS: usize = 1;
const DATA_BITS: usize = 8;
const STOP_BITS: usize = 1;

/// One block of a file as it was recorded on tape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TapeBlock {
    pub name: String,
    pub load_address: u32,
    pub exec_address: u32,
    pub block_number: u16,
    /// The data length recorded in the header, which may disagree with the
    /// data actually present.
    pub data_length: u16,
    pub flags: u8,
    pub data: Vec<u8>,
}

impl TapeBlock {
    /// Decode the tape block carried by a data chunk.
    pub fn decode(chunk: &Chunk, version: Version) -> io::Result<TapeBlock> {
        if chunk.id == DEFINED_FORMAT_DATA_CHUNK {
            TapeBlock::from_bytes(&unpack_bits(&chunk.payload, version))
        } else {
            TapeBlock::from_bytes(&chunk.payload)
        }
    }

    /// Parse a block from its on-tape bytes, starting with the sync byte.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<TapeBlock> {
        let name_bytes = bytes.get(NAME_OFFSET..).unwrap_or(&[]);
        let terminator = name_bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| TapeError::TruncatedBlock.to_io_error())?;
        // Acorn filenames are one byte per character.
        let name: String = name_bytes[..terminator].iter().map(|&b| b as char).collect();

        let header_offset = NAME_OFFSET + terminator + 1;
        let fields = bytes
            .slice(header_offset, FIXED_FIELDS_SIZE)
            .ok_or_else(|| TapeError::TruncatedBlock.to_io_error())?;
        let load_address = util::le_u32(&fields[0..4]);
        let exec_address = util::le_u32(&fields[4..8]);
        let block_number = util::le_u16(&fields[8..10]);
        let data_length = bytes.slice(header_offset + 10, 2).map_or(0, util::le_u16);
        let flags = bytes.get(header_offset + 12).cloned().unwrap_or(0);

        let data_start = header_offset + HEADER_SIZE;
        let data = if bytes.len() >= data_start + TRAILER_SIZE {
            bytes[data_start..bytes.len() - TRAILER_SIZE].to_vec()
        } else {
            Vec::new()
        };

        Ok(TapeBlock {
            name,
            load_address,
            exec_address,
            block_number,
            data_length,
            flags,
            data,
        })
    }

    pub fn is_first_block(&self) -> bool {
        self.block_number == 0
    }

    pub fn is_last_block(&self) -> bool {
        self.flags & FLAG_LAST_BLOCK != 0
    }

    /// Hex-dump the block data to the provided writer.
    pub fn dump(&self, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{}", util::hex(&self.data, "    "))
    }
}

impl fmt::Display for TapeBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:<10} {:04X} {:08X} {:08X} {:04X}",
            self.name, self.block_number, self.load_address, self.exec_address, self.data_length
        )?;
        if f.alternate() {
            let mut flags = Vec::new();
            if self.flags & FLAG_LAST_BLOCK != 0 {
                flags.push("last");
            }
            if self.flags & FLAG_EMPTY_BLOCK != 0 {
                flags.push("empty");
            }
            if self.flags & FLAG_LOCKED != 0 {
                flags.push("locked");
            }
            if !flags.is_empty() {
                write!(f, " ({})", flags.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Recover the bytes of a defined-format (0x102) chunk.  Each byte is stored
/// least significant bit first between a start bit and a stop bit.  Archives
/// from version 0.9 onward prefix the bits with a count of trailing bits to
/// ignore in the final byte.
pub fn unpack_bits(payload: &[u8], version: Version) -> Vec<u8> {
    let (ignore, mut bit_ptr) = if version.has_ignore_count() {
        match payload.first() {
            Some(&ignore) => (ignore as usize, 8),
            None => return Vec::new(),
        }
    } else {
        (0, 0)
    };
    let total_bits = payload.len() * 8;
    let after_end = total_bits.saturating_sub(ignore);

    let mut bytes = Vec::with_capacity(after_end / (START_BITS + DATA_BITS + STOP_BITS));
    while bit_ptr < after_end {
        bit_ptr += START_BITS;
        if bit_ptr + DATA_BITS > total_bits {
            break;
        }
        let index = bit_ptr >> 3;
        let offset = bit_ptr & 7;
        let byte = if offset == 0 {
            payload[index]
        } else {
            (payload[index] >> offset) | (payload[index + 1] << (8 - offset))
        };
        bytes.push(byte);
        bit_ptr += DATA_BITS + STOP_BITS;
    }
    bytes
}
