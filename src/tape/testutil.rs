//! Helpers for building synthetic archives in unit tests.

use crate::tape::container::{Version, SIGNATURE};

/// Serialize a tape block: sync byte, name, header fields, data, data CRC.
pub fn block_bytes(name: &str, load: u32, exec: u32, block_number: u16, data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x2a];
    bytes.extend(name.chars().map(|c| c as u32 as u8));
    bytes.push(0);
    bytes.extend_from_slice(&load.to_le_bytes());
    bytes.extend_from_slice(&exec.to_le_bytes());
    bytes.extend_from_slice(&block_number.to_le_bytes());
    bytes.extend_from_slice(&(data.len() as u16).to_le_bytes());
    bytes.push(0); // flags
    bytes.extend_from_slice(&[0; 4]); // spare
    bytes.extend_from_slice(&[0; 2]); // header CRC
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(&[0; 2]); // data CRC
    bytes
}

/// Frame each byte with a start and stop bit, least significant bit first.
pub fn pack_bits(bytes: &[u8], version: Version) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 10);
    for &byte in bytes {
        bits.push(false);
        bits.extend((0..8).map(|i| byte & (1 << i) != 0));
        bits.push(true);
    }
    let mut packed = vec![0u8; (bits.len() + 7) / 8];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            packed[i >> 3] |= 1 << (i & 7);
        }
    }
    if version.has_ignore_count() {
        let ignore = (packed.len() * 8 - bits.len()) as u8;
        packed.insert(0, ignore);
    }
    packed
}

pub struct ArchiveBuilder {
    bytes: Vec<u8>,
}

impl ArchiveBuilder {
    pub fn new(version: Version) -> ArchiveBuilder {
        let mut bytes = SIGNATURE.to_vec();
        bytes.push(version.minor);
        bytes.push(version.major);
        ArchiveBuilder { bytes }
    }

    pub fn chunk(mut self, id: u16, payload: &[u8]) -> ArchiveBuilder {
        self.bytes.extend_from_slice(&id.to_le_bytes());
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
