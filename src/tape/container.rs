use std::fmt;
use std::io::{self, BufRead, BufReader, Cursor, Read};

use flate2::bufread::MultiGzDecoder;
use tracing::{debug, trace};

use crate::tape::error::TapeError;

/// Every UEF archive begins with this signature, including the terminator.
pub const SIGNATURE: &[u8; 10] = b"UEF File!\0";
const SIGNATURE_SIZE: usize = 10;

/// Gzip member header magic, checked only to make the log message useful.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Implicit start/stop bit tape data block: the payload is the tape block.
pub const IMPLICIT_DATA_CHUNK: u16 = 0x0100;
/// Defined tape format data block: the payload is bit-serialized.
pub const DEFINED_FORMAT_DATA_CHUNK: u16 = 0x0102;

/// Payloads this short can't hold a tape block, so they are skipped.
const MIN_BLOCK_PAYLOAD: u32 = 2;

/// The archive format version that follows the signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub fn new(major: u8, minor: u8) -> Version {
        Version { major, minor }
    }

    /// Versions before 0.9 did not record how many trailing bits of a
    /// defined-format chunk to ignore.
    pub fn has_ignore_count(&self) -> bool {
        !(self.major == 0 && self.minor < 9)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// A single length-prefixed record from the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub id: u16,
    pub payload: Vec<u8>,
}

impl Chunk {
    #[inline]
    pub fn is_data(id: u16) -> bool {
        id == IMPLICIT_DATA_CHUNK || id == DEFINED_FORMAT_DATA_CHUNK
    }
}

/// Reads chunks from a UEF archive, one at a time, skipping every chunk that
/// doesn't carry tape data.
pub struct ContainerReader<'a> {
    source: Box<dyn Read + 'a>,
    version: Version,
    eof: bool,
}

impl<'a> ContainerReader<'a> {
    /// Verify the signature and read the version.  If the stream doesn't
    /// start with the signature, it is assumed to be gzip-compressed.
    pub fn new<R: BufRead + 'a>(mut source: R) -> io::Result<ContainerReader<'a>> {
        let mut prefix = [0u8; SIGNATURE_SIZE];
        let filled = read_exact_or_short(&mut source, &mut prefix)?;
        let mut source: Box<dyn Read + 'a> = if filled == SIGNATURE_SIZE && &prefix == SIGNATURE {
            Box::new(source)
        } else {
            if prefix.starts_with(&GZIP_MAGIC) {
                debug!("archive is gzip-compressed");
            }
            // Put back the bytes already consumed.
            let stream = Cursor::new(prefix[..filled].to_vec()).chain(source);
            let mut decoder: Box<dyn Read + 'a> = Box::new(MultiGzDecoder::new(stream));
            let mut signature = [0u8; SIGNATURE_SIZE];
            // A stream that isn't gzip either fails here with an I/O error of
            // its own, which is folded into the same verdict.
            if read_exact_or_short(&mut decoder, &mut signature).unwrap_or(0) != SIGNATURE_SIZE
                || &signature != SIGNATURE
            {
                return Err(TapeError::InvalidSignature.into());
            }
            decoder
        };

        let mut version = [0u8; 2];
        read_exact_or_truncated(&mut source, &mut version)?;
        let version = Version::new(version[1], version[0]);
        debug!(%version, "opened UEF archive");

        Ok(ContainerReader {
            source,
            version,
            eof: false,
        })
    }

    /// Wrap an unbuffered reader.
    pub fn from_reader<R: Read + 'a>(source: R) -> io::Result<ContainerReader<'a>> {
        Self::new(BufReader::new(source))
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Return the next tape data chunk, or None at the end of the archive.
    pub fn next_chunk(&mut self) -> io::Result<Option<Chunk>> {
        while !self.eof {
            let mut id = [0u8; 2];
            match read_exact_or_short(&mut self.source, &mut id)? {
                0 => {
                    self.eof = true;
                    break;
                }
                2 => {}
                _ => return Err(TapeError::TruncatedChunk.into()),
            }
            let id = u16::from_le_bytes(id);

            let mut length = [0u8; 4];
            read_exact_or_truncated(&mut self.source, &mut length)?;
            let length = u32::from_le_bytes(length);

            if !Chunk::is_data(id) || length < MIN_BLOCK_PAYLOAD {
                trace!("skipping chunk {:#06x} ({} bytes)", id, length);
                self.skip(length)?;
                continue;
            }

            let mut payload = Vec::new();
            let read = (&mut self.source)
                .take(u64::from(length))
                .read_to_end(&mut payload)?;
            if read != length as usize {
                return Err(TapeError::TruncatedChunk.into());
            }
            trace!("data chunk {:#06x} ({} bytes)", id, length);
            return Ok(Some(Chunk { id, payload }));
        }
        Ok(None)
    }

    /// Iterate over the remaining data chunks.
    pub fn chunks(&mut self) -> Chunks<'_, 'a> {
        Chunks {
            reader: self,
            failed: false,
        }
    }

    fn skip(&mut self, length: u32) -> io::Result<()> {
        let skipped = io::copy(
            &mut (&mut self.source).take(u64::from(length)),
            &mut io::sink(),
        )?;
        if skipped != u64::from(length) {
            return Err(TapeError::TruncatedChunk.into());
        }
        Ok(())
    }
}

/// Iterator over data chunks that ends after the first error.
pub struct Chunks<'r, 'a> {
    reader: &'r mut ContainerReader<'a>,
    failed: bool,
}

impl<'r, 'a> Iterator for Chunks<'r, 'a> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<io::Result<Chunk>> {
        if self.failed {
            return None;
        }
        match self.reader.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill as much of `buf` as the reader can supply and return the count.
fn read_exact_or_short<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_exact_or_truncated<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<()> {
    if read_exact_or_short(reader, buf)? != buf.len() {
        return Err(TapeError::TruncatedChunk.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::testutil::ArchiveBuilder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn reader(bytes: &[u8]) -> io::Result<ContainerReader<'_>> {
        ContainerReader::new(Cursor::new(bytes))
    }

    #[test]
    fn test_version() {
        let bytes = ArchiveBuilder::new(Version::new(0, 10)).build();
        let container = reader(&bytes).unwrap();
        assert_eq!(container.version(), Version::new(0, 10));
        assert_eq!(container.version().to_string(), "0.10");
        assert!(container.version().has_ignore_count());
        assert!(!Version::new(0, 8).has_ignore_count());
        assert!(Version::new(1, 0).has_ignore_count());
    }

    #[test]
    fn test_empty_archive() {
        let bytes = ArchiveBuilder::new(Version::new(0, 10)).build();
        let mut container = reader(&bytes).unwrap();
        assert_eq!(container.next_chunk().unwrap(), None);
        assert_eq!(container.next_chunk().unwrap(), None);
    }

    #[test]
    fn test_bad_signature() {
        let e = reader(b"UEF File?\0\x0a\x00").err().unwrap();
        assert!(e == TapeError::InvalidSignature);
        let e = reader(b"").err().unwrap();
        assert!(e == TapeError::InvalidSignature);
        let e = reader(b"\x1f\x8bnot really gzip").err().unwrap();
        assert!(e == TapeError::InvalidSignature);
    }

    #[test]
    fn test_missing_version() {
        let e = reader(b"UEF File!\0\x0a").err().unwrap();
        assert!(e == TapeError::TruncatedChunk);
    }

    #[test]
    fn test_gzip() {
        let bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(IMPLICIT_DATA_CHUNK, b"*payload")
            .build();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut container = reader(&compressed).unwrap();
        assert_eq!(container.version(), Version::new(0, 10));
        let chunk = container.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.id, IMPLICIT_DATA_CHUNK);
        assert_eq!(chunk.payload, b"*payload");
        assert_eq!(container.next_chunk().unwrap(), None);
    }

    /// Hands out at most one byte per read, like a slow pipe.
    struct Trickle<'a>(&'a [u8]);

    impl<'a> Read for Trickle<'a> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&byte, rest)), Some(slot)) => {
                    *slot = byte;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    /// A `BufRead` whose buffer never holds more than one byte.
    fn trickle(bytes: &[u8]) -> BufReader<Trickle<'_>> {
        BufReader::with_capacity(1, Trickle(bytes))
    }

    #[test]
    fn test_one_byte_reads() {
        let bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(IMPLICIT_DATA_CHUNK, b"*payload")
            .build();
        let mut container = ContainerReader::new(trickle(&bytes)).unwrap();
        assert_eq!(container.version(), Version::new(0, 10));
        let chunk = container.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.payload, b"*payload");
        assert_eq!(container.next_chunk().unwrap(), None);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let compressed = encoder.finish().unwrap();
        let mut container = ContainerReader::new(trickle(&compressed)).unwrap();
        assert_eq!(container.next_chunk().unwrap().unwrap().payload, b"*payload");

        let e = ContainerReader::new(trickle(b"UEF File?\0\x0a\x00")).err().unwrap();
        assert!(e == TapeError::InvalidSignature);
        let e = reader(b"UEF File!").err().unwrap();
        assert!(e == TapeError::InvalidSignature);
    }

    #[test]
    fn test_concatenated_gzip_members() {
        let bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(IMPLICIT_DATA_CHUNK, b"*first")
            .chunk(IMPLICIT_DATA_CHUNK, b"*second")
            .build();
        let (head, tail) = bytes.split_at(20);
        let mut compressed = vec![];
        for part in &[head, tail] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(part).unwrap();
            compressed.extend(encoder.finish().unwrap());
        }

        let mut container = reader(&compressed).unwrap();
        let payloads: Vec<Vec<u8>> = container
            .chunks()
            .map(|chunk| chunk.unwrap().payload)
            .collect();
        assert_eq!(payloads, vec![b"*first".to_vec(), b"*second".to_vec()]);
    }

    #[test]
    fn test_skips_uninteresting_chunks() {
        let bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(0x0000, b"origin")
            .chunk(0x0500, &[0xde, 0xad, 0xbe, 0xef])
            .chunk(IMPLICIT_DATA_CHUNK, b"*one")
            .chunk(0x0110, &[0x00, 0x01])
            .chunk(IMPLICIT_DATA_CHUNK, b"")
            .chunk(DEFINED_FORMAT_DATA_CHUNK, b"x")
            .chunk(DEFINED_FORMAT_DATA_CHUNK, b"*two")
            .build();
        let mut container = reader(&bytes).unwrap();
        let chunks: Vec<Chunk> = container.chunks().collect::<io::Result<_>>().unwrap();
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    id: IMPLICIT_DATA_CHUNK,
                    payload: b"*one".to_vec()
                },
                Chunk {
                    id: DEFINED_FORMAT_DATA_CHUNK,
                    payload: b"*two".to_vec()
                },
            ]
        );
    }

    #[test]
    fn test_truncated_length() {
        let mut bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(IMPLICIT_DATA_CHUNK, b"*one")
            .build();
        bytes.extend_from_slice(&[0x00, 0x01, 0x10, 0x00]);
        let mut container = reader(&bytes).unwrap();
        assert!(container.next_chunk().unwrap().is_some());
        let e = container.next_chunk().err().unwrap();
        assert!(e == TapeError::TruncatedChunk);
    }

    #[test]
    fn test_truncated_id_and_payload() {
        let mut bytes = ArchiveBuilder::new(Version::new(0, 10)).build();
        bytes.push(0x00);
        let e = reader(&bytes).unwrap().next_chunk().err().unwrap();
        assert!(e == TapeError::TruncatedChunk);

        let mut bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(IMPLICIT_DATA_CHUNK, b"*complete")
            .build();
        bytes.truncate(bytes.len() - 3);
        let e = reader(&bytes).unwrap().next_chunk().err().unwrap();
        assert!(e == TapeError::TruncatedChunk);

        let mut bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(0x0500, b"skipped")
            .build();
        bytes.pop();
        let e = reader(&bytes).unwrap().next_chunk().err().unwrap();
        assert!(e == TapeError::TruncatedChunk);
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut bytes = ArchiveBuilder::new(Version::new(0, 10))
            .chunk(IMPLICIT_DATA_CHUNK, b"*one")
            .build();
        bytes.push(0x00);
        let mut container = reader(&bytes).unwrap();
        let mut chunks = container.chunks();
        assert!(chunks.next().unwrap().is_ok());
        assert!(chunks.next().unwrap().is_err());
        assert!(chunks.next().is_none());
    }
}
