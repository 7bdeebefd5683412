//! Traits, structs, and functions relating to tape archives.

mod image;

pub mod block;
pub mod container;
pub mod destination;
pub mod error;
pub mod inf;
pub mod reassembly;

#[cfg(test)]
mod testutil;

use std::io;
use std::path::Path;

pub use self::block::TapeBlock;
pub use self::container::{Chunk, Chunks, ContainerReader, Version};
pub use self::destination::{Destination, DirectoryDestination, MemoryDestination};
pub use self::error::TapeError;
pub use self::image::Image;
pub use self::inf::InfRecord;
pub use self::reassembly::{ExtractedFile, NameRegistry, Reassembler, DEFAULT_STEM};

/// Open a UEF archive held in memory or mapped from disk.
pub fn open(image: &Image) -> io::Result<ContainerReader<'_>> {
    ContainerReader::new(image.reader())
}

/// Map a UEF archive file.  Errors name the file.
pub fn open_file<P: AsRef<Path>>(path: P) -> io::Result<Image> {
    let path = path.as_ref();
    let image = Image::open_read_only(path)?;
    // Check the signature now so a bad file is reported against its name.
    open(&image).map_err(|e| error::with_path(e, path))?;
    Ok(image)
}

/// Decode the tape blocks in the remainder of the archive.
pub fn blocks<'r, 'a>(container: &'r mut ContainerReader<'a>) -> Blocks<'r, 'a> {
    let version = container.version();
    Blocks {
        chunks: container.chunks(),
        version,
    }
}

/// Iterator over the tape blocks of an archive.
pub struct Blocks<'r, 'a> {
    chunks: Chunks<'r, 'a>,
    version: Version,
}

impl<'r, 'a> Iterator for Blocks<'r, 'a> {
    type Item = io::Result<TapeBlock>;

    fn next(&mut self) -> Option<io::Result<TapeBlock>> {
        let version = self.version;
        self.chunks
            .next()
            .map(|chunk| chunk.and_then(|chunk| TapeBlock::decode(&chunk, version)))
    }
}

/// Decode every file in the archive into `destination`, naming unnamed files
/// after `stem`.  Files completed before an error are left in place.
pub fn extract<D: Destination>(
    container: &mut ContainerReader,
    destination: D,
    stem: &str,
) -> io::Result<Vec<ExtractedFile>> {
    let mut reassembler = Reassembler::new(destination, stem);
    for block in blocks(container) {
        reassembler.push(&block?)?;
    }
    reassembler.finish()
}

/// Return the first block of each file in the archive, without writing
/// anything.
pub fn list(container: &mut ContainerReader) -> io::Result<Vec<TapeBlock>> {
    let mut files = vec![];
    for block in blocks(container) {
        let block = block?;
        if block.is_first_block() {
            files.push(block);
        }
    }
    Ok(files)
}
