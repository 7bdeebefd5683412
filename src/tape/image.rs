use std::fs::File;
use std::io::{self, Cursor};
use std::path::Path;

use memmap::{Mmap, MmapOptions};

use crate::tape::error;

/// Provide backing storage (file or memory) for tape archives.
pub enum Image {
    ReadOnlyMap(Mmap),
    Memory(Box<[u8]>),
    /// Zero-length files can't be mapped.
    Empty,
}

impl Image {
    pub fn from_bytes(bytes: &[u8]) -> Image {
        Image::Memory(bytes.to_vec().into_boxed_slice())
    }

    pub fn open_read_only<P: AsRef<Path>>(path: P) -> io::Result<Image> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| error::with_path(e, path))?;
        let length = file.metadata().map_err(|e| error::with_path(e, path))?.len();
        if length == 0 {
            return Ok(Image::Empty);
        }
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| error::with_path(e, path))?;
        Ok(Image::ReadOnlyMap(mmap))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Image::ReadOnlyMap(mmap) => &mmap[..],
            Image::Memory(array) => &array[..],
            Image::Empty => &[],
        }
    }

    /// Return a buffered reader positioned at the start of the image.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.as_bytes())
    }
}
