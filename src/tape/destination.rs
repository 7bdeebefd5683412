use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::tape::error;

/// Somewhere to put extracted files and their sidecars.
pub trait Destination {
    /// Create (or truncate) the named file and return a writer for it.
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Write>>;
}

impl<'a, D: Destination + ?Sized> Destination for &'a mut D {
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Write>> {
        (**self).create(filename)
    }
}

/// Write files into a host directory.
pub struct DirectoryDestination {
    path: PathBuf,
}

impl DirectoryDestination {
    pub fn new<P: AsRef<Path>>(path: P) -> DirectoryDestination {
        DirectoryDestination {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Make sure the directory exists.  Returns true if it had to be created.
    pub fn prepare<P: AsRef<Path>>(path: P) -> io::Result<bool> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(false);
        }
        fs::create_dir(path).map_err(|e| error::with_path(e, path))?;
        debug!("created directory {}", path.display());
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// True if `filename` names an entry directly inside a directory, rather
/// than the directory itself, its parent, or anywhere else.
fn is_plain_filename(filename: &str) -> bool {
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !filename.contains(['/', '\\'])
}

impl Destination for DirectoryDestination {
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Write>> {
        let path = self.path.join(filename);
        if !is_plain_filename(filename) {
            let e = io::Error::new(io::ErrorKind::InvalidInput, "not a plain filename");
            return Err(error::with_path(e, &path));
        }
        let file = fs::File::create(&path).map_err(|e| error::with_path(e, &path))?;
        Ok(Box::new(io::BufWriter::new(file)))
    }
}

type SharedBuffer = Rc<RefCell<Vec<u8>>>;

/// Keep files in memory.  Names can be marked as refused to simulate a host
/// filesystem that won't accept them.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    files: BTreeMap<String, SharedBuffer>,
    refused: HashSet<String>,
}

impl MemoryDestination {
    pub fn new() -> MemoryDestination {
        Default::default()
    }

    /// Make future attempts to create `filename` fail.
    pub fn refuse(&mut self, filename: &str) {
        self.refused.insert(filename.to_string());
    }

    pub fn get(&self, filename: &str) -> Option<Vec<u8>> {
        self.files.get(filename).map(|buffer| buffer.borrow().clone())
    }

    /// All files created so far, in name order.
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files
            .iter()
            .map(|(name, buffer)| (name.clone(), buffer.borrow().clone()))
            .collect()
    }
}

impl Destination for MemoryDestination {
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Write>> {
        if self.refused.contains(filename) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{}: refused", filename),
            ));
        }
        let buffer = SharedBuffer::default();
        self.files.insert(filename.to_string(), buffer.clone());
        Ok(Box::new(MemoryWriter(buffer)))
    }
}

struct MemoryWriter(SharedBuffer);

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
