use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can be returned from tape archive operations.  These are
/// generally converted into `io::Error`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TapeError {
    /// The stream does not start with the UEF signature, raw or gzipped.
    #[error("not a UEF archive (missing \"UEF File!\" signature)")]
    InvalidSignature,
    /// The archive ends in the middle of a chunk id, length, or payload.
    #[error("archive truncated inside a chunk")]
    TruncatedChunk,
    /// A tape block is too short to hold its fixed header fields.
    #[error("tape block truncated before its header fields")]
    TruncatedBlock,
    /// A file's length no longer fits in the 32-bit sidecar field.
    #[error("file too large for a 32-bit length")]
    FileTooLarge,
    /// A block was supplied after the reassembler was finished.
    #[error("reassembly already finished")]
    Finished,
}

impl From<TapeError> for io::Error {
    fn from(error: TapeError) -> io::Error {
        use self::TapeError::*;
        use std::io::ErrorKind;
        match error {
            InvalidSignature => io::Error::new(ErrorKind::InvalidData, error),
            TruncatedChunk => io::Error::new(ErrorKind::UnexpectedEof, error),
            TruncatedBlock => io::Error::new(ErrorKind::InvalidData, error),
            FileTooLarge => io::Error::new(ErrorKind::InvalidData, error),
            Finished => io::Error::new(ErrorKind::Other, error),
        }
    }
}

impl TapeError {
    /// If the provided `io::Error` contains a `TapeError`, return the
    /// underlying `TapeError`.  If not, return None.  Errors wrapped by
    /// `with_path` are searched too.
    pub fn from_io_error(error: &io::Error) -> Option<TapeError> {
        let mut inner: &(dyn StdError + 'static) = error.get_ref()?;
        loop {
            if let Some(e) = inner.downcast_ref::<TapeError>() {
                return Some(e.clone());
            }
            // `io::Error::source` skips over its own payload, so look inside
            // it directly.
            inner = match inner.downcast_ref::<io::Error>() {
                Some(e) => {
                    let payload: &(dyn StdError + 'static) = e.get_ref()?;
                    payload
                }
                None => inner.source()?,
            };
        }
    }

    /// Useful instead of .into() when the compiler can't infer the target.
    pub fn to_io_error(&self) -> io::Error {
        self.clone().into()
    }
}

impl PartialEq<io::Error> for TapeError {
    fn eq(&self, other: &io::Error) -> bool {
        TapeError::from_io_error(other).as_ref() == Some(self)
    }
}

impl PartialEq<TapeError> for io::Error {
    fn eq(&self, other: &TapeError) -> bool {
        TapeError::from_io_error(self).as_ref() == Some(other)
    }
}

/// An I/O error and the path it concerns.
#[derive(Debug, Error)]
#[error("{}: {}", .path.display(), .source)]
struct PathError {
    path: PathBuf,
    source: io::Error,
}

/// Prefix an I/O error with the path it concerns, keeping its kind and the
/// original error.
pub fn with_path<P: AsRef<Path>>(error: io::Error, path: P) -> io::Error {
    io::Error::new(
        error.kind(),
        PathError {
            path: path.as_ref().to_path_buf(),
            source: error,
        },
    )
}
