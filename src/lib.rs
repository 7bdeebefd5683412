//! This is a Rust library for reading UEF tape archives, the format used to
//! preserve cassette software for the Acorn Electron and BBC Micro, and for
//! turning the files recorded on them back into ordinary files.
//!
//! Features:
//!
//! * Read UEF archives, plain or gzip-compressed, from disk or memory.
//! * Decode both implicit (0x100) and defined-format (0x102) tape data
//! chunks, including the bit-level framing of the latter.
//! * Reassemble files from their tape blocks, resolving duplicate and missing
//! filenames.
//! * Write each file with an INF sidecar carrying its load address,
//! execution address, and length, ready to be put onto a disc image.
//! * A sample `uef2inf` program for extracting or listing archives from the
//! command line.
//!
//! Current shortcomings:
//!
//! * Block and header CRCs are carried through but not verified.
//! * Chunks describing timing, carrier tone, or baud rate are skipped, so
//! protected tapes that rely on non-standard framing aren't decoded.
//!
//! # Example
//!
//! The following example opens an archive and prints the name and load
//! address of each file on it:
//!
//! ```
//! use std::io;
//! use uef::tape;
//! # fn list_files(archive_filename: &str) -> io::Result<()> {
//!
//! let image = tape::open_file(archive_filename)?;
//! let mut container = tape::open(&image)?;
//! for block in tape::list(&mut container)? {
//!     println!("{:<10} {:08X}", block.name, block.load_address);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Extracting every file into a directory is a matter of handing the archive
//! to `tape::extract` with a `Destination`:
//!
//! ```
//! use std::io;
//! use uef::tape::{self, DirectoryDestination};
//! # fn extract_files(archive_filename: &str, directory: &str) -> io::Result<()> {
//!
//! let image = tape::open_file(archive_filename)?;
//! let mut container = tape::open(&image)?;
//! DirectoryDestination::prepare(directory)?;
//! for file in tape::extract(&mut container, DirectoryDestination::new(directory), "noname")? {
//!     println!("{}", file.record);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design of tape archive access
//!
//! Decoding runs as a pipeline, one block at a time:
//!
//! 1. `Image` provides access to the underlying storage containing the
//!    archive -- either a memory-mapped file or an in-memory array.
//! 2. `ContainerReader` checks the signature (decompressing if needed), reads
//!    the format version, and yields the chunks that carry tape data.  Every
//!    other chunk is skipped without being seen by later stages.
//! 3. `TapeBlock` recovers a block from a chunk, unpacking the bit-framed
//!    variant according to the archive version, and parses its header.
//! 4. `Reassembler` stitches blocks into files on a `Destination`, starting a
//!    new file at every block numbered zero and writing each sidecar as its
//!    file is completed.
//!
//! Because a file's length is only known once the next file begins, the
//! reassembler writes each sidecar in two parts: the name and addresses when
//! the file is opened, and the length (and the name of the following file, if
//! any) when it is closed.  An error partway through an archive leaves every
//! completed file on disk.
//!
//! # License
//!
//! Uef is distributed under the terms of both the MIT license and the
//! Apache License (Version 2.0).
//!
//! See LICENSE-APACHE and LICENSE-MIT for details.

pub mod tape;

mod util;
