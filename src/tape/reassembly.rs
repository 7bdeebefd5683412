use std::collections::HashSet;
use std::io::{self, Write};
use std::mem;

use tracing::{debug, trace, warn};

use crate::tape::block::TapeBlock;
use crate::tape::destination::Destination;
use crate::tape::error::TapeError;
use crate::tape::inf::InfRecord;

/// Unnamed files are called `noname1`, `noname2`, etc. unless told otherwise.
pub const DEFAULT_STEM: &str = "noname";

/// Tracks the names already given to extracted files, and hands out
/// replacements for names that are taken or empty.
#[derive(Debug)]
pub struct NameRegistry {
    created: HashSet<String>,
    counter: u32,
    stem: String,
}

impl NameRegistry {
    pub fn new(stem: &str) -> NameRegistry {
        NameRegistry {
            created: HashSet::new(),
            counter: 1,
            stem: stem.to_string(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.created.contains(name)
    }

    /// Claim `name` and its sidecar's name.
    pub fn register(&mut self, name: &str) {
        self.created.insert(name.to_string());
        self.created.insert(InfRecord::filename(name));
    }

    /// A name can't be used if it, or the name of its sidecar, has already
    /// been written.
    pub fn is_taken(&self, name: &str) -> bool {
        self.contains(name) || self.contains(&InfRecord::filename(name))
    }

    /// Choose a name for a file called `name` on tape.  A name already in use
    /// gets a `-n` suffix, and an empty name becomes a placeholder.  Both
    /// draw on the same counter.
    pub fn resolve(&mut self, name: &str) -> String {
        if name.is_empty() {
            return self.placeholder();
        }
        let mut resolved = name.to_string();
        while self.is_taken(&resolved) {
            resolved = format!("{}-{}", name, self.next_number());
        }
        resolved
    }

    /// A fresh `{stem}{n}` name that isn't in use.
    pub fn placeholder(&mut self) -> String {
        loop {
            let n = self.next_number();
            let name = format!("{}{}", self.stem, n);
            if !self.is_taken(&name) {
                return name;
            }
        }
    }

    fn next_number(&mut self) -> u32 {
        let n = self.counter;
        self.counter += 1;
        n
    }
}

/// A file that has been completely written, along with its sidecar record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedFile {
    pub record: InfRecord,
    pub blocks: usize,
}

struct OpenFile {
    record: InfRecord,
    data: Box<dyn Write>,
    inf: Box<dyn Write>,
    blocks: usize,
}

enum State {
    AwaitingFirstBlock,
    Writing(OpenFile),
    Done,
}

/// Stitches consecutive tape blocks back into files.  A block numbered zero
/// starts a new file; every other block is appended to the open file.
pub struct Reassembler<D: Destination> {
    destination: D,
    names: NameRegistry,
    state: State,
    extracted: Vec<ExtractedFile>,
}

impl<D: Destination> Reassembler<D> {
    pub fn new(destination: D, stem: &str) -> Reassembler<D> {
        Reassembler {
            destination,
            names: NameRegistry::new(stem),
            state: State::AwaitingFirstBlock,
            extracted: vec![],
        }
    }

    pub fn push(&mut self, block: &TapeBlock) -> io::Result<()> {
        let starts_file = match self.state {
            State::AwaitingFirstBlock => true,
            State::Writing(_) => block.is_first_block(),
            State::Done => return Err(TapeError::Finished.into()),
        };
        if starts_file {
            self.start_file(block)?;
        }

        if let State::Writing(ref mut file) = self.state {
            trace!(
                "{} block {} ({} bytes)",
                file.record.name,
                block.block_number,
                block.data.len()
            );
            if !block.data.is_empty() {
                let length = u32::try_from(block.data.len())
                    .ok()
                    .and_then(|n| file.record.length.checked_add(n))
                    .ok_or_else(|| TapeError::FileTooLarge.to_io_error())?;
                file.data.write_all(&block.data)?;
                file.record.length = length;
            }
            file.blocks += 1;
        }
        Ok(())
    }

    /// Complete the open file, if any.  No more blocks may be pushed.
    pub fn finish(&mut self) -> io::Result<Vec<ExtractedFile>> {
        if let State::Done = self.state {
            return Err(TapeError::Finished.into());
        }
        let result = self.finalize(None);
        self.state = State::Done;
        result?;
        Ok(mem::take(&mut self.extracted))
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Files completed so far.
    pub fn extracted(&self) -> &[ExtractedFile] {
        &self.extracted
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn into_destination(self) -> D {
        self.destination
    }

    fn start_file(&mut self, block: &TapeBlock) -> io::Result<()> {
        let name = self.names.resolve(&block.name);
        let (name, data) = match self.destination.create(&name) {
            Ok(data) => (name, data),
            Err(e) => {
                // One retry under a placeholder name; the tape name may not be
                // acceptable to the host filesystem.
                let placeholder = self.names.placeholder();
                warn!("can't create {:?} ({}), trying {:?}", name, e, placeholder);
                match self.destination.create(&placeholder) {
                    Ok(data) => (placeholder, data),
                    Err(e) => {
                        self.finalize(None)?;
                        self.state = State::Done;
                        return Err(e);
                    }
                }
            }
        };
        self.names.register(&name);
        self.finalize(Some(&name))?;

        let record = InfRecord::new(&name, block.load_address, block.exec_address);
        let mut inf = self.destination.create(&InfRecord::filename(&name))?;
        inf.write_all(record.header().as_bytes())?;
        debug!(
            "opened {} (load {:X}, exec {:X})",
            name, record.load_address, record.exec_address
        );
        self.state = State::Writing(OpenFile {
            record,
            data,
            inf,
            blocks: 0,
        });
        Ok(())
    }

    /// Close the open file and complete its sidecar, chaining it to `next`.
    fn finalize(&mut self, next: Option<&str>) -> io::Result<()> {
        let mut file = match mem::replace(&mut self.state, State::AwaitingFirstBlock) {
            State::Writing(file) => file,
            other => {
                self.state = other;
                return Ok(());
            }
        };
        file.record.next = next.map(str::to_string);
        file.data.flush()?;
        file.inf.write_all(file.record.trailer().as_bytes())?;
        file.inf.flush()?;
        debug!("closed {} ({} bytes)", file.record.name, file.record.length);
        self.extracted.push(ExtractedFile {
            record: file.record,
            blocks: file.blocks,
        });
        Ok(())
    }
}
