extern crate clap;
extern crate uef;

use clap::{App, Arg, ArgMatches};
use std::io::{self, Write};
use std::process;

use tracing_subscriber::EnvFilter;
use uef::tape::{self, DirectoryDestination, Reassembler, TapeBlock, DEFAULT_STEM};

// Possible exit codes
static _EXIT_SUCCESS: i32 = 0;
static EXIT_FAILURE: i32 = 1;

fn main() {
    // Parse command-line arguments
    let app = App::new("UEF Tape Archive Extractor")
        .version("0.1.0")
        .about(
            "Decode the files in a UEF tape archive and save them to a directory, \
             each with an INF file giving its load address, execution address, \
             and length.",
        )
        .arg(
            Arg::with_name("uef_file")
                .required(true)
                .help("UEF archive, optionally gzip-compressed"),
        )
        .arg(
            Arg::with_name("destination")
                .required_unless("list")
                .help("Directory to write files into (created if missing)"),
        )
        .arg(
            Arg::with_name("list")
                .short("l")
                .long("list")
                .help("List the names of the files without extracting them"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Show each block as it is decoded (-vv for a hex dump)"),
        )
        .arg(
            Arg::with_name("name")
                .short("n")
                .long("name")
                .takes_value(true)
                .value_name("stem")
                .default_value(DEFAULT_STEM)
                .help("Write files without names as <stem><number>"),
        );

    let matches = app.get_matches();
    let verbosity = matches.occurrences_of("verbose");
    init_logging(verbosity);

    let result = run(&matches, verbosity);
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(EXIT_FAILURE);
    }
}

fn run(matches: &ArgMatches, verbosity: u64) -> io::Result<()> {
    let uef_file = matches.value_of("uef_file").unwrap();
    if matches.is_present("list") {
        cmd_list(uef_file, verbosity)
    } else {
        cmd_extract(
            uef_file,
            matches.value_of("destination").unwrap(),
            matches.value_of("name").unwrap_or(DEFAULT_STEM),
            verbosity,
        )
    }
}

/// Library events go to stderr.  `RUST_LOG` takes precedence over -v.
fn init_logging(verbosity: u64) {
    let default_level = match verbosity {
        0 | 1 => "warn",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

/// Prints per-block progress: each file's name followed by its block numbers.
struct Progress {
    verbosity: u64,
    started: bool,
}

impl Progress {
    fn new(verbosity: u64) -> Progress {
        Progress {
            verbosity,
            started: false,
        }
    }

    fn block(&mut self, block: &TapeBlock) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match self.verbosity {
            0 => {}
            1 => {
                if block.is_first_block() || !self.started {
                    if self.started {
                        writeln!(out)?;
                    }
                    write!(out, "{} ", block.name)?;
                    self.started = true;
                }
                write!(out, "{:X} ", block.block_number)?;
                out.flush()?;
            }
            _ => {
                writeln!(out, "{:#}", block)?;
                block.dump(&mut out)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.started {
            writeln!(io::stdout())?;
        }
        Ok(())
    }
}

fn cmd_list(uef_file: &str, verbosity: u64) -> io::Result<()> {
    let image = tape::open_file(uef_file)?;
    let mut container = tape::open(&image)?;
    if verbosity == 0 {
        for block in tape::list(&mut container)? {
            writeln!(io::stdout(), "{}", block.name)?;
        }
        return Ok(());
    }

    writeln!(io::stdout(), "UEF version {}", container.version())?;
    let mut progress = Progress::new(verbosity);
    for block in tape::blocks(&mut container) {
        progress.block(&block?)?;
    }
    progress.finish()
}

fn cmd_extract(uef_file: &str, destination: &str, stem: &str, verbosity: u64) -> io::Result<()> {
    let image = tape::open_file(uef_file)?;
    let mut container = tape::open(&image)?;

    if DirectoryDestination::prepare(destination)? {
        writeln!(io::stdout(), "Created directory {}", destination)?;
    }

    let mut reassembler = Reassembler::new(DirectoryDestination::new(destination), stem);
    let mut progress = Progress::new(verbosity);
    for block in tape::blocks(&mut container) {
        let block = block?;
        progress.block(&block)?;
        reassembler.push(&block)?;
    }
    progress.finish()?;

    for file in reassembler.finish()? {
        writeln!(io::stdout(), "{}", file.record)?;
    }
    Ok(())
}
