//! Alembic transform dump
//!
//! Prints the local and world matrices and the transform operations of every
//! transform node in an Alembic archive, optionally restricted to the subtrees
//! of nodes whose name contains a filter.
//!
//! Set `RUST_LOG=debug` to see archive details on stderr.

#![forbid(unsafe_code)]

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use abcxform::{Archive, DumpConfig, Dumper, SampleSelector};
use clap::Parser;
use clap::error::ErrorKind;

/// Command-line arguments for the transform dump
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the Alembic archive
    #[arg(value_name = "FILE")]
    archive: PathBuf,

    /// Only dump subtrees of transforms whose name contains this text
    #[arg(value_name = "FILTER", allow_hyphen_values = true)]
    filter: Option<String>,

    /// Further arguments are accepted and ignored
    #[arg(hide = true, num_args = 0.., trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,

    /// Sample index to read (clamped to each transform's last sample)
    #[arg(short, long, value_name = "INDEX", conflicts_with = "time")]
    sample: Option<usize>,

    /// Time in seconds; each transform reads its sample at or before it
    #[arg(short, long, value_name = "SECONDS")]
    time: Option<f64>,
}

impl Args {
    fn dump_config(&self) -> DumpConfig {
        let selector = match (self.sample, self.time) {
            (_, Some(time)) => SampleSelector::Time(time),
            (Some(index), None) => SampleSelector::Index(index),
            (None, None) => SampleSelector::default(),
        };
        DumpConfig::new()
            .with_filter(self.filter.clone().unwrap_or_default())
            .with_selector(selector)
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = err.print();
                return ExitCode::SUCCESS;
            }
            ErrorKind::MissingRequiredArgument => {
                let program = std::env::args().next().unwrap_or_else(|| "abcxform".to_string());
                eprintln!("Usage: {} <file.abc> [filter]", program);
                return ExitCode::from(1);
            }
            _ => err.exit(),
        },
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> abcxform::Result<()> {
    if !args.extra.is_empty() {
        log::debug!("Ignoring extra arguments: {:?}", args.extra);
    }
    let archive = Archive::open(&args.archive)?;
    log::debug!(
        "Archive version {}, library version {}",
        archive.archive_version(),
        archive.library_version()
    );

    let stdout = io::stdout();
    let mut dumper = Dumper::new(BufWriter::new(stdout.lock()), args.dump_config());
    dumper.run(&archive)
}
