//! Command-line front-end for the splice engine.
//!
//! Compresses by default, decompresses with `-d`, and drives the file
//! entry points directly so every transfer benefits from the dispatcher's
//! strategy selection (including `SQUASH_MAP_SPLICE`).

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use squash_codecs::default_registry;
use squash_core::{CompressionLevel, Direction, Options, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "squash",
    version,
    about = "Compress or decompress files through a named codec"
)]
struct Args {
    /// Decompress instead of compress.
    #[arg(short = 'd', long)]
    decompress: bool,

    /// Codec to use.
    #[arg(short = 'k', long = "codec", default_value = "zstd")]
    codec: String,

    /// Compression level (1-22, interpreted per codec).
    #[arg(short = 'L', long)]
    level: Option<u32>,

    /// Number of uncompressed bytes to transfer (0 = the entire stream).
    #[arg(short = 'l', long, default_value_t = 0)]
    length: u64,

    /// List the available codecs and exit.
    #[arg(long)]
    list_codecs: bool,

    /// Input file.
    input: Option<PathBuf>,

    /// Output file.
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("squash: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let registry = default_registry();

    if args.list_codecs {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let (Some(input), Some(output)) = (&args.input, &args.output) else {
        return Err(squash_core::Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "an input and an output file are required",
        )));
    };

    let options = build_options(args.level)?;
    let direction = if args.decompress {
        Direction::Decompress
    } else {
        Direction::Compress
    };

    let mut src = File::open(input)?;
    let mut dst = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)?;

    registry.splice_with_options(
        &args.codec,
        direction,
        &mut dst,
        &mut src,
        args.length,
        options.as_ref(),
    )
}

fn build_options(level: Option<u32>) -> Result<Option<Options>> {
    let Some(level) = level else {
        return Ok(None);
    };
    let level = CompressionLevel::from_numeric(level)
        .map_err(|err| squash_core::Error::Codec(err.to_string()))?;
    Ok(Some(Options::builder().level(level).build()))
}
