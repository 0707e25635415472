use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sir_codecs::codec_for;
use sir_core::format::read_header;
use sir_core::{FileStream, ReadSeek, Reader as ReaderTrait, Stream as StreamTrait};

#[derive(Parser)]
#[command(
    name = "sir",
    about = "Inspect and print records stored in a SIR container",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header metadata: compression, content length, index-table
    /// offset, and first-block offset.
    Inspect {
        /// SIR file to inspect
        file: PathBuf,
    },
    /// Dump records from a SIR container, starting from the first block.
    Print {
        /// SIR file to read
        file: PathBuf,
        /// Print each record as hex instead of as a lossy UTF-8 string
        #[arg(short = 'x', long)]
        hex: bool,
        /// Stop after this many records
        #[arg(long)]
        size: Option<u64>,
        /// Pause for input after this many records
        #[arg(long, default_value_t = 5)]
        each: u64,
    },
}

/// Open a file, peek its header to pick a bundled codec, and build the
/// positional `FileStream` over it.
fn open_stream(path: &PathBuf) -> anyhow::Result<FileStream> {
    let mut probe = File::open(path).with_context(|| format!("opening {:?}", path))?;
    let header = read_header(&mut probe)?;
    let codec = codec_for(header.compression)?;

    let path = path.clone();
    let stream = FileStream::open_file_with_codec(
        move || {
            let f = File::open(&path)?;
            Ok(Box::new(f) as Box<dyn ReadSeek + Send>)
        },
        codec,
    )
    .with_context(|| "opening SIR container")?;
    Ok(stream)
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let stream = open_stream(&file)?;
    let header = stream.header();

    println!("compression        : {:?}", header.compression);
    println!("content length     : {}", header.content_length);
    println!("index table offset : {}", header.index_table_offset);
    println!("first block offset : {}", header.first_block_offset);
    if !header.metadata.is_empty() {
        println!("metadata bytes     : {}", header.metadata.len());
    }
    Ok(())
}

fn run_print(file: PathBuf, hex: bool, size: Option<u64>, each: u64) -> anyhow::Result<()> {
    let stream = open_stream(&file)?;
    let mut reader = stream.reader(0);

    let cap = size.unwrap_or(u64::MAX);
    let mut printed = 0u64;
    let mut since_pause = 0u64;

    'blocks: while let Some(records) = reader.next()? {
        for record in records {
            if printed >= cap {
                break 'blocks;
            }
            if hex {
                let line: String = record.iter().map(|b| format!("{b:02x}")).collect();
                println!("{line}");
            } else {
                println!("{}", String::from_utf8_lossy(&record));
            }
            printed += 1;
            since_pause += 1;

            if each > 0 && since_pause >= each && printed < cap {
                since_pause = 0;
                eprint!("-- more ({printed} printed) -- press Enter to continue -- ");
                io::stderr().flush()?;
                let mut line = String::new();
                io::stdin().read_line(&mut line)?;
            }
        }
    }

    println!("EOF");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { file } => run_inspect(file),
        Commands::Print {
            file,
            hex,
            size,
            each,
        } => run_print(file, hex, size, each),
    }
}
