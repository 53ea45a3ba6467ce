//! arc-tool
//!
//! Inspect, validate and index ARC containers from the command line.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use arcstore::index::{index_all, write_cdx, write_cdx_file};
use arcstore::reader::FileTransport;
use arcstore::{ArcReader, IndexOptions, ReaderOptions, Record, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// ARC container tool
#[derive(Parser, Debug)]
#[command(name = "arc-tool")]
#[command(about = "Inspect, validate and index ARC web archive containers")]
#[command(version)]
struct Args {
    /// Reject any header anomaly instead of repairing it
    #[arg(long, global = true)]
    strict: bool,

    /// Skip SHA-1 digesting of payloads
    #[arg(long, global = true)]
    no_digest: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a CDX listing
    Cdx {
        /// Container path or file:// location
        container: String,

        /// Write <stem>.cdx next to the container instead of stdout
        #[arg(long)]
        file: bool,
    },

    /// Dump records (header line and body) to stdout
    Dump {
        container: String,

        /// Only the record at this offset
        #[arg(short, long)]
        offset: Option<u64>,
    },

    /// Print record header lines
    Header {
        container: String,

        #[arg(short, long)]
        offset: Option<u64>,

        /// Also print the parsed HTTP status line and headers
        #[arg(long)]
        parse: bool,
    },

    /// Dump record bodies with the HTTP headers stripped
    Nohead {
        container: String,

        #[arg(short, long)]
        offset: Option<u64>,
    },

    /// Read every record and report anomalies
    Validate { container: String },

    /// Build wide CDX (.wcdx.gz) indexes
    Index {
        /// Containers to index
        #[arg(required = true)]
        containers: Vec<PathBuf>,

        /// Write index files here instead of next to each container
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Worker threads (0 = one per container, at most 4)
        #[arg(long, default_value = "0")]
        threads: usize,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,arcstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut options = if args.strict {
        ReaderOptions::strict()
    } else {
        ReaderOptions::default()
    };
    options = options.with_digest(!args.no_digest);

    let result = match args.command {
        Commands::Cdx { container, file } => cdx(&container, file, options),
        Commands::Dump { container, offset } => each_record(&container, offset, options, dump),
        Commands::Header {
            container,
            offset,
            parse,
        } => each_record(&container, offset, options, |record, out| {
            print_header(record, out, parse)
        }),
        Commands::Nohead { container, offset } => each_record(&container, offset, options, nohead),
        Commands::Validate { container } => validate(&container, options),
        Commands::Index {
            containers,
            output_dir,
            threads,
        } => index(&containers, IndexOptions { output_dir, threads }),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn open(container: &str, offset: u64, options: ReaderOptions) -> Result<ArcReader> {
    if container.starts_with("file://") {
        ArcReader::open_remote(&FileTransport::new(), container, offset, options)
    } else {
        ArcReader::open_path(Path::new(container), offset, options)
    }
}

/// Run `action` on the record at `offset`, or on every record.
fn each_record<F>(
    container: &str,
    offset: Option<u64>,
    options: ReaderOptions,
    mut action: F,
) -> Result<()>
where
    F: FnMut(&mut Record<'_>, &mut dyn Write) -> Result<()>,
{
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut reader = open(container, offset.unwrap_or(0), options)?;
    match offset {
        Some(offset) => {
            let mut record = reader.record_at(offset)?;
            action(&mut record, &mut out)?;
        }
        None => {
            while let Some(mut record) = reader.next_record()? {
                action(&mut record, &mut out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn dump(record: &mut Record<'_>, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", record.header().header_line)?;
    record.dump(out)?;
    writeln!(out)?;
    Ok(())
}

fn nohead(record: &mut Record<'_>, out: &mut dyn Write) -> Result<()> {
    record.skip_http_header();
    record.dump(out)?;
    Ok(())
}

fn print_header(record: &mut Record<'_>, out: &mut dyn Write, parse: bool) -> Result<()> {
    let header = record.header();
    writeln!(
        out,
        "{} (offset {}, version {})",
        header.header_line, header.offset, header.version
    )?;
    if parse {
        if let Some(http) = record.http_header() {
            writeln!(out, "  {}", http.status_line)?;
            for (name, value) in &http.headers {
                writeln!(out, "  {}: {}", name, value)?;
            }
        }
    }
    Ok(())
}

fn cdx(container: &str, to_file: bool, options: ReaderOptions) -> Result<()> {
    let mut reader = open(container, 0, options.with_digest(true))?;
    if to_file {
        let path = write_cdx_file(&mut reader, Path::new(container))?;
        println!("{}", path.display());
        return Ok(());
    }
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_cdx(&mut reader, &mut out)?;
    Ok(())
}

fn validate(container: &str, options: ReaderOptions) -> Result<()> {
    let mut reader = open(container, 0, options)?;
    let report = reader.validate();
    println!("{}: {} records", container, report.headers.len());
    for problem in &report.problems {
        println!("  {}", problem);
    }
    if report.is_clean() {
        println!("valid");
        Ok(())
    } else {
        Err(arcstore::ArcError::Config(format!(
            "{} problem(s) found in {}",
            report.problems.len(),
            container
        )))
    }
}

fn index(containers: &[PathBuf], options: IndexOptions) -> Result<()> {
    let summary = index_all(containers, &options);
    for outcome in &summary.indexed {
        println!("{} {}", outcome.path.display(), outcome.lines);
    }
    for (container, error) in &summary.failed {
        eprintln!("FAILED {}: {}", container.display(), error);
    }
    if summary.all_succeeded() {
        Ok(())
    } else {
        Err(arcstore::ArcError::Config(format!(
            "{} of {} containers failed to index",
            summary.failed.len(),
            containers.len()
        )))
    }
}
