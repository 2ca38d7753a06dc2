mod commands;
///! shelfctl - command line front end for the LibreShelf core
///!
///! Inspects local books and talks to the remote sources listed in the
///! configuration file.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use libreshelf::utils::logging::init_logging;
use libreshelf::ShelfConfig;

#[derive(Parser)]
#[command(name = "shelfctl", version)]
#[command(about = "Inspect e-books and browse remote library sources", long_about = None)]
struct Cli {
    /// Configuration file (default: $LIBRESHELF_CONFIG or the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show format, unit count and metadata of a book
    Info {
        file: PathBuf,
    },
    /// Extract one chapter (markup) or page (PNG)
    Page {
        file: PathBuf,
        /// Zero-based chapter or page index
        index: usize,
        /// Output file; markup goes to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// PDF render scale (default from [reader] default_scale)
        #[arg(short, long)]
        scale: Option<f32>,
    },
    /// Write a cover thumbnail of a comic or PDF as PNG
    Cover {
        file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
    /// List configured remote sources
    Sources,
    /// List a directory of a remote source
    Ls {
        /// Source id or name
        source: String,
        #[arg(default_value = "")]
        path: String,
    },
    /// Download a file from a remote source
    Get {
        source: String,
        remote_path: String,
        /// Destination (default: the remote file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that a remote source is reachable and accepts the credentials
    Test {
        source: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ShelfConfig::load_or_default(cli.config.as_deref());

    match cli.command {
        Command::Info { file } => commands::info(&config, &file),
        Command::Page {
            file,
            index,
            output,
            scale,
        } => commands::page(&config, &file, index, output.as_deref(), scale),
        Command::Cover {
            file,
            output,
            width,
            height,
        } => commands::cover(&config, &file, &output, width, height),
        Command::Sources => {
            commands::sources(&config);
            Ok(())
        }
        Command::Ls { source, path } => commands::list(&config, &source, &path).await,
        Command::Get {
            source,
            remote_path,
            output,
        } => commands::get(&config, &source, &remote_path, output).await,
        Command::Test { source } => commands::test(&config, &source).await,
    }
}
