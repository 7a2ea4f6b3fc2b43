//! datscan - A tool for searching and decoding FINAL FANTASY XI DAT files
//!
//! Usage:
//!   datscan <terms...>                 - Search the ROM directory and decode matches
//!   datscan search <terms...> [-a]     - Search, optionally every ROM directory
//!   datscan decode <path|id...>        - Decode files by path or FTABLE id
//!   datscan id <paths...>              - Show the FTABLE id of DAT paths
//!   datscan path <ids...>              - Show the DAT path of FTABLE ids

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use datscan::scan_utils::{decode_files, search_archive, show_ids, show_paths};
use datscan::ScanOptions;

#[derive(Parser)]
#[command(name = "datscan")]
#[command(version = "0.1.0")]
#[command(about = "Search and decode FINAL FANTASY XI DAT files", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    paths: PathArgs,

    /// Search terms (quick search mode); `\xHH` inserts a raw byte
    terms: Vec<String>,
}

#[derive(Args, Clone)]
struct PathArgs {
    /// Game directory containing ROM and FTABLE.DAT
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,
    /// Index table (default: <root>/FTABLE.DAT)
    #[arg(long, global = true)]
    ftable: Option<PathBuf>,
    /// Decoded output directory (default: <root>/DEC)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// Catalog file (default: <output>/decoded.txt)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
}

impl PathArgs {
    fn options(&self) -> ScanOptions {
        let mut options = ScanOptions::new(&self.root);
        options.index_path = self.ftable.clone();
        options.output_dir = self.output.clone();
        options.catalog_path = self.catalog.clone();
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search DAT files for text
    Search {
        /// Search terms; a file must contain all of them
        #[arg(required = true, num_args = 1..)]
        terms: Vec<String>,
        /// Search every ROM directory, not only ROM
        #[arg(short, long)]
        all: bool,
        /// Do not decode matching files
        #[arg(short = 'n', long)]
        no_decode: bool,
        /// Show every directory searched
        #[arg(short, long)]
        verbose: bool,
    },
    /// Decode DAT files given by path or FTABLE id
    Decode {
        /// Paths or file ids (decimal or 0x hex)
        #[arg(required = true, num_args = 1..)]
        targets: Vec<String>,
        /// Catalog the decoded files under this label
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Show the FTABLE id of DAT paths
    Id {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },
    /// Show the DAT path of FTABLE ids
    Path {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let options = cli.paths.options();

    match cli.command {
        Some(Commands::Search {
            terms,
            all,
            no_decode,
            verbose,
        }) => {
            let options = options
                .with_scan_all(all)
                .with_auto_decode(!no_decode)
                .with_verbose(verbose);
            search_archive(&options, &terms)?;
        }
        Some(Commands::Decode { targets, label }) => {
            decode_files(&options, &targets, label.as_deref())?;
        }
        Some(Commands::Id { paths }) => {
            show_ids(&options, &paths)?;
        }
        Some(Commands::Path { ids }) => {
            show_paths(&options, &ids)?;
        }
        None => {
            // Quick search mode
            if !cli.terms.is_empty() {
                search_archive(&options, &cli.terms)?;
            } else {
                eprintln!("Usage: datscan <terms...> [-r root]");
                eprintln!("       datscan search <terms...> [-a] [-n] [-v] [-r root]");
                eprintln!("       datscan decode <path|id...> [-l label]");
                eprintln!("       datscan id <paths...>");
                eprintln!("       datscan path <ids...>");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
