//! Debug CLI: loads integer keys from files into a B+ tree and prints it.
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use pageindex::primitives::io::{FileDisk, MemDisk};
use pageindex::primitives::pager::{BufferManager, BufferPool, BufferPoolOptions};
use pageindex::storage::btree::{
    BPlusTree, BPlusTreeOptions, GenericComparator, GenericKey, RecordId,
};
use pageindex::storage::header::HeaderPage;
use pageindex::types::page::DEFAULT_PAGE_SIZE;
use pageindex::types::{PageId, Result};
use tracing_subscriber::EnvFilter;

const INDEX_NAME: &str = "keys";

type KeyIndex = BPlusTree<GenericKey<8>, RecordId, GenericComparator<8>>;

#[derive(Parser, Debug)]
#[command(
    name = "pageindex",
    version,
    about = "Load integer keys into a paged B+ tree and print it",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert and remove keys read from files, then print the tree
    Load(LoadCmd),
}

#[derive(Args, Debug)]
struct LoadCmd {
    #[arg(long, value_name = "FILE", help = "Whitespace-separated integers to insert")]
    insert: PathBuf,

    #[arg(
        long,
        value_name = "FILE",
        help = "Whitespace-separated integers to remove afterwards"
    )]
    remove: Option<PathBuf>,

    #[arg(long, help = "Print every entry in key order")]
    scan: bool,

    #[arg(long, help = "Show page ids, parents, values and leaf links in the dump")]
    verbose: bool,

    #[arg(long, value_name = "N", help = "Maximum entries per leaf page")]
    leaf_max: Option<usize>,

    #[arg(long, value_name = "N", help = "Maximum children per internal page")]
    internal_max: Option<usize>,

    #[arg(long, value_name = "N", default_value_t = 64, help = "Buffer pool frames")]
    pool_size: usize,

    #[arg(
        long,
        value_name = "BYTES",
        default_value_t = DEFAULT_PAGE_SIZE,
        help = "Page size in bytes"
    )]
    page_size: usize,

    #[arg(
        long,
        value_name = "PATH",
        env = "PAGEINDEX_DB",
        help = "Back the tree with this file instead of memory"
    )]
    db: Option<PathBuf>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Load(cmd) => run_load(cmd),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_load(cmd: LoadCmd) -> Result<()> {
    let pool_options = BufferPoolOptions {
        pool_size: cmd.pool_size,
        ..BufferPoolOptions::default()
    };
    let (pool, existing) = match &cmd.db {
        Some(path) => {
            let disk = FileDisk::open(path, cmd.page_size)?;
            let existing = disk.page_count() > 0;
            (BufferPool::shared(disk, pool_options)?, existing)
        }
        None => (
            BufferPool::shared(MemDisk::new(cmd.page_size)?, pool_options)?,
            false,
        ),
    };
    let manager: Arc<dyn BufferManager> = pool;
    // the registry is the first page of a file
    let registry = if existing {
        HeaderPage::open(manager.clone(), PageId(0))?
    } else {
        HeaderPage::create(manager.clone())?
    };

    let mut tree: KeyIndex = BPlusTree::open(
        INDEX_NAME,
        manager.clone(),
        Arc::new(registry),
        GenericComparator,
        BPlusTreeOptions {
            leaf_max_size: cmd.leaf_max,
            internal_max_size: cmd.internal_max,
        },
    )?;

    let inserted = tree.insert_from_file(&cmd.insert)?;
    let removed = match &cmd.remove {
        Some(path) => tree.remove_from_file(path)?,
        None => 0,
    };

    print!("{}", tree.dump(cmd.verbose)?);
    if cmd.scan {
        for item in tree.iter()? {
            let (key, value) = item?;
            println!("{key} {value}");
        }
    }
    let summary = tree.check_integrity()?;
    println!(
        "inserted {inserted}, removed {removed}, entries {}, height {}, pages {}",
        summary.entries,
        summary.height,
        summary.leaf_pages + summary.internal_pages
    );
    let stats = tree.stats_snapshot();
    println!(
        "splits {}/{}, merges {}/{}, redistributions {}/{}",
        stats.leaf_splits,
        stats.internal_splits,
        stats.leaf_merges,
        stats.internal_merges,
        stats.leaf_redistributions,
        stats.internal_redistributions
    );
    tree.stats().emit_tracing();

    if cmd.db.is_some() {
        manager.flush_all()?;
    }
    Ok(())
}
