//! feedfs — an RSS/Atom feed mounted as a read-only directory of text files.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  fetch()  ┌──────────┐  lookup/list  ┌──────────┐  callbacks  ┌────────┐
//! │ source/  │ ◄──────── │ store.rs │ ◄──────────── │ node.rs  │ ◄────────── │ fuse.rs│ ◄── kernel
//! │ (HTTP)   │           │ (RwLock) │               │ (render) │             │(fuser) │
//! └──────────┘           └──────────┘               └──────────┘             └────────┘
//!                              ▲
//!                              │ refresh() on a timer (optional)
//!                         ┌──────────┐
//!                         │ poll.rs  │
//!                         └──────────┘
//! ```
//!
//! * **`source/`** — the `FeedSource` trait and the HTTP implementation
//!   (RSS 2.0 and Atom).
//! * **`store`** — name → item mapping, title sanitisation, refresh.
//! * **`render`** — turns an item into the text of its file.
//! * **`node`** — the root directory and item-file nodes, transport-free.
//! * **`fuse`** — `fuser::Filesystem` glue and inode bookkeeping.
//! * **`poll`** — optional background refresh thread.
//! * **`main`** — parse args, set up logging, mount, wait for Ctrl-C.

mod error;
mod fuse;
mod node;
mod poll;
mod render;
mod source;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fuser::MountOption;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fuse::FeedFs;
use node::RootDir;
use source::{FeedSource, HttpFeedSource};
use store::ItemStore;

const DEFAULT_FEED_URL: &str = "https://ysws.hackclub.com/feed.xml";

/// Mount an RSS/Atom feed as a directory with one text file per item.
#[derive(Parser, Debug)]
#[command(name = "feedfs", version)]
struct Args {
    /// Directory to mount the feed on
    mountpoint: PathBuf,

    /// URL of the RSS/Atom feed to fetch
    #[arg(long, default_value = DEFAULT_FEED_URL)]
    feed: String,

    /// Re-fetch the feed every N seconds (default: only at mount)
    #[arg(long, value_name = "N")]
    refresh_secs: Option<u64>,

    /// HTTP timeout for fetching the feed, in seconds
    #[arg(long, value_name = "N", default_value_t = 30)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Unmount automatically when the process exits (fuser adds allow_other
    /// for this, so non-root users need user_allow_other in /etc/fuse.conf)
    #[arg(long)]
    auto_unmount: bool,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn mount_options(args: &Args) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName(format!("rss:{}", args.feed)),
        MountOption::Subtype("feedfs".to_string()),
        MountOption::DefaultPermissions,
    ];
    if args.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    options
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    // -- wire up the store and its data source -------------------------------
    let store = Arc::new(ItemStore::new());
    let source: Arc<dyn FeedSource> = Arc::new(
        HttpFeedSource::new(Duration::from_secs(args.timeout_secs))
            .context("failed to build HTTP client")?,
    );
    let root = RootDir::new(Arc::clone(&store), Arc::clone(&source), args.feed.clone());

    // -- mount (the first refresh runs inside the session's init) ------------
    let session = fuser::spawn_mount2(FeedFs::new(root), &args.mountpoint, &mount_options(&args))
        .with_context(|| format!("mount failed at {}", args.mountpoint.display()))?;
    info!(mountpoint = %args.mountpoint.display(), "filesystem mounted");

    // -- optional periodic refresh -------------------------------------------
    let poller = args
        .refresh_secs
        .filter(|&secs| secs > 0)
        .map(|secs| poll::spawn(store, source, args.feed.clone(), Duration::from_secs(secs)));

    // -- wait for Ctrl-C -------------------------------------------------------
    info!("press ctrl+c to unmount");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for ctrl+c")?;

    drop(poller);
    // Dropping the session unmounts.
    drop(session);
    info!("filesystem unmounted");
    Ok(())
}
