//! Background feed refresh.
//!
//! Optional: by default the feed is fetched once, at mount. When an interval
//! is configured, a dedicated thread refreshes the store on a timer until the
//! returned [`Poller`] is dropped.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::source::FeedSource;
use crate::store::ItemStore;

/// Handle to the refresh thread. Dropping it stops the thread.
pub struct Poller {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

/// Spawn the background refresh thread.
///
/// The first refresh happens one `interval` after spawning; the mount-time
/// refresh has already run by then.
pub fn spawn(
    store: Arc<ItemStore>,
    source: Arc<dyn FeedSource>,
    url: String,
    interval: Duration,
) -> Poller {
    let (tx, rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || loop {
        match rx.recv_timeout(interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => match store.refresh(source.as_ref(), &url) {
                Ok(count) => info!(count, "periodic refresh complete"),
                Err(e) => warn!(url = %url, "periodic refresh failed: {e}"),
            },
            // Stop requested, or the handle is gone.
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    });

    Poller {
        stop: Some(tx),
        handle: Some(handle),
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
