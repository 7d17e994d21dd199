//! The item store: the authoritative mapping from file base name to feed
//! item.
//!
//! A single [`RwLock`] guards both the mapping and the feed title. Refresh
//! holds the write guard for the whole fetch+populate sequence, so readers
//! never observe a half-built mapping; lookups and listings take the read
//! guard just long enough to clone out what they need.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::source::{FeedItem, FeedSource};

/// Turn an item title into a file base name.
///
/// Every `/` becomes `-` and surrounding whitespace is trimmed. Total; the
/// result may be empty, in which case the item is not stored.
pub fn sanitize(title: &str) -> String {
    title.replace('/', "-").trim().to_string()
}

/// A feed item paired with the base name it is exposed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedItem {
    /// Never empty.
    pub file_base_name: String,
    pub item: FeedItem,
}

#[derive(Debug, Default)]
struct StoreState {
    items: HashMap<String, NamedItem>,
    feed_name: String,
}

/// Thread-safe store of the current feed's items.
#[derive(Debug, Default)]
pub struct ItemStore {
    state: RwLock<StoreState>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch `url` through `source` and replace the mapping with its items.
    ///
    /// Returns the number of items stored. On error the previous mapping
    /// and feed name are left untouched.
    pub fn refresh(&self, source: &dyn FeedSource, url: &str) -> Result<usize, FetchError> {
        let mut state = self.write();

        let feed = source.fetch(url)?;

        let mut items = HashMap::with_capacity(feed.items.len());
        let mut skipped = 0usize;
        for item in feed.items {
            if item.title.is_empty() {
                debug!("skipping item with missing title");
                skipped += 1;
                continue;
            }
            let file_base_name = sanitize(&item.title);
            if file_base_name.is_empty() {
                debug!(title = %item.title, "skipping item whose sanitized title is empty");
                skipped += 1;
                continue;
            }
            if items.contains_key(&file_base_name) {
                warn!(name = %file_base_name, "duplicate sanitized file name, overwriting");
            }
            items.insert(
                file_base_name.clone(),
                NamedItem {
                    file_base_name,
                    item,
                },
            );
        }

        let count = items.len();
        info!(feed = %feed.title, stored = count, skipped, "refreshed feed");
        state.feed_name = feed.title;
        state.items = items;
        Ok(count)
    }

    /// Find the item stored under `file_base_name`.
    pub fn lookup(&self, file_base_name: &str) -> Option<NamedItem> {
        self.read().items.get(file_base_name).cloned()
    }

    /// Snapshot of every stored base name, in no particular order.
    pub fn list(&self) -> Vec<String> {
        self.read().items.keys().cloned().collect()
    }

    /// Display title of the most recently fetched feed (empty before the
    /// first successful refresh).
    pub fn feed_name(&self) -> String {
        self.read().feed_name.clone()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
