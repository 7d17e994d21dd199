//! Feed source abstraction layer.
//!
//! This module defines the [`FeedSource`] trait and the common [`Feed`] /
//! [`FeedItem`] types. The HTTP implementation, which understands both RSS
//! and Atom, lives in [`http`].
//!
//! ## For contributors — adding a new source
//!
//! 1. Create a new file in this directory (e.g. `file.rs` for local feeds).
//! 2. Define a struct and implement [`FeedSource`] for it.
//! 3. Add `mod file;` below and re-export your struct in the `pub use` block.
//! 4. Construct an instance in `main.rs` in place of [`HttpFeedSource`].
//!
//! The store, the refresh thread and the filesystem are all source-agnostic.

mod feed_item;
mod http;

pub use feed_item::{Feed, FeedItem};
pub use http::HttpFeedSource;

use crate::error::FetchError;

/// Trait that every feed source must implement.
///
/// [`ItemStore::refresh`](crate::store::ItemStore::refresh) calls
/// [`fetch()`](FeedSource::fetch) while holding the store's write lock, and
/// the optional refresh thread shares the source with the filesystem, so
/// implementations must be [`Send`] + [`Sync`].
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`.
    ///
    /// Any timeout is the implementation's business; the store waits for as
    /// long as this call takes.
    fn fetch(&self, url: &str) -> Result<Feed, FetchError>;
}
