//! The item type shared by every feed format.
//!
//! `FeedItem` is a single entry from an RSS or Atom document, normalised so
//! the store and the filesystem layer don't need to know which format
//! produced it.
//!
//! ## For contributors
//!
//! If you are adding a new feed format you do **not** need to modify this
//! file unless the format carries fields the rendered files should show.

use chrono::{DateTime, Utc};

/// A single feed entry, normalised from any feed format.
///
/// Items are immutable once fetched: the store hands out clones, and the
/// filesystem renders them into bytes exactly once per lookup.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FeedItem {
    /// Human-readable headline. Empty when the document had none; such items
    /// are rejected by the store.
    pub title: String,

    /// URL to the full content. Empty when the document had none.
    pub link: String,

    /// Publication timestamp.
    ///
    /// `None` means the source did not provide a date (or it could not be
    /// parsed).
    pub published: Option<DateTime<Utc>>,

    /// Full content (`<content:encoded>` / Atom `<content>`).
    pub content: Option<String>,

    /// Short summary (`<description>` / Atom `<summary>`).
    pub summary: Option<String>,
}

impl FeedItem {
    /// The text shown as the file body: full content if present, else the
    /// summary if present. Empty strings count as absent.
    pub fn body(&self) -> Option<&str> {
        non_empty(self.content.as_deref()).or_else(|| non_empty(self.summary.as_deref()))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// A fetched feed: its display title plus items in document order.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Feed {
    pub title: String,
    pub items: Vec<FeedItem>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
