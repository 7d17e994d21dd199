//! Filesystem nodes, independent of the FUSE transport.
//!
//! There are exactly two kinds of node: the single root directory
//! ([`RootDir`]), which lists and looks up items from the [`ItemStore`], and
//! one [`FeedFile`] per successful lookup, holding that item's rendered
//! bytes. [`Node`] is the tagged variant the transport dispatches through.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::{FetchError, FsError, FsResult};
use crate::render;
use crate::source::FeedSource;
use crate::store::{ItemStore, NamedItem};

/// Every visible file name ends with this.
pub const FILE_SUFFIX: &str = ".txt";

/// Permission bits of the root directory (r-x for everyone).
pub const DIR_PERM: u16 = 0o555;

/// Permission bits of every item file (r-- for everyone).
pub const FILE_PERM: u16 = 0o444;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// Attributes reported for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    pub kind: NodeKind,
    pub perm: u16,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

// ---------------------------------------------------------------------------
// Root directory
// ---------------------------------------------------------------------------

/// The flat root directory. Reads go through the store; the only writer is
/// [`refresh`](RootDir::refresh).
pub struct RootDir {
    store: Arc<ItemStore>,
    source: Arc<dyn FeedSource>,
    feed_url: String,
}

impl RootDir {
    pub fn new(
        store: Arc<ItemStore>,
        source: Arc<dyn FeedSource>,
        feed_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            source,
            feed_url: feed_url.into(),
        }
    }

    /// Refresh the store from the configured feed URL.
    pub fn refresh(&self) -> Result<usize, FetchError> {
        self.store.refresh(self.source.as_ref(), &self.feed_url)
    }

    /// Called once when the filesystem is mounted. A failed fetch is logged
    /// and the directory simply stays as it was.
    pub fn on_mount(&self) {
        info!(url = %self.feed_url, "fetching feed");
        match self.refresh() {
            Ok(count) => info!(
                count,
                feed = %self.store.feed_name(),
                "successfully fetched feed"
            ),
            Err(e) => warn!(
                url = %self.feed_url,
                kept = self.store.len(),
                "error fetching feed: {e}"
            ),
        }
    }

    pub fn attributes(&self) -> NodeAttr {
        let now = SystemTime::now();
        NodeAttr {
            kind: NodeKind::Directory,
            perm: DIR_PERM,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// One regular-file entry per stored item, in no particular order.
    pub fn list_entries(&self) -> Vec<DirEntry> {
        let entries: Vec<DirEntry> = self
            .store
            .list()
            .into_iter()
            .map(|base| DirEntry {
                name: format!("{base}{FILE_SUFFIX}"),
                kind: NodeKind::File,
            })
            .collect();
        debug!(count = entries.len(), "readdir");
        entries
    }

    /// Resolve `name` to a freshly rendered file.
    pub fn lookup(&self, name: &str) -> FsResult<(FeedFile, NodeAttr)> {
        let Some(base) = name.strip_suffix(FILE_SUFFIX) else {
            debug!(name, "lookup: missing {FILE_SUFFIX} suffix");
            return Err(FsError::not_found(name));
        };
        let Some(named) = self.store.lookup(base) else {
            debug!(name, base, "lookup: no such item");
            return Err(FsError::not_found(name));
        };
        debug!(name, base = %named.file_base_name, "lookup: found");

        let file = FeedFile::from_item(&named);
        let attr = file.attributes();
        Ok((file, attr))
    }
}

// ---------------------------------------------------------------------------
// Item file
// ---------------------------------------------------------------------------

/// A read-only file whose bytes were rendered once, at lookup.
#[derive(Debug, Clone)]
pub struct FeedFile {
    content: Vec<u8>,
    modified: SystemTime,
}

impl FeedFile {
    pub fn from_item(named: &NamedItem) -> Self {
        let modified = named
            .item
            .published
            .map(SystemTime::from)
            .unwrap_or_else(SystemTime::now);
        Self {
            content: render::render(&named.item),
            modified,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Modification and change times are the item's publish time (or the
    /// node's creation time when it has none); access time is now.
    pub fn attributes(&self) -> NodeAttr {
        NodeAttr {
            kind: NodeKind::File,
            perm: FILE_PERM,
            size: self.content().len() as u64,
            atime: SystemTime::now(),
            mtime: self.modified,
            ctime: self.modified,
        }
    }

    /// Content is already resident; opening never fails and does no I/O.
    pub fn open(&self) {}

    /// Up to `len` bytes starting at `offset`. Reading at or past the end
    /// yields an empty slice.
    pub fn read(&self, offset: i64, len: usize) -> FsResult<&[u8]> {
        let start = usize::try_from(offset).map_err(|_| FsError::InvalidArgument(offset))?;
        if start >= self.content.len() {
            return Ok(&[]);
        }
        let end = start.saturating_add(len).min(self.content.len());
        Ok(&self.content[start..end])
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// A node as seen by the transport.
#[derive(Clone, Copy)]
pub enum Node<'a> {
    Dir(&'a RootDir),
    File(&'a FeedFile),
}

impl<'a> Node<'a> {
    pub fn attributes(&self) -> NodeAttr {
        match *self {
            Node::Dir(dir) => dir.attributes(),
            Node::File(file) => file.attributes(),
        }
    }

    pub fn open(&self) -> FsResult<()> {
        match *self {
            Node::Dir(_) => Ok(()),
            Node::File(file) => {
                file.open();
                Ok(())
            }
        }
    }

    pub fn read(&self, offset: i64, len: usize) -> FsResult<&'a [u8]> {
        match *self {
            Node::Dir(_) => Err(FsError::IsADirectory),
            Node::File(file) => file.read(offset, len),
        }
    }

    pub fn lookup(&self, name: &str) -> FsResult<(FeedFile, NodeAttr)> {
        match *self {
            Node::Dir(dir) => dir.lookup(name),
            Node::File(_) => Err(FsError::NotADirectory),
        }
    }

    pub fn list_entries(&self) -> FsResult<Vec<DirEntry>> {
        match *self {
            Node::Dir(dir) => Ok(dir.list_entries()),
            Node::File(_) => Err(FsError::NotADirectory),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::source::FeedItem;
    use crate::store::tests::{feed, item, ScriptedSource};

    fn mounted(items: Vec<FeedItem>) -> RootDir {
        let store = Arc::new(ItemStore::new());
        let source = Arc::new(ScriptedSource::single(feed(items)));
        let root = RootDir::new(store, source, "http://feed");
        root.on_mount();
        root
    }

    fn read_all(file: &FeedFile) -> String {
        let mut out = Vec::new();
        let mut offset = 0i64;
        loop {
            let chunk = file.read(offset, 7).unwrap();
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(chunk);
            offset += chunk.len() as i64;
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn end_to_end_hello_world() {
        let published = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let root = mounted(vec![FeedItem {
            title: "Hello/World".to_string(),
            link: "http://x".to_string(),
            published: Some(published),
            content: Some("Body text".to_string()),
            summary: None,
        }]);

        let names: Vec<String> = root.list_entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Hello-World.txt"]);

        let (file, attr) = root.lookup("Hello-World.txt").unwrap();
        assert_eq!(attr.kind, NodeKind::File);
        assert_eq!(attr.perm, FILE_PERM);
        assert_eq!(attr.size, file.content().len() as u64);
        assert_eq!(attr.mtime, SystemTime::from(published));

        file.open();
        let text = read_all(&file);
        assert!(text.contains("Title: Hello/World"));
        assert!(text.contains("Link: http://x"));
        assert!(text.contains(&render::format_date(&published)));
        assert!(text.contains("Body text"));
    }

    #[test]
    fn lookup_requires_suffix() {
        let root = mounted(vec![item("foo")]);
        assert!(matches!(root.lookup("foo"), Err(FsError::NotFound(n)) if n == "foo"));
        assert!(matches!(root.lookup("foo.md"), Err(FsError::NotFound(_))));
        assert!(root.lookup("foo.txt").is_ok());
    }

    #[test]
    fn lookup_unknown_name() {
        let root = mounted(vec![item("foo")]);
        assert!(matches!(root.lookup("bar.txt"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn empty_before_successful_refresh() {
        let store = Arc::new(ItemStore::new());
        let source = Arc::new(ScriptedSource::new(vec![]));
        let root = RootDir::new(store, source, "http://feed");
        root.on_mount();
        assert!(root.list_entries().is_empty());
    }

    #[test]
    fn directory_attributes() {
        let root = mounted(vec![]);
        let attr = root.attributes();
        assert_eq!(attr.kind, NodeKind::Directory);
        assert_eq!(attr.perm, 0o555);
    }

    #[test]
    fn read_edges() {
        let root = mounted(vec![item("a")]);
        let (file, _) = root.lookup("a.txt").unwrap();
        let len = file.content().len() as i64;

        assert_eq!(file.read(len, 10).unwrap(), b"");
        assert_eq!(file.read(len + 100, 10).unwrap(), b"");
        assert_eq!(file.read(-1, 10), Err(FsError::InvalidArgument(-1)));
        assert_eq!(file.read(0, 0).unwrap(), b"");
        assert_eq!(file.read(len - 1, 10).unwrap().len(), 1);
        assert_eq!(file.read(0, usize::MAX).unwrap(), file.content());
    }

    #[test]
    fn repeated_reads_are_identical() {
        let root = mounted(vec![item("a")]);
        let (file, _) = root.lookup("a.txt").unwrap();
        let first = file.read(3, 5).unwrap().to_vec();
        let _ = file.read(0, 2).unwrap();
        assert_eq!(file.read(3, 5).unwrap(), first.as_slice());
    }

    #[test]
    fn lookup_and_getattr_agree_on_times() {
        let published = Utc.with_ymd_and_hms(2020, 2, 2, 2, 2, 2).unwrap();
        let mut dated = item("dated");
        dated.published = Some(published);
        let root = mounted(vec![dated]);

        let (file, entry_attr) = root.lookup("dated.txt").unwrap();
        let attr = file.attributes();
        assert_eq!(attr.mtime, entry_attr.mtime);
        assert_eq!(attr.ctime, SystemTime::from(published));
        assert_eq!(attr.size, entry_attr.size);
    }

    #[test]
    fn node_dispatch() {
        let root = mounted(vec![item("a")]);
        let (file, _) = root.lookup("a.txt").unwrap();

        let dir = Node::Dir(&root);
        assert_eq!(dir.list_entries().unwrap().len(), 1);
        assert_eq!(dir.read(0, 1), Err(FsError::IsADirectory));
        assert!(dir.open().is_ok());

        let node = Node::File(&file);
        assert!(matches!(node.lookup("a.txt"), Err(FsError::NotADirectory)));
        assert_eq!(node.list_entries(), Err(FsError::NotADirectory));
        assert_eq!(node.attributes().kind, NodeKind::File);
    }
}
