//! FUSE binding.
//!
//! Implements [`fuser::Filesystem`] on top of the transport-independent
//! nodes in [`crate::node`]. This layer owns inode bookkeeping only: every
//! successful lookup gets a fresh inode backed by its own [`FeedFile`], which
//! lives until the kernel forgets it.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::os::raw::c_int;
use std::time::Duration;

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEntry, ReplyOpen, Request, FUSE_ROOT_ID,
};
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::node::{FeedFile, Node, NodeAttr, NodeKind, RootDir};

/// How long the kernel may cache entries and attributes.
const TTL: Duration = Duration::from_secs(1);

const BLOCK_SIZE: u32 = 512;

/// One `readdir` reply entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListingEntry {
    ino: u64,
    next_offset: i64,
    kind: FileType,
    name: String,
}

struct FileSlot {
    file: FeedFile,
    lookups: u64,
}

/// The mounted filesystem.
pub struct FeedFs {
    root: RootDir,
    files: HashMap<u64, FileSlot>,
    next_ino: u64,
    uid: u32,
    gid: u32,
}

impl FeedFs {
    pub fn new(root: RootDir) -> Self {
        // SAFETY: getuid/getgid have no preconditions and cannot fail.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self {
            root,
            files: HashMap::new(),
            next_ino: FUSE_ROOT_ID + 1,
            uid,
            gid,
        }
    }

    fn node(&self, ino: u64) -> FsResult<Node<'_>> {
        if ino == FUSE_ROOT_ID {
            return Ok(Node::Dir(&self.root));
        }
        self.files
            .get(&ino)
            .map(|slot| Node::File(&slot.file))
            .ok_or_else(|| FsError::not_found(format!("inode {ino}")))
    }

    fn do_lookup(&mut self, parent: u64, name: &OsStr) -> FsResult<FileAttr> {
        let name = name
            .to_str()
            .ok_or_else(|| FsError::not_found(name.to_string_lossy()))?;
        let (file, attr) = self.node(parent)?.lookup(name)?;

        let ino = self.next_ino;
        self.next_ino += 1;
        self.files.insert(ino, FileSlot { file, lookups: 1 });
        Ok(self.file_attr(ino, &attr))
    }

    fn do_forget(&mut self, ino: u64, nlookup: u64) {
        if let Some(slot) = self.files.get_mut(&ino) {
            slot.lookups = slot.lookups.saturating_sub(nlookup);
            if slot.lookups == 0 {
                self.files.remove(&ino);
            }
        }
    }

    fn do_getattr(&self, ino: u64) -> FsResult<FileAttr> {
        let attr = self.node(ino)?.attributes();
        Ok(self.file_attr(ino, &attr))
    }

    fn do_read(&self, ino: u64, offset: i64, size: u32) -> FsResult<&[u8]> {
        self.node(ino)?.read(offset, size as usize)
    }

    fn do_open(&self, ino: u64, flags: i32) -> FsResult<()> {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return Err(FsError::ReadOnly);
        }
        self.node(ino)?.open()
    }

    /// `.`, `..` and every item, sorted by name so that continuation offsets
    /// stay meaningful across calls. Entries before `offset` are skipped;
    /// each entry carries the offset the kernel should resume from after it.
    fn do_readdir(&self, ino: u64, offset: i64) -> FsResult<Vec<ListingEntry>> {
        let mut items = self.node(ino)?.list_entries()?;
        items.sort_by(|a, b| a.name.cmp(&b.name));

        let dots = [".", ".."]
            .into_iter()
            .map(|name| (FUSE_ROOT_ID, FileType::Directory, name.to_string()));
        let files = items
            .into_iter()
            .map(|e| (listing_ino(&e.name), file_type(e.kind), e.name));

        let skip = usize::try_from(offset).unwrap_or(0);
        Ok(dots
            .chain(files)
            .enumerate()
            .skip(skip)
            .map(|(i, (ino, kind, name))| ListingEntry {
                ino,
                next_offset: (i + 1) as i64,
                kind,
                name,
            })
            .collect())
    }

    fn file_attr(&self, ino: u64, attr: &NodeAttr) -> FileAttr {
        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
            crtime: attr.ctime,
            kind: file_type(attr.kind),
            perm: attr.perm,
            nlink: match attr.kind {
                NodeKind::Directory => 2,
                NodeKind::File => 1,
            },
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
    }
}

/// Inode number reported in directory listings. Listed files have no inode
/// until looked up, so this only needs to be non-zero and stay clear of the
/// allocated range.
///
/// It never matches the inode `lookup` hands out, so `ls -i` and `stat`
/// disagree for the same file.
fn listing_ino(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish() | (1 << 63)
}

impl Filesystem for FeedFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        self.root.on_mount();
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.do_lookup(parent, name) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.do_forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.do_getattr(ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.do_open(ino, flags) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.do_read(ino, offset, size) {
            Ok(data) => reply.data(data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.do_readdir(ino, offset) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };
        debug!(offset, remaining = entries.len(), "readdir reply");
        for entry in entries {
            // `add` returns true once the reply buffer is full.
            if reply.add(entry.ino, entry.next_offset, entry.kind, entry.name) {
                break;
            }
        }
        reply.ok();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::tests::{feed, item, ScriptedSource};
    use crate::store::ItemStore;

    fn mounted(titles: &[&str]) -> FeedFs {
        let store = Arc::new(ItemStore::new());
        let items = titles.iter().map(|t| item(t)).collect();
        let source = Arc::new(ScriptedSource::single(feed(items)));
        let root = RootDir::new(store, source, "http://feed");
        root.on_mount();
        FeedFs::new(root)
    }

    #[test]
    fn root_is_a_read_only_directory() {
        let fs = mounted(&[]);
        let attr = fs.do_getattr(FUSE_ROOT_ID).unwrap();
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.perm, 0o555);
        assert_eq!(attr.nlink, 2);
    }

    #[test]
    fn each_lookup_gets_a_fresh_inode() {
        let mut fs = mounted(&["a"]);
        let first = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("a.txt")).unwrap();
        let second = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("a.txt")).unwrap();

        assert_ne!(first.ino, second.ino);
        assert_eq!(first.size, second.size);
        assert_eq!(first.kind, FileType::RegularFile);
        assert_eq!(first.perm, 0o444);
    }

    #[test]
    fn lookup_errors_map_to_enoent() {
        let mut fs = mounted(&["a"]);
        let err = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("a")).unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
        let err = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("b.txt")).unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
    }

    #[test]
    fn lookup_under_a_file_fails() {
        let mut fs = mounted(&["a"]);
        let file = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("a.txt")).unwrap();
        let err = fs.do_lookup(file.ino, OsStr::new("a.txt")).unwrap_err();
        assert_eq!(err.errno(), libc::ENOTDIR);
    }

    #[test]
    fn read_through_inode() {
        let mut fs = mounted(&["Hello/World"]);
        let attr = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("Hello-World.txt")).unwrap();

        let data = fs.do_read(attr.ino, 0, 4096).unwrap();
        assert_eq!(data.len() as u64, attr.size);
        assert!(data.starts_with(b"Title: Hello/World\n"));

        assert!(fs.do_read(attr.ino, attr.size as i64, 10).unwrap().is_empty());
        assert_eq!(fs.do_read(attr.ino, -1, 10).unwrap_err().errno(), libc::EINVAL);
        assert_eq!(fs.do_read(FUSE_ROOT_ID, 0, 10).unwrap_err().errno(), libc::EISDIR);
    }

    #[test]
    fn forget_releases_the_file() {
        let mut fs = mounted(&["a"]);
        let attr = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("a.txt")).unwrap();
        assert!(fs.do_getattr(attr.ino).is_ok());

        fs.do_forget(attr.ino, 1);
        assert_eq!(fs.do_getattr(attr.ino).unwrap_err().errno(), libc::ENOENT);
    }

    #[test]
    fn readdir_lists_dot_entries_and_items() {
        let fs = mounted(&["b", "a/x"]);
        let names: Vec<String> = fs
            .do_readdir(FUSE_ROOT_ID, 0)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec![".", "..", "a-x.txt", "b.txt"]);
    }

    #[test]
    fn readdir_resumes_from_offset() {
        let fs = mounted(&["c", "a", "b"]);
        let all = fs.do_readdir(FUSE_ROOT_ID, 0).unwrap();
        assert_eq!(all.len(), 5);

        // Resume after the first two entries ("." and "..").
        let rest = fs.do_readdir(FUSE_ROOT_ID, all[1].next_offset).unwrap();
        let names: Vec<&str> = rest.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(rest[0].next_offset, 3);
        assert_eq!(rest[2].next_offset, 5);
        assert_eq!(rest, all[2..].to_vec());

        assert!(fs.do_readdir(FUSE_ROOT_ID, 5).unwrap().is_empty());
        assert!(fs.do_readdir(FUSE_ROOT_ID, 99).unwrap().is_empty());
    }

    #[test]
    fn readdir_on_a_file_fails() {
        let mut fs = mounted(&["a"]);
        let file = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("a.txt")).unwrap();
        let err = fs.do_readdir(file.ino, 0).unwrap_err();
        assert_eq!(err.errno(), libc::ENOTDIR);
    }

    #[test]
    fn open_for_writing_is_refused() {
        let mut fs = mounted(&["a"]);
        let file = fs.do_lookup(FUSE_ROOT_ID, OsStr::new("a.txt")).unwrap();

        assert!(fs.do_open(file.ino, libc::O_RDONLY).is_ok());
        assert!(fs.do_open(FUSE_ROOT_ID, libc::O_RDONLY).is_ok());
        for flags in [libc::O_WRONLY, libc::O_RDWR, libc::O_WRONLY | libc::O_APPEND] {
            assert_eq!(fs.do_open(file.ino, flags).unwrap_err().errno(), libc::EROFS);
        }
        assert_eq!(fs.do_open(12345, libc::O_RDONLY).unwrap_err().errno(), libc::ENOENT);
    }

    #[test]
    fn listing_inodes_avoid_allocated_range() {
        assert!(listing_ino("anything.txt") >= 1 << 63);
    }
}
