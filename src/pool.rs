//! Page pools: a volatile, heap-backed pool and a persistent,
//! file-backed pool sharing one `Pool` trait.
//!
//! A superblock is written last on every commit, fixed-size slots are
//! addressed by index, and a free list is threaded through the free pages
//! themselves rather than kept as a separate on-disk array. See
//! `DESIGN.md` for the grounding of this design.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, TreeError};
use crate::page::{Page, PageHeader, Shape, HEADER_LEN};
use crate::stats::{self, SharedStats};
use crate::types::{PageDepth, PageLink, PageSize};

/// Behavior shared by the volatile and persistent page pools.
///
/// A `Tree`/`Forest` never reaches past this trait into a concrete pool
/// type, so the same algorithm runs over either backing store: a `Tree`
/// is generic over its pool.
pub trait Pool {
    /// Fixed byte capacity of every page this pool hands out.
    fn page_capacity(&self) -> PageSize;

    /// Allocate a fresh, empty page of the given shape and depth.
    fn allocate(&mut self, depth: PageDepth, shape: Shape) -> Result<PageLink>;

    /// Return a page to the pool's free list.
    fn free(&mut self, link: PageLink) -> Result<()>;

    /// Validate that `link` currently refers to a live (non-free) page,
    /// without reading its contents. Used by the trail to re-validate a
    /// link after a copy-on-update substitution elsewhere in the tree.
    fn reference(&self, link: PageLink) -> Result<()>;

    /// Read a live page's current contents. `shape` must match the shape
    /// the page was allocated with — the caller (a `Tree`, which fixes one
    /// key/value shape for its leaves and one for its nodes) always knows
    /// it statically, so the pool does not need to persist it per page.
    fn access(&self, link: PageLink, shape: Shape) -> Result<Page>;

    /// Read just the fixed header of a live page, shape-independent. Used
    /// to learn a page's depth (e.g. the root's) before its shape — and
    /// therefore which codec to decode its body with — is known.
    fn header(&self, link: PageLink) -> Result<PageHeader>;

    /// Overwrite a live page's contents.
    fn modify(&mut self, link: PageLink, page: Page) -> Result<()>;

    /// Durably publish every page written since the last commit.
    fn commit(&mut self) -> Result<()>;

    /// Discard any staged (uncommitted) write to a single page, falling
    /// back to its last committed image.
    fn recover_page(&mut self, link: PageLink) -> Result<()>;

    /// Discard every staged write since the last commit.
    fn recover(&mut self) -> Result<()>;

    /// Whether this pool backs onto durable storage. `Tree` uses this to
    /// resolve [`crate::types::UpdateMode::Auto`].
    fn is_persistent(&self) -> bool {
        false
    }

    /// The root link most recently registered by a standalone tree's
    /// `commit` (or `PageLink::NULL` if none has committed yet), letting a
    /// free-standing tree be reopened without the caller already knowing
    /// its root.
    fn root_link(&self) -> PageLink;

    /// Register `link` as the pool's single reopenable root. Only a
    /// standalone (non-forest) `Tree::commit` calls this.
    fn set_root_link(&mut self, link: PageLink);

    fn stats(&self) -> Option<SharedStats>;
    fn set_stats(&mut self, stats: Option<SharedStats>);
}

/// A pool backed entirely by heap memory. Writes are staged in `dirty`
/// exactly as in [`PersistentPagePool`] rather than applied straight to
/// `committed`, so `recover` can genuinely discard an aborted
/// transaction's pages (including ones it allocated) instead of being a
/// no-op.
pub struct PagePool {
    capacity: PageSize,
    /// Last-committed page images. `None` means a committed-free slot.
    committed: Vec<Option<Page>>,
    /// Committed-free slot indices available for immediate reuse.
    free_list: Vec<u32>,
    /// Pages written (or freshly allocated) since the last commit.
    dirty: HashMap<u32, Page>,
    /// Slots freed since the last commit, not yet folded into `committed`
    /// and `free_list`.
    freed_since_commit: HashSet<u32>,
    /// Committed-free slots popped off `free_list` this transaction, put
    /// back on `recover` so the free list isn't permanently shrunk by an
    /// aborted transaction.
    reused_since_commit: Vec<u32>,
    /// New slots (beyond `committed.len()`) allocated since the last
    /// commit, truncated away again on `recover`.
    grown_since_commit: u32,
    root_link: PageLink,
    stats: Option<SharedStats>,
}

impl PagePool {
    pub fn new(capacity: PageSize) -> Self {
        PagePool {
            capacity,
            committed: Vec::new(),
            free_list: Vec::new(),
            dirty: HashMap::new(),
            freed_since_commit: HashSet::new(),
            reused_since_commit: Vec::new(),
            grown_since_commit: 0,
            root_link: PageLink::NULL,
            stats: None,
        }
    }

    fn index_of(link: PageLink) -> Result<u32> {
        if link.is_null() {
            return Err(TreeError::InvalidLink);
        }
        Ok(link.0)
    }

    fn is_live(&self, index: u32) -> bool {
        if self.dirty.contains_key(&index) {
            return true;
        }
        if self.freed_since_commit.contains(&index) {
            return false;
        }
        (index as usize) < self.committed.len() && self.committed[index as usize].is_some()
    }
}

impl Pool for PagePool {
    fn page_capacity(&self) -> PageSize {
        self.capacity
    }

    fn allocate(&mut self, depth: PageDepth, shape: Shape) -> Result<PageLink> {
        let index = if let Some(&i) = self.freed_since_commit.iter().next() {
            self.freed_since_commit.remove(&i);
            i
        } else if let Some(i) = self.free_list.pop() {
            self.reused_since_commit.push(i);
            i
        } else {
            let i = self.committed.len() as u32 + self.grown_since_commit;
            self.grown_since_commit += 1;
            i
        };
        let link = PageLink(index);
        self.dirty.insert(index, Page::new(link, self.capacity, depth, shape));
        stats::bump(&self.stats, |s| s.page_allocations += 1);
        Ok(link)
    }

    fn free(&mut self, link: PageLink) -> Result<()> {
        if link.is_null() {
            return Err(TreeError::FreeNull);
        }
        let index = Self::index_of(link)?;
        if !self.is_live(index) {
            return Err(TreeError::DoubleFree);
        }
        self.dirty.remove(&index);
        self.freed_since_commit.insert(index);
        stats::bump(&self.stats, |s| s.page_frees += 1);
        Ok(())
    }

    fn reference(&self, link: PageLink) -> Result<()> {
        let index = Self::index_of(link)?;
        if self.is_live(index) {
            Ok(())
        } else {
            Err(TreeError::InvalidLink)
        }
    }

    fn access(&self, link: PageLink, shape: Shape) -> Result<Page> {
        let index = Self::index_of(link)?;
        if !self.is_live(index) {
            return Err(TreeError::InvalidLink);
        }
        if let Some(p) = self.dirty.get(&index) {
            debug_assert_eq!(p.shape, shape);
            stats::bump(&self.stats, |s| s.page_reads += 1);
            return Ok(p.clone());
        }
        let page = self.committed[index as usize].as_ref().expect("is_live guarantees present");
        debug_assert_eq!(page.shape, shape);
        stats::bump(&self.stats, |s| s.page_reads += 1);
        Ok(page.clone())
    }

    fn modify(&mut self, link: PageLink, page: Page) -> Result<()> {
        let index = Self::index_of(link)?;
        if !self.is_live(index) {
            return Err(TreeError::InvalidLink);
        }
        self.dirty.insert(index, page);
        stats::bump(&self.stats, |s| s.page_writes += 1);
        Ok(())
    }

    fn header(&self, link: PageLink) -> Result<PageHeader> {
        let index = Self::index_of(link)?;
        if !self.is_live(index) {
            return Err(TreeError::InvalidLink);
        }
        if let Some(p) = self.dirty.get(&index) {
            return Ok(p.header);
        }
        Ok(self.committed[index as usize].as_ref().expect("is_live guarantees present").header)
    }

    fn commit(&mut self) -> Result<()> {
        let new_len = self.committed.len() + self.grown_since_commit as usize;
        if self.committed.len() < new_len {
            self.committed.resize(new_len, None);
        }
        for (index, page) in self.dirty.drain() {
            self.committed[index as usize] = Some(page);
        }
        for index in self.freed_since_commit.drain() {
            self.committed[index as usize] = None;
            self.free_list.push(index);
        }
        self.reused_since_commit.clear();
        self.grown_since_commit = 0;
        stats::bump(&self.stats, |s| s.commits += 1);
        Ok(())
    }

    fn recover_page(&mut self, link: PageLink) -> Result<()> {
        if let Ok(index) = Self::index_of(link) {
            self.dirty.remove(&index);
        }
        Ok(())
    }

    fn recover(&mut self) -> Result<()> {
        self.dirty.clear();
        self.freed_since_commit.clear();
        self.free_list.extend(self.reused_since_commit.drain(..));
        self.grown_since_commit = 0;
        stats::bump(&self.stats, |s| s.recovers += 1);
        Ok(())
    }

    fn root_link(&self) -> PageLink {
        self.root_link
    }

    fn set_root_link(&mut self, link: PageLink) {
        self.root_link = link;
    }

    fn stats(&self) -> Option<SharedStats> {
        self.stats.clone()
    }

    fn set_stats(&mut self, stats: Option<SharedStats>) {
        self.stats = stats;
    }
}

/// Configuration for opening or creating a [`PersistentPagePool`].
#[derive(Clone, Copy, Debug)]
pub struct PoolOptions {
    pub capacity: PageSize,
    /// Whether `commit` calls `File::sync_data` after writing pages and
    /// again after writing the superblock. Defaults to `true`.
    pub fsync: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            capacity: 4096,
            fsync: true,
        }
    }
}

const MAGIC: u32 = 0x5047_5254; // "PGRT"
const SUPERBLOCK_LEN: u64 = 32;

/// On-disk superblock: magic, capacity, slot count, free-chain head, the
/// last committed standalone tree's root link, crc. The root link lets a
/// free-standing persistent tree be reopened via `Tree::open` without the
/// caller already knowing its root.
struct Superblock {
    capacity: PageSize,
    slot_count: u32,
    free_head: PageLink,
    root: PageLink,
}

impl Superblock {
    fn encode(&self) -> [u8; SUPERBLOCK_LEN as usize] {
        let mut buf = [0u8; SUPERBLOCK_LEN as usize];
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&self.capacity.to_le_bytes());
        buf[8..12].copy_from_slice(&self.slot_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.free_head.to_bytes());
        buf[16..20].copy_from_slice(&self.root.to_bytes());
        let crc = crc32fast::hash(&buf[0..20]);
        buf[20..24].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < SUPERBLOCK_LEN as usize {
            return Err(TreeError::Corruption("superblock truncated".into()));
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(TreeError::Corruption("bad superblock magic".into()));
        }
        let crc = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        if crc32fast::hash(&buf[0..20]) != crc {
            return Err(TreeError::Corruption("superblock checksum mismatch".into()));
        }
        let capacity = u16::from_le_bytes(buf[4..6].try_into().unwrap());
        let slot_count = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let free_head = PageLink::from_bytes(&buf[12..16]);
        let root = PageLink::from_bytes(&buf[16..20]);
        Ok(Superblock {
            capacity,
            slot_count,
            free_head,
            root,
        })
    }
}

/// A pool backed by a single file: a superblock followed by `slot_count`
/// fixed-size page slots. Writes are staged in memory and only reach the
/// file on `commit`, with the superblock written strictly last so a crash
/// mid-commit leaves the previous, fully-consistent image recoverable.
pub struct PersistentPagePool {
    file: File,
    capacity: PageSize,
    slot_count: u32,
    free_head: PageLink,
    root_link: PageLink,
    dirty: HashMap<u32, Page>,
    freed_since_commit: HashMap<u32, PageLink>,
    live: std::collections::HashSet<u32>,
    options: PoolOptions,
    stats: Option<SharedStats>,
}

impl PersistentPagePool {
    /// Create a new, empty pool file. Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>, options: PoolOptions) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        let superblock = Superblock {
            capacity: options.capacity,
            slot_count: 0,
            free_head: PageLink::NULL,
            root: PageLink::NULL,
        };
        file.write_all(&superblock.encode())?;
        if options.fsync {
            file.sync_data()?;
        }
        Ok(PersistentPagePool {
            file,
            capacity: options.capacity,
            slot_count: 0,
            free_head: PageLink::NULL,
            root_link: PageLink::NULL,
            dirty: HashMap::new(),
            freed_since_commit: HashMap::new(),
            live: std::collections::HashSet::new(),
            options,
            stats: None,
        })
    }

    /// Open an existing pool file, validating the superblock and rebuilding
    /// the in-memory free-chain and liveness sets by walking the file.
    pub fn open(path: impl AsRef<Path>, options: PoolOptions) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut header = [0u8; SUPERBLOCK_LEN as usize];
        file.read_exact(&mut header)?;
        let superblock = Superblock::decode(&header)?;
        if superblock.capacity != options.capacity {
            tracing::error!(
                target: "pagewright::pool",
                on_disk = superblock.capacity,
                requested = options.capacity,
                "pool capacity mismatch"
            );
            return Err(TreeError::Corruption("pool capacity mismatch".into()));
        }
        let mut pool = PersistentPagePool {
            file,
            capacity: superblock.capacity,
            slot_count: superblock.slot_count,
            free_head: superblock.free_head,
            root_link: superblock.root,
            dirty: HashMap::new(),
            freed_since_commit: HashMap::new(),
            live: (0..superblock.slot_count).collect(),
            options,
            stats: None,
        };
        let mut cursor = superblock.free_head;
        while !cursor.is_null() {
            pool.live.remove(&cursor.0);
            let bytes = pool.read_slot(cursor.0)?;
            cursor = PageLink::from_bytes(&bytes[HEADER_LEN..HEADER_LEN + 4]);
        }
        Ok(pool)
    }

    fn offset_of(&self, index: u32) -> u64 {
        SUPERBLOCK_LEN + index as u64 * self.capacity as u64
    }

    fn read_slot(&mut self, index: u32) -> Result<Vec<u8>> {
        let offset = self.offset_of(index);
        let mut buf = vec![0u8; self.capacity as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_slot(&mut self, index: u32, bytes: &[u8]) -> Result<()> {
        let offset = self.offset_of(index);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }
}

impl Pool for PersistentPagePool {
    fn page_capacity(&self) -> PageSize {
        self.capacity
    }

    fn allocate(&mut self, depth: PageDepth, shape: Shape) -> Result<PageLink> {
        let index = if !self.free_head.is_null() {
            let reused = self.free_head.0;
            self.free_head = if let Some(next) = self.freed_since_commit.get(&reused) {
                *next
            } else {
                let bytes = self.read_slot(reused)?;
                PageLink::from_bytes(&bytes[HEADER_LEN..HEADER_LEN + 4])
            };
            self.freed_since_commit.remove(&reused);
            reused
        } else {
            let i = self.slot_count;
            self.slot_count += 1;
            i
        };
        self.live.insert(index);
        let link = PageLink(index);
        self.dirty.insert(index, Page::new(link, self.capacity, depth, shape));
        stats::bump(&self.stats, |s| s.page_allocations += 1);
        Ok(link)
    }

    fn free(&mut self, link: PageLink) -> Result<()> {
        if link.is_null() {
            return Err(TreeError::FreeNull);
        }
        if !self.live.remove(&link.0) {
            return Err(TreeError::FreeFreed);
        }
        let mut marker = Page::new(link, self.capacity, 0, Shape::new(Some(1), Some(1)));
        marker.header.free = true;
        marker.header.modified = true;
        // stash the next free-chain link in the marker's first body bytes
        // by overwriting the freshly-encoded page image below.
        self.dirty.insert(link.0, marker);
        self.freed_since_commit.insert(link.0, self.free_head);
        self.free_head = link;
        stats::bump(&self.stats, |s| s.page_frees += 1);
        Ok(())
    }

    fn reference(&self, link: PageLink) -> Result<()> {
        if link.is_null() || !self.live.contains(&link.0) {
            return Err(TreeError::InvalidLink);
        }
        Ok(())
    }

    fn access(&self, link: PageLink, shape: Shape) -> Result<Page> {
        self.reference(link)?;
        if let Some(p) = self.dirty.get(&link.0) {
            debug_assert_eq!(p.shape, shape);
            return Ok(p.clone());
        }
        let offset = SUPERBLOCK_LEN + link.0 as u64 * self.capacity as u64;
        let mut file = self.file.try_clone()?;
        let mut buf = vec![0u8; self.capacity as usize];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Page::decode(&buf, shape)
    }

    fn modify(&mut self, link: PageLink, page: Page) -> Result<()> {
        self.reference(link)?;
        self.dirty.insert(link.0, page);
        stats::bump(&self.stats, |s| s.page_writes += 1);
        Ok(())
    }

    fn header(&self, link: PageLink) -> Result<PageHeader> {
        self.reference(link)?;
        if let Some(p) = self.dirty.get(&link.0) {
            return Ok(p.header);
        }
        let offset = SUPERBLOCK_LEN + link.0 as u64 * self.capacity as u64;
        let mut file = self.file.try_clone()?;
        let mut buf = vec![0u8; HEADER_LEN];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        PageHeader::decode(&buf)
    }

    fn commit(&mut self) -> Result<()> {
        let dirty_count = self.dirty.len();
        let freed: Vec<(u32, PageLink)> = self.freed_since_commit.drain().collect();
        for (index, next_free) in freed {
            if let Some(marker) = self.dirty.get_mut(&index) {
                marker.header.split = 0;
                marker.split = None;
                let mut bytes = marker.encode();
                bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&next_free.to_bytes());
                self.write_slot(index, &bytes)?;
            }
        }
        for (index, page) in self.dirty.drain() {
            let bytes = page.encode();
            let offset = SUPERBLOCK_LEN + index as u64 * self.capacity as u64;
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.write_all(&bytes)?;
            stats::bump(&self.stats, |s| s.page_writes += 1);
        }
        if self.options.fsync {
            self.file.sync_data()?;
        }
        let superblock = Superblock {
            capacity: self.capacity,
            slot_count: self.slot_count,
            free_head: self.free_head,
            root: self.root_link,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&superblock.encode())?;
        if self.options.fsync {
            self.file.sync_data()?;
        }
        stats::bump(&self.stats, |s| s.commits += 1);
        tracing::debug!(target: "pagewright::pool", pages = dirty_count, "commit");
        Ok(())
    }

    fn recover_page(&mut self, link: PageLink) -> Result<()> {
        self.dirty.remove(&link.0);
        Ok(())
    }

    fn recover(&mut self) -> Result<()> {
        self.dirty.clear();
        self.freed_since_commit.clear();
        let mut header = [0u8; SUPERBLOCK_LEN as usize];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header)?;
        let superblock = Superblock::decode(&header)?;
        self.slot_count = superblock.slot_count;
        self.free_head = superblock.free_head;
        self.root_link = superblock.root;
        self.live = (0..self.slot_count).collect();
        let mut cursor = self.free_head;
        while !cursor.is_null() {
            self.live.remove(&cursor.0);
            let bytes = self.read_slot(cursor.0)?;
            cursor = PageLink::from_bytes(&bytes[HEADER_LEN..HEADER_LEN + 4]);
        }
        stats::bump(&self.stats, |s| s.recovers += 1);
        tracing::debug!(target: "pagewright::pool", "recover");
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }

    fn root_link(&self) -> PageLink {
        self.root_link
    }

    fn set_root_link(&mut self, link: PageLink) {
        self.root_link = link;
    }

    fn stats(&self) -> Option<SharedStats> {
        self.stats.clone()
    }

    fn set_stats(&mut self, stats: Option<SharedStats>) {
        self.stats = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Shape;

    fn scalar_shape() -> Shape {
        Shape::new(Some(4), Some(4))
    }

    #[test]
    fn volatile_allocate_modify_access_roundtrip() {
        let mut pool = PagePool::new(256);
        let link = pool.allocate(0, scalar_shape()).unwrap();
        let mut page = pool.access(link, scalar_shape()).unwrap();
        page.insert(0, 1u32.to_le_bytes().to_vec(), 2u32.to_le_bytes().to_vec(), None)
            .unwrap();
        pool.modify(link, page).unwrap();
        let read_back = pool.access(link, scalar_shape()).unwrap();
        assert_eq!(read_back.count(), 1);
    }

    #[test]
    fn volatile_free_then_double_free_errors() {
        let mut pool = PagePool::new(256);
        let link = pool.allocate(0, scalar_shape()).unwrap();
        pool.free(link).unwrap();
        assert!(matches!(pool.free(link), Err(TreeError::DoubleFree)));
    }

    #[test]
    fn volatile_free_reuses_slot() {
        let mut pool = PagePool::new(256);
        let a = pool.allocate(0, scalar_shape()).unwrap();
        pool.free(a).unwrap();
        let b = pool.allocate(0, scalar_shape()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn persistent_pool_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let options = PoolOptions {
            capacity: 256,
            fsync: false,
        };
        let link = {
            let mut pool = PersistentPagePool::create(&path, options).unwrap();
            let link = pool.allocate(0, scalar_shape()).unwrap();
            let mut page = pool.access(link, scalar_shape()).unwrap();
            page.insert(0, 7u32.to_le_bytes().to_vec(), 9u32.to_le_bytes().to_vec(), None)
                .unwrap();
            pool.modify(link, page).unwrap();
            pool.commit().unwrap();
            link
        };
        let reopened = PersistentPagePool::open(&path, options).unwrap();
        let page = reopened.access(link, scalar_shape()).unwrap();
        assert_eq!(page.count(), 1);
        assert_eq!(page.key(0).unwrap(), &7u32.to_le_bytes());
    }

    #[test]
    fn persistent_pool_root_link_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let options = PoolOptions {
            capacity: 256,
            fsync: false,
        };
        let link = {
            let mut pool = PersistentPagePool::create(&path, options).unwrap();
            let link = pool.allocate(0, scalar_shape()).unwrap();
            pool.set_root_link(link);
            pool.commit().unwrap();
            link
        };
        let reopened = PersistentPagePool::open(&path, options).unwrap();
        assert_eq!(reopened.root_link(), link);
    }

    #[test]
    fn persistent_pool_root_link_recover_reverts_to_last_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let options = PoolOptions {
            capacity: 256,
            fsync: false,
        };
        let mut pool = PersistentPagePool::create(&path, options).unwrap();
        let first = pool.allocate(0, scalar_shape()).unwrap();
        pool.set_root_link(first);
        pool.commit().unwrap();
        let second = pool.allocate(0, scalar_shape()).unwrap();
        pool.set_root_link(second);
        pool.recover().unwrap();
        assert_eq!(pool.root_link(), first);
    }

    #[test]
    fn volatile_recover_discards_uncommitted_writes_and_allocations() {
        let mut pool = PagePool::new(256);
        let link = pool.allocate(0, scalar_shape()).unwrap();
        pool.commit().unwrap();
        let mut page = pool.access(link, scalar_shape()).unwrap();
        page.insert(0, 1u32.to_le_bytes().to_vec(), 1u32.to_le_bytes().to_vec(), None)
            .unwrap();
        pool.modify(link, page).unwrap();
        let grown = pool.allocate(0, scalar_shape()).unwrap();
        pool.recover().unwrap();
        let page = pool.access(link, scalar_shape()).unwrap();
        assert_eq!(page.count(), 0);
        assert!(matches!(pool.access(grown, scalar_shape()), Err(TreeError::InvalidLink)));
    }

    #[test]
    fn persistent_pool_recover_discards_uncommitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let options = PoolOptions {
            capacity: 256,
            fsync: false,
        };
        let mut pool = PersistentPagePool::create(&path, options).unwrap();
        let link = pool.allocate(0, scalar_shape()).unwrap();
        pool.commit().unwrap();
        let mut page = pool.access(link, scalar_shape()).unwrap();
        page.insert(0, 1u32.to_le_bytes().to_vec(), 1u32.to_le_bytes().to_vec(), None)
            .unwrap();
        pool.modify(link, page).unwrap();
        pool.recover().unwrap();
        let page = pool.access(link, scalar_shape()).unwrap();
        assert_eq!(page.count(), 0);
    }
}
