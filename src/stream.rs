//! Streaming values: a value too large, or too incrementally
//! produced, to hand to `Tree::insert` as one `Vec<u8>` is instead written
//! and read a chunk at a time through [`ValueWriter`]/[`ValueReader`],
//! with [`StreamingTree`] keeping every user key's chunks ordered and
//! contiguous underneath.
//!
//! A chunk's real key is `(user key, sequence)`, so a whole value's
//! chunks sort contiguously and a reader can walk them by incrementing
//! the sequence until the tree runs out of matches.
//!
//! `ValueReader`/`ValueWriter` round-trip bytes exactly as the host wrote
//! them — there is no portable, endian-independent encoding here. Moving a
//! pool file between hosts of different endianness is out of scope.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::codec::KeyCodec;
use crate::error::{Result, TreeError};
use crate::pool::Pool;
use crate::tree::Tree;

/// Largest sequence number a single streamed value may use: chunk
/// sequence numbers are `u16`, so a value tops out at 65536 chunks.
pub const MAX_CHUNKS: u32 = 1 << 16;

/// The real key a chunk is stored under: the user's key, then the chunk's
/// position within that value. Ordered by `(user, sequence)`, so all of a
/// value's chunks sort contiguously immediately after its user key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct ChunkKey<K> {
    user: K,
    sequence: u16,
}

impl<K: KeyCodec> KeyCodec for ChunkKey<K> {
    const FIXED_SIZE: Option<u16> = match K::FIXED_SIZE {
        Some(n) => Some(n + 2),
        None => None,
    };

    fn encode(&self, out: &mut Vec<u8>) {
        self.user.encode(out);
        out.extend_from_slice(&self.sequence.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(TreeError::Corruption("chunk key truncated".into()));
        }
        let split = bytes.len() - 2;
        let user = K::decode(&bytes[..split])?;
        let sequence = u16::from_be_bytes(bytes[split..].try_into().unwrap());
        Ok(ChunkKey { user, sequence })
    }
}

#[derive(Clone, Copy, Default)]
struct LockState {
    writer: bool,
    readers: u32,
}

type LockTable = Rc<RefCell<HashMap<Vec<u8>, LockState>>>;

/// A tree of arbitrarily large values, each stored as a contiguous run of
/// byte chunks under one user-supplied key.
pub struct StreamingTree<K: KeyCodec, P: Pool> {
    tree: Rc<RefCell<Tree<ChunkKey<K>, Vec<u8>, P>>>,
    locks: LockTable,
}

impl<K: KeyCodec, P: Pool> StreamingTree<K, P> {
    pub fn create(pool: Rc<RefCell<P>>) -> Result<Self> {
        Ok(StreamingTree {
            tree: Rc::new(RefCell::new(Tree::create(pool)?)),
            locks: Rc::new(RefCell::new(HashMap::new())),
        })
    }

    fn key_bytes(key: &K) -> Vec<u8> {
        let mut out = Vec::new();
        key.encode(&mut out);
        out
    }

    /// Open an exclusive writer for `key`. Erases every chunk already
    /// stored under `key` first, so a shorter rewrite cannot leave stale
    /// high-sequence chunks readable behind the new, shorter value. Fails
    /// with [`TreeError::ConcurrentAccess`] if any reader or writer is
    /// already open on the same key.
    pub fn writer(&self, key: K) -> Result<ValueWriter<K, P>> {
        let bytes = Self::key_bytes(&key);
        {
            let mut locks = self.locks.borrow_mut();
            let state = locks.entry(bytes.clone()).or_default();
            if state.writer || state.readers > 0 {
                return Err(TreeError::ConcurrentAccess);
            }
            state.writer = true;
        }
        Self::clear_chunks(&self.tree, &key)?;
        Ok(ValueWriter {
            tree: self.tree.clone(),
            locks: self.locks.clone(),
            key_bytes: bytes,
            user_key: key,
            count: 0,
        })
    }

    /// Remove every chunk stored under `key`, starting from sequence 0.
    fn clear_chunks(tree: &Rc<RefCell<Tree<ChunkKey<K>, Vec<u8>, P>>>, key: &K) -> Result<()> {
        let mut tree = tree.borrow_mut();
        let mut sequence = 0u16;
        loop {
            let chunk_key = ChunkKey {
                user: key.clone(),
                sequence,
            };
            if tree.remove(&chunk_key)?.is_none() {
                return Ok(());
            }
            match sequence.checked_add(1) {
                Some(next) => sequence = next,
                None => return Ok(()),
            }
        }
    }

    /// Open a shared reader for `key`. Fails with
    /// [`TreeError::ConcurrentAccess`] if a writer is already open on the
    /// same key; any number of readers may coexist.
    pub fn reader(&self, key: K) -> Result<ValueReader<K, P>> {
        let bytes = Self::key_bytes(&key);
        {
            let mut locks = self.locks.borrow_mut();
            let state = locks.entry(bytes.clone()).or_default();
            if state.writer {
                return Err(TreeError::ConcurrentAccess);
            }
            state.readers += 1;
        }
        Ok(ValueReader {
            tree: self.tree.clone(),
            locks: self.locks.clone(),
            key_bytes: bytes,
            user_key: key,
            next_sequence: 0,
        })
    }

    /// Remove every chunk stored under `key`. Takes the same exclusive
    /// lock a writer would.
    pub fn delete(&self, key: K) -> Result<()> {
        let _writer_lock = self.writer(key)?;
        Ok(())
    }
}

/// Writes a value one chunk at a time under a single, exclusively-locked
/// key. Dropping the writer releases the lock whether or not the value
/// was finished.
pub struct ValueWriter<K: KeyCodec, P: Pool> {
    tree: Rc<RefCell<Tree<ChunkKey<K>, Vec<u8>, P>>>,
    locks: LockTable,
    key_bytes: Vec<u8>,
    user_key: K,
    /// Chunks written so far. Kept as a `u32` (not the `u16` sequence
    /// number itself) so the full `0..=65535` sequence range remains
    /// reachable without wrapping once the last chunk is written.
    count: u32,
}

impl<K: KeyCodec, P: Pool> ValueWriter<K, P> {
    /// Append one more chunk to the value.
    pub fn write_chunk(&mut self, chunk: Vec<u8>) -> Result<()> {
        if self.count >= MAX_CHUNKS {
            return Err(TreeError::MaxChunksExceeded);
        }
        let chunk_key = ChunkKey {
            user: self.user_key.clone(),
            sequence: self.count as u16,
        };
        self.tree.borrow_mut().insert(chunk_key, chunk)?;
        self.count += 1;
        Ok(())
    }

    pub fn chunks_written(&self) -> u32 {
        self.count
    }
}

impl<K: KeyCodec, P: Pool> Drop for ValueWriter<K, P> {
    fn drop(&mut self) {
        if let Some(state) = self.locks.borrow_mut().get_mut(&self.key_bytes) {
            state.writer = false;
        }
    }
}

/// Reads a value back one chunk at a time in the order it was written.
pub struct ValueReader<K: KeyCodec, P: Pool> {
    tree: Rc<RefCell<Tree<ChunkKey<K>, Vec<u8>, P>>>,
    locks: LockTable,
    key_bytes: Vec<u8>,
    user_key: K,
    next_sequence: u16,
}

impl<K: KeyCodec, P: Pool> std::fmt::Debug for ValueReader<K, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueReader")
            .field("key_bytes", &self.key_bytes)
            .field("user_key", &self.user_key)
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

impl<K: KeyCodec, P: Pool> ValueReader<K, P> {
    /// Read the next chunk, or `None` once the value is exhausted.
    pub fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk_key = ChunkKey {
            user: self.user_key.clone(),
            sequence: self.next_sequence,
        };
        let chunk = self.tree.borrow().get(&chunk_key)?;
        if chunk.is_some() {
            self.next_sequence += 1;
        }
        Ok(chunk)
    }

    /// Read and concatenate every remaining chunk into one buffer.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.read_chunk()? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

impl<K: KeyCodec, P: Pool> Drop for ValueReader<K, P> {
    fn drop(&mut self) {
        if let Some(state) = self.locks.borrow_mut().get_mut(&self.key_bytes) {
            state.readers = state.readers.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PagePool;
    use std::rc::Rc;

    fn new_streaming_tree() -> StreamingTree<u32, PagePool> {
        let pool = Rc::new(RefCell::new(PagePool::new(256)));
        StreamingTree::create(pool).unwrap()
    }

    #[test]
    fn write_then_read_chunks_in_order() {
        let st = new_streaming_tree();
        {
            let mut writer = st.writer(1).unwrap();
            writer.write_chunk(b"hello ".to_vec()).unwrap();
            writer.write_chunk(b"world".to_vec()).unwrap();
        }
        let mut reader = st.reader(1).unwrap();
        assert_eq!(reader.read_all().unwrap(), b"hello world".to_vec());
    }

    #[test]
    fn writer_excludes_concurrent_writer() {
        let st = new_streaming_tree();
        let _first = st.writer(1).unwrap();
        assert!(matches!(st.writer(1), Err(TreeError::ConcurrentAccess)));
    }

    #[test]
    fn writer_excludes_concurrent_reader_and_vice_versa() {
        let st = new_streaming_tree();
        let _reader = st.reader(1).unwrap();
        assert!(matches!(st.writer(1), Err(TreeError::ConcurrentAccess)));
    }

    #[test]
    fn lock_releases_on_drop() {
        let st = new_streaming_tree();
        {
            let _writer = st.writer(1).unwrap();
        }
        assert!(st.writer(1).is_ok());
    }

    #[test]
    fn delete_removes_every_chunk() {
        let st = new_streaming_tree();
        {
            let mut writer = st.writer(1).unwrap();
            writer.write_chunk(b"a".to_vec()).unwrap();
            writer.write_chunk(b"b".to_vec()).unwrap();
        }
        st.delete(1).unwrap();
        let mut reader = st.reader(1).unwrap();
        assert_eq!(reader.read_chunk().unwrap(), None);
    }
}
