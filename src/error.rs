use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Error kinds surfaced by the page pool, the B-tree, the forest, and the
/// streaming-value layer. Errors are never swallowed: every fallible
/// operation returns one of these instead of panicking.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Dereferencing a null or out-of-range page link.
    #[error("invalid page link")]
    InvalidLink,

    /// A page operation addressed a non-existent entry.
    #[error("index {0} is out of range")]
    InvalidIndex(usize),

    /// A variable-length key was zero bytes.
    #[error("key size must be non-zero")]
    InvalidKeySize,

    /// A variable-length value was zero bytes.
    #[error("value size must be non-zero")]
    InvalidValueSize,

    /// A page mutation would exceed `capacity` and rebalancing could not
    /// resolve it locally.
    #[error("page capacity exceeded")]
    Overflow,

    /// Growing the tree would exceed `MaxDepth`.
    #[error("tree depth would exceed the maximum of {0}")]
    MaxDepthExceeded(u16),

    /// `at`/`operator[]` on a key that is not present.
    #[error("key not found")]
    NotFound,

    /// Freeing a page that is already free.
    #[error("double free of page link")]
    DoubleFree,

    /// Freeing the null page link.
    #[error("cannot free the null page link")]
    FreeNull,

    /// Freeing a page that was already on the free list.
    #[error("page is already on the free list")]
    FreeFreed,

    /// A persistent file's header, slot, or root failed validation.
    #[error("storage corruption: {0}")]
    Corruption(String),

    /// The pool has no more room to allocate a page.
    #[error("page pool exhausted")]
    OutOfMemory,

    /// A transactional call (`commit`/`recover`) was made on a tree that
    /// lives inside a forest; forests own the commit boundary instead.
    #[error("operation not permitted on a tree owned by a forest")]
    InForest,

    /// A `ValueReader` and a `ValueWriter` were both open on the same key.
    #[error("concurrent reader/writer access to a streamed value")]
    ConcurrentAccess,

    /// A streamed value's chunk sequence number would wrap past 65536.
    #[error("streamed value exceeded the maximum chunk count")]
    MaxChunksExceeded,

    /// Underlying I/O failure against the persistent pool's backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
