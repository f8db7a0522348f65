//! An embeddable, ordered key-value storage engine built on a paged,
//! copy-on-write B-tree.
//!
//! A [`Tree`] indexes fixed- or variable-length keys to fixed- or
//! variable-length values inside fixed-capacity pages drawn from a
//! [`Pool`] — either a purely in-memory [`PagePool`] or a crash-consistent,
//! file-backed [`PersistentPagePool`]. A [`Forest`] groups several trees so
//! they commit and recover together. [`StreamingTree`] layers chunked
//! reads and writes of arbitrarily large values on top of an ordinary
//! tree.
//!
//! ```
//! use pagewright::{PagePool, Tree};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let pool = Rc::new(RefCell::new(PagePool::new(4096)));
//! let mut tree: Tree<u64, Vec<u8>, PagePool> = Tree::create(pool).unwrap();
//! tree.insert(1, b"hello".to_vec()).unwrap();
//! assert_eq!(tree.get(&1).unwrap(), Some(b"hello".to_vec()));
//! ```

pub mod codec;
pub mod cursor;
pub mod error;
pub mod forest;
pub mod page;
pub mod pool;
pub mod stats;
pub mod stream;
pub mod trail;
pub mod tree;
pub mod types;

pub use codec::{KeyCodec, ValueCodec};
pub use cursor::Cursor;
pub use error::{Result, TreeError};
pub use forest::Forest;
pub use page::{Page, Shape};
pub use pool::{PagePool, PersistentPagePool, Pool, PoolOptions};
pub use stats::{SharedStats, Stats};
pub use stream::{StreamingTree, ValueReader, ValueWriter};
pub use types::{PageLink, TreeIndex, UpdateMode};
pub use tree::Tree;
