//! Descent bookkeeping for the B-tree: a bounded stack of
//! `(link, index, compare)` frames recording the path taken from the root
//! to the page currently being examined, plus the binary-search
//! comparator used to build each frame.
//!
//! A `Trail` plays the role an ordinary recursive call stack would during
//! descent, made explicit and reusable so `grow`/`conditional_merge` can
//! walk back up it after a leaf-level mutation.

use crate::codec::KeyCodec;
use crate::page::Page;
use crate::types::{KeyCompare, PageDepth, PageLink, MAX_DEPTH};

/// One step of a root-to-leaf descent.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    pub link: PageLink,
    /// Depth of the page this frame refers to (0 = leaf), so later code
    /// never has to guess a page's shape before reading its header.
    pub depth: PageDepth,
    /// Index of the matched (or insertion-point) entry on this page.
    pub index: usize,
    /// Result of comparing the search key against `entries[index].key`:
    /// negative if the search key is smaller, zero on an exact match,
    /// positive if larger (or `index == count`, an insertion past the end).
    pub compare: KeyCompare,
}

impl Frame {
    /// True when this frame landed on an exact key match.
    pub fn is_match(&self) -> bool {
        self.compare == 0
    }
}

/// A bounded root-to-current-page path.
///
/// Bounded by [`MAX_DEPTH`] the same way the tree itself is: a `Trail`
/// can never describe a deeper descent than the tree is allowed to grow.
#[derive(Clone, Debug, Default)]
pub struct Trail {
    frames: Vec<Frame>,
}

impl Trail {
    pub fn new() -> Self {
        Trail {
            frames: Vec::with_capacity(MAX_DEPTH as usize + 1),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frame(&self, level: usize) -> Option<&Frame> {
        self.frames.get(level)
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Frame> {
        self.frames.iter()
    }

    /// True once any frame along the path recorded an exact match — once a
    /// search key matches a separator, every remaining step descends via
    /// `.split` links rather than further binary search (the forced
    /// split-descent rule).
    pub fn at_split(&self) -> bool {
        self.frames.iter().any(|f| f.is_match())
    }

    /// The shallowest level (closest to the root) at which a match
    /// occurred, if any — the level whose separator key owns the value
    /// this descent is ultimately chasing.
    pub fn match_level(&self) -> Option<usize> {
        self.frames.iter().position(|f| f.is_match())
    }

    /// Drop frames until the top frame is the one that produced the exact
    /// match (or the trail is empty if there was none). Used when undoing
    /// a forced split-descent back to the separator's owning frame.
    pub fn pop_to_match(&mut self) {
        while let Some(f) = self.top() {
            if f.is_match() {
                break;
            }
            self.frames.pop();
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
    }
}

/// Binary-search a page's indexed keys for `key`, decoding each candidate
/// through `K::decode` and comparing with `Ord` rather than comparing raw
/// bytes, so integer keys sort numerically regardless of encoding
/// endianness.
pub fn position<K: KeyCodec>(page: &Page, key: &K) -> crate::error::Result<(usize, KeyCompare)> {
    let mut lo = 0usize;
    let mut hi = page.count();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let candidate = K::decode(page.key(mid)?)?;
        match candidate.cmp(key) {
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
            std::cmp::Ordering::Equal => return Ok((mid, 0)),
        }
    }
    let compare = if lo < page.count() { -1 } else { 1 };
    Ok((lo, compare))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Shape;

    fn page_with(keys: &[u32]) -> Page {
        let mut page = Page::new(PageLink(0), 4096, 0, Shape::new(Some(4), Some(4)));
        for (i, k) in keys.iter().enumerate() {
            page.insert(i, k.to_le_bytes().to_vec(), k.to_le_bytes().to_vec(), None)
                .unwrap();
        }
        page
    }

    #[test]
    fn position_finds_exact_match() {
        let page = page_with(&[1, 3, 5, 7]);
        let (idx, cmp) = position(&page, &5u32).unwrap();
        assert_eq!(idx, 2);
        assert_eq!(cmp, 0);
    }

    #[test]
    fn position_finds_insertion_point() {
        let page = page_with(&[1, 3, 5, 7]);
        let (idx, cmp) = position(&page, &4u32).unwrap();
        assert_eq!(idx, 2);
        assert_eq!(cmp, -1);
    }

    #[test]
    fn position_past_the_end() {
        let page = page_with(&[1, 3, 5]);
        let (idx, cmp) = position(&page, &9u32).unwrap();
        assert_eq!(idx, 3);
        assert_eq!(cmp, 1);
    }

    #[test]
    fn at_split_detects_any_exact_match() {
        let mut trail = Trail::new();
        trail.push(Frame {
            link: PageLink(0),
            depth: 1,
            index: 1,
            compare: -1,
        });
        assert!(!trail.at_split());
        trail.push(Frame {
            link: PageLink(1),
            depth: 0,
            index: 0,
            compare: 0,
        });
        assert!(trail.at_split());
        assert_eq!(trail.match_level(), Some(1));
    }
}
