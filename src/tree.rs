//! The ordered key-value B-tree itself.
//!
//! A classic split-propagation insert and merge-on-underflow erase,
//! adapted to this crate's page layout where a node's entries hold child
//! `PageLink`s rather than values, and every page's `split` slot stands in
//! for the (key, payload) pair that would otherwise have to be duplicated
//! between a page and the ancestor that routes to it.
//!
//! ## The split slot, briefly
//!
//! When a page grows past capacity it is cut in two. The new right page's
//! first entry is lifted out of its entry list entirely and kept as that
//! page's own `split` value; the lifted entry's key is what gets inserted
//! into the parent as the new separator, pointing at the right page via
//! the parent's ordinary child link. So the separator key lives in exactly
//! one place (the parent's entry list) and its payload lives in exactly
//! one place (the right page's `split`), with nothing duplicated. A
//! lookup that matches a separator exactly therefore cannot keep
//! searching entry lists below that point — the key it is chasing was
//! deliberately removed from every entry list under the match — so it
//! switches to following `split` links straight down to the owning leaf.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::codec::{KeyCodec, ValueCodec};
use crate::cursor::Cursor;
use crate::error::{Result, TreeError};
use crate::page::{Page, Shape};
use crate::pool::Pool;
use crate::stats::{self, SharedStats};
use crate::trail::{position, Frame, Trail};
use crate::types::{PageDepth, PageLink, UpdateMode, HIGH_THRESHOLD_DEN, HIGH_THRESHOLD_NUM, LOW_THRESHOLD_DEN, LOW_THRESHOLD_NUM, MAX_DEPTH};

/// An embeddable, ordered key-value B-tree over a [`Pool`].
pub struct Tree<K, V, P: Pool> {
    pool: Rc<RefCell<P>>,
    root: PageLink,
    /// Root this tree would revert to on `recover`: the root as of the
    /// last `commit` (or the freshly allocated root, for a tree that has
    /// never committed).
    committed_root: PageLink,
    /// Number of keys currently stored, maintained incrementally by
    /// `insert`/`remove`/`clear` so `size` is O(1).
    count: u64,
    /// `count` as of the last `commit`, restored by `recover` without a
    /// full traversal.
    committed_count: u64,
    update_mode: UpdateMode,
    stats: Option<SharedStats>,
    in_forest: bool,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, P> Tree<K, V, P>
where
    K: KeyCodec,
    V: ValueCodec,
    P: Pool,
{
    fn leaf_shape() -> Shape {
        Shape::new(K::FIXED_SIZE, V::FIXED_SIZE)
    }

    fn node_shape() -> Shape {
        Shape::node_shape(K::FIXED_SIZE)
    }

    fn shape_for_depth(depth: PageDepth) -> Shape {
        if depth == 0 {
            Self::leaf_shape()
        } else {
            Self::node_shape()
        }
    }

    /// Create a new, empty tree backed by a fresh root leaf in `pool`.
    pub fn create(pool: Rc<RefCell<P>>) -> Result<Self> {
        let root = pool.borrow_mut().allocate(0, Self::leaf_shape())?;
        Ok(Tree {
            pool,
            root,
            committed_root: root,
            count: 0,
            committed_count: 0,
            update_mode: UpdateMode::Auto,
            stats: None,
            in_forest: false,
            _marker: PhantomData,
        })
    }

    /// Attach to an already-existing root page (used by [`Forest`] to
    /// materialize one of its planted trees against the shared pool, and
    /// by [`Tree::open`] to reopen a free-standing persistent tree). The
    /// initial key count is recovered with one full traversal; every
    /// subsequent `size` call is O(1) off the counter this establishes.
    pub(crate) fn attach(pool: Rc<RefCell<P>>, root: PageLink, in_forest: bool) -> Result<Self> {
        let depth = pool.borrow().header(root)?.depth;
        let mut tree = Tree {
            pool,
            root,
            committed_root: root,
            count: 0,
            committed_count: 0,
            update_mode: UpdateMode::Auto,
            stats: None,
            in_forest,
            _marker: PhantomData,
        };
        let pool_rc = tree.pool.clone();
        let count = tree.count_subtree(&pool_rc.borrow(), root, depth)?;
        tree.count = count;
        tree.committed_count = count;
        Ok(tree)
    }

    /// Reopen a free-standing (non-forest) tree previously committed to
    /// `pool`, using the root link `pool` itself remembers. Fails with
    /// [`TreeError::NotFound`] if no standalone tree has ever committed to
    /// this pool.
    pub fn open(pool: Rc<RefCell<P>>) -> Result<Self> {
        let root = pool.borrow().root_link();
        if root.is_null() {
            return Err(TreeError::NotFound);
        }
        Self::attach(pool, root, false)
    }

    pub fn root_page(&self) -> PageLink {
        self.root
    }

    fn root_depth(&self) -> Result<PageDepth> {
        Ok(self.pool.borrow().header(self.root)?.depth)
    }

    /// Depth of the root page (0 for a tree with a single leaf page).
    pub fn depth(&self) -> Result<PageDepth> {
        self.root_depth()
    }

    /// Resolve [`UpdateMode::Auto`] against the backing pool.
    fn effective_mode(&self) -> UpdateMode {
        match self.update_mode {
            UpdateMode::Auto => {
                if self.pool.borrow().is_persistent() {
                    UpdateMode::PersistentTransaction
                } else {
                    UpdateMode::InPlace
                }
            }
            other => other,
        }
    }

    pub fn set_stats(&mut self, stats: Option<SharedStats>) {
        self.stats = stats.clone();
        self.pool.borrow_mut().set_stats(stats);
    }

    pub fn stats_snapshot(&self) -> Option<crate::stats::Stats> {
        self.stats.as_ref().map(|s| *s.borrow())
    }

    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.update_mode = mode;
    }

    fn encode_key(key: &K) -> Vec<u8> {
        let mut out = Vec::new();
        key.encode(&mut out);
        out
    }

    fn encode_value(value: &V) -> Vec<u8> {
        let mut out = Vec::new();
        value.encode(&mut out);
        out
    }

    fn encode_link(link: PageLink) -> Vec<u8> {
        let mut out = Vec::new();
        ValueCodec::encode(&link, &mut out);
        out
    }

    fn decode_link(bytes: &[u8]) -> Result<PageLink> {
        <PageLink as ValueCodec>::decode(bytes)
    }

    // -- lookup -----------------------------------------------------

    /// Read the value stored for `key`, if present.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        stats::bump(&self.stats, |s| s.finds += 1);
        let trail = self.descend(key)?;
        let top = trail.top().expect("descend always produces at least one frame");
        let page = self.pool.borrow().access(top.link, Self::leaf_shape())?;
        if top.is_match() {
            Ok(Some(V::decode(page.value(top.index)?)?))
        } else if trail.at_split() {
            match page.split() {
                Some(bytes) => Ok(Some(V::decode(bytes)?)),
                None => Ok(None),
            }
        } else {
            Ok(None)
        }
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Descend from the root to the leaf that would hold `key`, recording
    /// every frame walked. The trail's `at_split` flag, once set by an
    /// exact match at any level, stays set for every frame below it.
    fn descend(&self, key: &K) -> Result<Trail> {
        let mut trail = Trail::new();
        let pool = self.pool.borrow();
        let mut link = self.root;
        let mut depth = self.root_depth()?;
        loop {
            let shape = Self::shape_for_depth(depth);
            let page = pool.access(link, shape)?;
            let forced = trail.at_split();
            if forced {
                trail.push(Frame {
                    link,
                    depth,
                    index: 0,
                    compare: -1,
                });
                if depth == 0 {
                    return Ok(trail);
                }
                let bytes = page.split().ok_or(TreeError::Corruption(
                    "forced descent hit a page with no split".into(),
                ))?;
                link = Self::decode_link(bytes)?;
                depth -= 1;
                continue;
            }
            let (idx, cmp) = position::<K>(&page, key)?;
            trail.push(Frame { link, depth, index: idx, compare: cmp });
            if depth == 0 {
                return Ok(trail);
            }
            if cmp == 0 {
                link = Self::decode_link(page.value(idx)?)?;
            } else if idx == 0 {
                // Smaller than everything indexed here: only reachable if
                // this page's own split represents the subtree minimum.
                let bytes = page.split().ok_or(TreeError::NotFound)?;
                link = Self::decode_link(bytes)?;
            } else {
                link = Self::decode_link(page.value(idx - 1)?)?;
            }
            depth -= 1;
        }
    }

    // -- insert -------------------------------------------------------

    /// Insert or overwrite `key`, returning the previous value if any.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let trail = self.descend(&key)?;
        let top = *trail.top().expect("descend always produces at least one frame");
        let leaf_shape = Self::leaf_shape();
        let mut leaf = self.pool.borrow().access(top.link, leaf_shape)?;

        let value_bytes = Self::encode_value(&value);

        if top.is_match() {
            let old = V::decode(leaf.value(top.index)?)?;
            leaf.replace(top.index, None, value_bytes, None)?;
            self.pool.borrow_mut().modify(top.link, leaf)?;
            stats::bump(&self.stats, |s| s.replacements += 1);
            return Ok(Some(old));
        }
        if trail.at_split() {
            let old = leaf.split().map(V::decode).transpose()?;
            if old.is_none() {
                self.count += 1;
            }
            leaf.set_split(value_bytes)?;
            self.pool.borrow_mut().modify(top.link, leaf)?;
            stats::bump(&self.stats, |s| s.replacements += 1);
            return Ok(old);
        }

        let key_bytes = Self::encode_key(&key);
        let cost = leaf.entry_filling(key_bytes.len(), value_bytes.len());
        if leaf.filling() + cost <= leaf.header.capacity {
            leaf.insert(top.index, key_bytes, value_bytes, None)?;
            self.pool.borrow_mut().modify(top.link, leaf)?;
            self.count += 1;
            stats::bump(&self.stats, |s| s.insertions += 1);
            return Ok(None);
        }

        // Leaf is full: grow it, then retry the insert against the
        // (now correctly routed) post-split tree.
        self.grow(&trail)?;
        stats::bump(&self.stats, |s| s.grows += 1);
        self.insert(key, value)
    }

    /// Split the leaf named by the trail's final frame, promoting a
    /// separator up the ancestor chain (recursively splitting ancestors
    /// that overflow in turn), up to [`MAX_DEPTH`].
    fn grow(&mut self, trail: &Trail) -> Result<()> {
        let leaf_frame = *trail.top().unwrap();
        let leaf_shape = Self::leaf_shape();
        let mut left = self.pool.borrow().access(leaf_frame.link, leaf_shape)?;
        let cut = optimal_cut(&left);
        if cut == 0 || cut >= left.count() {
            return Err(TreeError::Overflow);
        }

        let depth = left.header.depth;
        let right_link = self.pool.borrow_mut().allocate(depth, leaf_shape)?;
        let mut right = self.pool.borrow().access(right_link, leaf_shape)?;
        left.shift_right(&mut right, cut)?;

        // Lift the new right page's first entry into its own split slot.
        let promoted_key = right.key(0)?.to_vec();
        let promoted_value = right.value(0)?.to_vec();
        right.remove(0, None)?;
        right.set_split(promoted_value)?;

        self.pool.borrow_mut().modify(leaf_frame.link, left)?;
        self.pool.borrow_mut().modify(right_link, right)?;
        stats::bump(&self.stats, |s| s.split_updates += 1);
        tracing::trace!(
            target: "pagewright::tree::split",
            left = leaf_frame.link.0,
            right = right_link.0,
            "split leaf"
        );

        self.propagate_split(trail, trail.len() - 1, promoted_key, right_link)
    }

    /// Insert `(separator_key -> child_link)` into the ancestor at
    /// `trail[level - 1]` (or create a new root if `level == 0`),
    /// recursing upward when that ancestor itself overflows.
    fn propagate_split(
        &mut self,
        trail: &Trail,
        level: usize,
        separator_key: Vec<u8>,
        child_link: PageLink,
    ) -> Result<()> {
        if level == 0 {
            let depth = trail.frame(0).unwrap().depth;
            let new_depth = depth + 1;
            if new_depth > MAX_DEPTH {
                return Err(TreeError::MaxDepthExceeded(MAX_DEPTH));
            }
            let node_shape = Self::node_shape();
            let new_root = self.pool.borrow_mut().allocate(new_depth, node_shape)?;
            let mut root_page = self.pool.borrow().access(new_root, node_shape)?;
            // The old root (now the left child) holds every key smaller
            // than `separator_key`; a node's split slot is exactly the
            // pointer to that "smaller than everything indexed here" child.
            root_page.set_split(Self::encode_link(trail.frame(0).unwrap().link))?;
            root_page.insert(0, separator_key, Self::encode_link(child_link), None)?;
            self.pool.borrow_mut().modify(new_root, root_page)?;
            self.root = new_root;
            stats::bump(&self.stats, |s| s.root_updates += 1);
            tracing::trace!(target: "pagewright::tree::split", root = new_root.0, depth = new_depth, "new root");
            return Ok(());
        }

        let parent_frame = *trail.frame(level - 1).unwrap();
        let node_shape = Self::node_shape();
        let mut parent = self.pool.borrow().access(parent_frame.link, node_shape)?;
        let insert_at = parent_frame.index + 1;
        let cost = parent.entry_filling(separator_key.len(), 4);

        if parent.filling() + cost <= parent.header.capacity {
            parent.insert(insert_at, separator_key, Self::encode_link(child_link), None)?;
            self.pool.borrow_mut().modify(parent_frame.link, parent)?;
            return Ok(());
        }

        // Parent overflow: grow the parent too, inserting the pending
        // separator into whichever half it now belongs in first.
        let cut = optimal_cut(&parent);
        if cut == 0 || cut >= parent.count() {
            return Err(TreeError::Overflow);
        }
        let depth = parent.header.depth;
        let right_link = self.pool.borrow_mut().allocate(depth, node_shape)?;
        let mut right = self.pool.borrow().access(right_link, node_shape)?;
        parent.shift_right(&mut right, cut)?;

        if insert_at <= parent.count() {
            parent.insert(insert_at, separator_key.clone(), Self::encode_link(child_link), None)?;
        } else {
            // `insert_at` indexes the pre-split entry list; `parent.count()`
            // entries of it now live in `parent` (indices `0..cut`), so an
            // insertion position past that boundary lands in `right` at the
            // same offset from the boundary, not one less.
            let right_at = insert_at - parent.count();
            right.insert(right_at, separator_key.clone(), Self::encode_link(child_link), None)?;
        }

        let promoted_key = right.key(0)?.to_vec();
        let promoted_value = right.value(0)?.to_vec();
        right.remove(0, None)?;
        right.set_split(promoted_value)?;

        self.pool.borrow_mut().modify(parent_frame.link, parent)?;
        self.pool.borrow_mut().modify(right_link, right)?;
        stats::bump(&self.stats, |s| s.split_updates += 1);
        tracing::trace!(
            target: "pagewright::tree::split",
            left = parent_frame.link.0,
            right = right_link.0,
            "split node"
        );

        self.propagate_split(trail, level - 1, promoted_key, right_link)
    }

    /// Overwrite `key`'s value if present, without inserting it if it is
    /// not. Returns whether `key` was found.
    pub fn replace(&mut self, key: &K, value: V) -> Result<bool> {
        let trail = self.descend(key)?;
        let top = *trail.top().expect("descend always produces at least one frame");
        let leaf_shape = Self::leaf_shape();
        let mut leaf = self.pool.borrow().access(top.link, leaf_shape)?;
        let value_bytes = Self::encode_value(&value);

        if top.is_match() {
            leaf.replace(top.index, None, value_bytes, None)?;
            self.pool.borrow_mut().modify(top.link, leaf)?;
            stats::bump(&self.stats, |s| s.replacements += 1);
            return Ok(true);
        }
        if trail.at_split() && leaf.split_defined() {
            leaf.set_split(value_bytes)?;
            self.pool.borrow_mut().modify(top.link, leaf)?;
            stats::bump(&self.stats, |s| s.replacements += 1);
            return Ok(true);
        }
        Ok(false)
    }

    /// Read the value stored for `key`, failing with
    /// [`TreeError::NotFound`] instead of returning `None`.
    pub fn at(&self, key: &K) -> Result<V> {
        self.get(key)?.ok_or(TreeError::NotFound)
    }

    /// `1` if `key` is present, `0` otherwise — matching a multi-map
    /// API's `count` even though this tree never stores duplicate keys.
    pub fn count(&self, key: &K) -> Result<usize> {
        Ok(usize::from(self.contains_key(key)?))
    }

    /// Number of keys currently stored. O(1): maintained incrementally by
    /// `insert`/`remove`/`clear` rather than traversing the tree.
    pub fn size(&self) -> u64 {
        self.count
    }

    pub fn empty(&self) -> bool {
        self.count == 0
    }

    /// Discard every entry, freeing every page but the (fresh) root leaf.
    pub fn clear(&mut self) -> Result<()> {
        let depth = self.root_depth()?;
        self.free_subtree(self.root, depth)?;
        self.root = self.pool.borrow_mut().allocate(0, Self::leaf_shape())?;
        self.count = 0;
        Ok(())
    }

    fn free_subtree(&mut self, link: PageLink, depth: PageDepth) -> Result<()> {
        if depth > 0 {
            let page = self.pool.borrow().access(link, Self::node_shape())?;
            for entry in &page.entries {
                let child = Self::decode_link(&entry.value)?;
                self.free_subtree(child, depth - 1)?;
            }
            if let Some(split_bytes) = page.split() {
                let child = Self::decode_link(split_bytes)?;
                self.free_subtree(child, depth - 1)?;
            }
        }
        self.pool.borrow_mut().free(link)?;
        Ok(())
    }

    /// Replace this tree's entire contents with a copy of `other`'s,
    /// discarding whatever this tree held before.
    pub fn assign(&mut self, other: &Tree<K, V, P>) -> Result<()> {
        self.clear()?;
        for entry in other.iter()? {
            let (key, value) = entry?;
            self.insert(key, value)?;
        }
        Ok(())
    }

    // -- iteration --------------------------------------------------------

    /// A cursor positioned at the first key, ready for forward iteration.
    pub fn begin(&self) -> Result<Cursor<K, V, P>> {
        self.iter()
    }

    /// A cursor over every key in ascending order, supporting iteration
    /// from either end.
    pub fn iter(&self) -> Result<Cursor<K, V, P>> {
        let depth = self.root_depth()?;
        Cursor::full_range(self.pool.clone(), self.root, depth, self.count)
    }

    /// A cursor positioned past the last key, ready for backward
    /// iteration from the end.
    pub fn end(&self) -> Result<Cursor<K, V, P>> {
        let depth = self.root_depth()?;
        Cursor::at_end(self.pool.clone(), self.root, depth, self.count)
    }

    /// A cursor positioned at `key` if present, or at the first key
    /// greater than it otherwise, ready for forward iteration from there.
    pub fn find(&self, key: &K) -> Result<Cursor<K, V, P>> {
        let depth = self.root_depth()?;
        Cursor::seek(self.pool.clone(), self.root, depth, key)
    }

    // -- erase ----------------------------------------------------------

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let trail = self.descend(key)?;
        let top = *trail.top().expect("descend always produces at least one frame");
        let leaf_shape = Self::leaf_shape();
        let mut leaf = self.pool.borrow().access(top.link, leaf_shape)?;

        let removed = if top.is_match() {
            let old = V::decode(leaf.value(top.index)?)?;
            leaf.remove(top.index, None)?;
            Some(old)
        } else if trail.at_split() {
            match leaf.split() {
                Some(bytes) => {
                    let old = V::decode(bytes)?;
                    leaf.remove_split();
                    Some(old)
                }
                None => None,
            }
        } else {
            None
        };

        if removed.is_some() {
            self.count -= 1;
            self.pool.borrow_mut().modify(top.link, leaf)?;
            stats::bump(&self.stats, |s| s.removals += 1);
            self.conditional_merge(&trail)?;
        }
        Ok(removed)
    }

    /// After an erase, check the affected leaf (and every ancestor whose
    /// child shrank) against the low/high thresholds and fold underfull
    /// pages into a sibling, cascading upward as needed.
    fn conditional_merge(&mut self, trail: &Trail) -> Result<()> {
        stats::bump(&self.stats, |s| s.merge_attempts += 1);
        let mut level = trail.len();
        while level > 0 {
            level -= 1;
            let frame = *trail.frame(level).unwrap();
            let shape = Self::shape_for_depth(frame.depth);
            let page = self.pool.borrow().access(frame.link, shape)?;
            let low = (page.header.capacity as u32 * LOW_THRESHOLD_NUM) / LOW_THRESHOLD_DEN;
            let filling = page.filling() as u32;

            if page.count() == 0 && !page.split_defined() {
                if level == 0 {
                    // Empty root with no entries and no split: leave as is
                    // (an empty tree is represented by an empty root leaf).
                    return Ok(());
                }
                self.fold_empty_page(trail, level, frame)?;
                continue;
            }

            if filling >= low || level == 0 {
                break;
            }
            self.merge_with_sibling(trail, level, frame)?;
        }
        Ok(())
    }

    fn fold_empty_page(&mut self, trail: &Trail, level: usize, frame: Frame) -> Result<()> {
        let parent_frame = *trail.frame(level - 1).unwrap();
        let node_shape = Self::node_shape();
        let mut parent = self.pool.borrow().access(parent_frame.link, node_shape)?;
        let remove_idx = parent
            .entries
            .iter()
            .position(|e| Self::decode_link(&e.value).map(|l| l == frame.link).unwrap_or(false));
        if let Some(idx) = remove_idx {
            parent.remove(idx, None)?;
            self.pool.borrow_mut().modify(parent_frame.link, parent)?;
        }
        self.pool.borrow_mut().free(frame.link)?;
        stats::bump(&self.stats, |s| s.page_merges += 1);
        tracing::trace!(target: "pagewright::tree::merge", page = frame.link.0, "folded empty page");
        Ok(())
    }

    fn merge_with_sibling(&mut self, trail: &Trail, level: usize, frame: Frame) -> Result<()> {
        let parent_frame = *trail.frame(level - 1).unwrap();
        let node_shape = Self::node_shape();
        let mut parent = self.pool.borrow().access(parent_frame.link, node_shape)?;

        let self_idx = parent
            .entries
            .iter()
            .position(|e| Self::decode_link(&e.value).map(|l| l == frame.link).unwrap_or(false));

        let page_shape = Self::shape_for_depth(frame.depth);

        let Some(self_idx) = self_idx else {
            // This page is reached only via the parent's split slot (it is
            // the leftmost child); nothing to its left to merge with here.
            return Ok(());
        };

        if self_idx > 0 {
            let left_sibling_link = Self::decode_link(&parent.entries[self_idx - 1].value)?;
            let mut left_sibling = self.pool.borrow().access(left_sibling_link, page_shape)?;
            let mut this_page = self.pool.borrow().access(frame.link, page_shape)?;
            let combined = left_sibling.filling() as u32 + this_page.filling() as u32;
            let high = (this_page.header.capacity as u32 * HIGH_THRESHOLD_NUM) / HIGH_THRESHOLD_DEN;
            if combined <= high {
                // The split slot holds `this_page`'s own minimum key, which
                // must land before all of `this_page`'s moved entries, not
                // after — so record the splice point before the shift.
                let splice_at = left_sibling.count();
                let moved = this_page.count();
                this_page.shift_left(&mut left_sibling, moved)?;
                if let Some(split) = this_page.split().map(|b| b.to_vec()) {
                    let key = parent.key(self_idx)?.to_vec();
                    left_sibling.insert(splice_at, key, split, None)?;
                }
                parent.remove(self_idx, None)?;
                self.pool.borrow_mut().modify(left_sibling_link, left_sibling)?;
                self.pool.borrow_mut().modify(parent_frame.link, parent)?;
                self.pool.borrow_mut().free(frame.link)?;
                stats::bump(&self.stats, |s| s.page_merges += 1);
                tracing::trace!(
                    target: "pagewright::tree::merge",
                    into = left_sibling_link.0,
                    removed = frame.link.0,
                    "merged into left sibling"
                );
                return Ok(());
            }
        }
        if self_idx + 1 < parent.count() {
            let right_sibling_link = Self::decode_link(&parent.entries[self_idx + 1].value)?;
            let mut right_sibling = self.pool.borrow().access(right_sibling_link, page_shape)?;
            let mut this_page = self.pool.borrow().access(frame.link, page_shape)?;
            let combined = this_page.filling() as u32 + right_sibling.filling() as u32;
            let high = (this_page.header.capacity as u32 * HIGH_THRESHOLD_NUM) / HIGH_THRESHOLD_DEN;
            if combined <= high {
                if let Some(split) = right_sibling.split().map(|b| b.to_vec()) {
                    let key = parent.key(self_idx + 1)?.to_vec();
                    this_page.insert(this_page.count(), key, split, None)?;
                }
                let moved = right_sibling.count();
                right_sibling.shift_left(&mut this_page, moved)?;
                parent.remove(self_idx + 1, None)?;
                self.pool.borrow_mut().modify(frame.link, this_page)?;
                self.pool.borrow_mut().modify(parent_frame.link, parent)?;
                self.pool.borrow_mut().free(right_sibling_link)?;
                stats::bump(&self.stats, |s| s.page_merges += 1);
                tracing::trace!(
                    target: "pagewright::tree::merge",
                    into = frame.link.0,
                    removed = right_sibling_link.0,
                    "merged right sibling"
                );
            }
        }
        Ok(())
    }

    // -- whole-tree introspection --------------------------------------

    /// Full traversal size check matching the testable property
    /// `size() == sum(leaf.count) + count(ancestors with split defined)`.
    pub fn verify_size(&self) -> Result<u64> {
        let pool = self.pool.borrow();
        let depth = pool.header(self.root)?.depth;
        self.count_subtree(&pool, self.root, depth)
    }

    fn count_subtree(&self, pool: &P, link: PageLink, depth: PageDepth) -> Result<u64> {
        let shape = Self::shape_for_depth(depth);
        let page = pool.access(link, shape)?;
        let mut total = page.count() as u64;
        if page.split_defined() {
            total += 1;
        }
        if depth > 0 {
            for entry in &page.entries {
                let child = Self::decode_link(&entry.value)?;
                total += self.count_subtree(pool, child, depth - 1)?;
            }
            if let Some(split_bytes) = page.split() {
                let child = Self::decode_link(split_bytes)?;
                total += self.count_subtree(pool, child, depth - 1)? - 1;
            }
        }
        Ok(total)
    }

    /// Forward a durable publish to the shared pool, first registering
    /// this tree's root as the pool's reopenable root so a later
    /// [`Tree::open`] can find it. Fails for trees owned by a
    /// [`crate::forest::Forest`], which own the commit boundary (and own
    /// the pool's root link as their registry's, not any one planted
    /// tree's). A no-op under [`UpdateMode::InPlace`], which never stages
    /// writes to roll back in the first place.
    pub fn commit(&mut self) -> Result<()> {
        if self.in_forest {
            return Err(TreeError::InForest);
        }
        if self.effective_mode() == UpdateMode::InPlace {
            return Ok(());
        }
        self.pool.borrow_mut().set_root_link(self.root);
        self.pool.borrow_mut().commit()?;
        self.committed_root = self.root;
        self.committed_count = self.count;
        Ok(())
    }

    /// Forward a rollback to the shared pool, then restore this tree's own
    /// view of its root and size to what they were as of the last commit
    /// (a transaction that grew the tree may have left `self.root`
    /// pointing at a page the rollback just discarded).
    pub fn recover(&mut self) -> Result<()> {
        if self.in_forest {
            return Err(TreeError::InForest);
        }
        if self.effective_mode() == UpdateMode::InPlace {
            return Ok(());
        }
        self.pool.borrow_mut().recover()?;
        self.root = self.committed_root;
        self.count = self.committed_count;
        Ok(())
    }
}

/// Choose a split point that balances *bytes*, not entry count, so a page
/// of wildly uneven entry sizes still splits into two halves that both fit
/// comfortably under capacity.
fn optimal_cut(page: &Page) -> usize {
    if page.count() < 2 {
        return 0;
    }
    let total = page.filling() as i64;
    let target = total / 2;
    let mut running = 0i64;
    let mut best = 1usize;
    let mut best_gap = i64::MAX;
    for i in 0..page.count() {
        let entry_cost = page.entry_filling(page.entries[i].key.len(), page.entries[i].value.len()) as i64;
        running += entry_cost;
        let gap = (running - target).abs();
        if gap < best_gap && i + 1 < page.count() {
            best_gap = gap;
            best = i + 1;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PagePool;

    fn new_tree() -> Tree<u32, u32, PagePool> {
        let pool = Rc::new(RefCell::new(PagePool::new(256)));
        Tree::create(pool).unwrap()
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let mut tree = new_tree();
        assert_eq!(tree.insert(1, 100).unwrap(), None);
        assert_eq!(tree.get(&1).unwrap(), Some(100));
        assert_eq!(tree.get(&2).unwrap(), None);
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut tree = new_tree();
        tree.insert(1, 100).unwrap();
        let old = tree.insert(1, 200).unwrap();
        assert_eq!(old, Some(100));
        assert_eq!(tree.get(&1).unwrap(), Some(200));
    }

    #[test]
    fn remove_returns_and_deletes_value() {
        let mut tree = new_tree();
        tree.insert(1, 100).unwrap();
        assert_eq!(tree.remove(&1).unwrap(), Some(100));
        assert_eq!(tree.get(&1).unwrap(), None);
        assert_eq!(tree.remove(&1).unwrap(), None);
    }

    #[test]
    fn many_inserts_force_growth_and_remain_readable() {
        let mut tree = new_tree();
        for k in 0..40u32 {
            tree.insert(k, k * 10).unwrap();
        }
        for k in 0..40u32 {
            assert_eq!(tree.get(&k).unwrap(), Some(k * 10));
        }
    }

    #[test]
    fn size_matches_full_traversal_after_mixed_operations() {
        let mut tree = new_tree();
        for k in 0..30u32 {
            tree.insert(k, k).unwrap();
        }
        for k in (0..30u32).step_by(3) {
            tree.remove(&k).unwrap();
        }
        let remaining = (0..30u32).filter(|k| k % 3 != 0).count() as u64;
        assert_eq!(tree.verify_size().unwrap(), remaining);
    }
}
