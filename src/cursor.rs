//! Bidirectional in-order iteration over a [`Tree`](crate::tree::Tree).
//!
//! A leaf's own entry list only ever holds the *second-and-later* keys of
//! whatever range it covers — the smallest key reachable under any
//! ancestor is deliberately kept out of every entry list and carried
//! instead in a `split` slot, resolved only once the key that was lifted
//! out of some ancestor's entries is chased all the way down to the leaf
//! that actually owns its value. So an in-order walk has to carry that
//! "pending" key down through every split it follows and only yield it
//! once it reaches a leaf, interleaved with that leaf's own ordinary
//! entries.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::codec::{KeyCodec, ValueCodec};
use crate::error::Result;
use crate::page::{Page, Shape};
use crate::pool::Pool;
use crate::trail::position;
use crate::types::{PageDepth, PageLink};

fn shape_for<K: KeyCodec, V: ValueCodec>(depth: PageDepth) -> Shape {
    if depth == 0 {
        Shape::new(K::FIXED_SIZE, V::FIXED_SIZE)
    } else {
        Shape::node_shape(K::FIXED_SIZE)
    }
}

fn decode_link(bytes: &[u8]) -> Result<PageLink> {
    <PageLink as ValueCodec>::decode(bytes)
}

struct ForwardFrame {
    depth: PageDepth,
    pending_key: Option<Vec<u8>>,
    page: Page,
    /// Next entry index to visit. The frame's own split (if any) was
    /// already resolved at push time — descended into directly, or
    /// skipped because it belongs to an ancestor's `key`-less range — so
    /// it is never reconsidered here.
    index: usize,
    /// Leaf frames only: whether `pending_key`'s split-held value has
    /// already been yielded (or was never eligible to be).
    split_yielded: bool,
}

struct BackwardFrame {
    depth: PageDepth,
    pending_key: Option<Vec<u8>>,
    page: Page,
    /// Next entry index to visit, counting down; `-1` once entries are
    /// exhausted.
    next_index: isize,
    /// Whether the frame's own split child (node) or split value (leaf,
    /// gated on `pending_key`) has already been visited. The split holds
    /// the smallest keys under this page, so going backward it is always
    /// the last thing considered.
    split_done: bool,
}

/// Push the leftmost remaining path from `link` onto `stack`.
///
/// With `target: None` this always prefers a page's split child over its
/// entries (mirroring the fact that split always indexes the smallest
/// subtree). With `target: Some(key)`, it instead steers toward whichever
/// branch contains the first key `>= key`, used by [`seek`].
fn push_leftmost<K: KeyCodec, V: ValueCodec, P: Pool>(
    stack: &mut Vec<ForwardFrame>,
    pool: &P,
    mut link: PageLink,
    mut depth: PageDepth,
    mut pending_key: Option<Vec<u8>>,
    target: Option<&K>,
) -> Result<()> {
    loop {
        let page = pool.access(link, shape_for::<K, V>(depth))?;
        if depth == 0 {
            let index = match target {
                Some(key) => position::<K>(&page, key)?.0,
                None => 0,
            };
            let split_yielded = match (&pending_key, target) {
                (Some(pk), Some(key)) => K::decode(pk)? != *key,
                _ => false,
            };
            stack.push(ForwardFrame { depth, pending_key, page, index, split_yielded });
            return Ok(());
        }
        match target {
            None => {
                if page.split_defined() {
                    let bytes = page.split().unwrap().to_vec();
                    stack.push(ForwardFrame {
                        depth,
                        pending_key: pending_key.clone(),
                        page,
                        index: 0,
                        split_yielded: false,
                    });
                    link = decode_link(&bytes)?;
                } else if page.count() > 0 {
                    let k = page.key(0)?.to_vec();
                    let child = decode_link(page.value(0)?)?;
                    stack.push(ForwardFrame {
                        depth,
                        pending_key: pending_key.clone(),
                        page,
                        index: 1,
                        split_yielded: true,
                    });
                    link = child;
                    pending_key = Some(k);
                } else {
                    stack.push(ForwardFrame { depth, pending_key, page, index: 0, split_yielded: true });
                    return Ok(());
                }
            }
            Some(key) => {
                let (idx, cmp) = position::<K>(&page, key)?;
                if cmp == 0 {
                    let k = page.key(idx)?.to_vec();
                    let child = decode_link(page.value(idx)?)?;
                    stack.push(ForwardFrame {
                        depth,
                        pending_key: pending_key.clone(),
                        page,
                        index: idx + 1,
                        split_yielded: true,
                    });
                    link = child;
                    pending_key = Some(k);
                } else if idx == 0 {
                    let bytes = page
                        .split()
                        .ok_or(crate::error::TreeError::Corruption(
                            "seek hit a page with no split".into(),
                        ))?
                        .to_vec();
                    stack.push(ForwardFrame {
                        depth,
                        pending_key: pending_key.clone(),
                        page,
                        index: 0,
                        split_yielded: false,
                    });
                    link = decode_link(&bytes)?;
                } else {
                    let k = page.key(idx - 1)?.to_vec();
                    let child = decode_link(page.value(idx - 1)?)?;
                    stack.push(ForwardFrame {
                        depth,
                        pending_key: pending_key.clone(),
                        page,
                        index: idx,
                        split_yielded: true,
                    });
                    link = child;
                    pending_key = Some(k);
                }
            }
        }
        depth -= 1;
    }
}

/// Push the rightmost remaining path from `link` onto `stack` — the mirror
/// image of [`push_leftmost`] with `target: None`: always prefer a page's
/// last entry over its split, since the split is the smallest subtree and
/// therefore, going backward, always last.
fn push_rightmost<K: KeyCodec, V: ValueCodec, P: Pool>(
    stack: &mut Vec<BackwardFrame>,
    pool: &P,
    mut link: PageLink,
    mut depth: PageDepth,
    mut pending_key: Option<Vec<u8>>,
) -> Result<()> {
    loop {
        let page = pool.access(link, shape_for::<K, V>(depth))?;
        if depth == 0 {
            let next_index = page.count() as isize - 1;
            stack.push(BackwardFrame { depth, pending_key, page, next_index, split_done: false });
            return Ok(());
        }
        if page.count() > 0 {
            let last = page.count() - 1;
            let k = page.key(last)?.to_vec();
            let child = decode_link(page.value(last)?)?;
            stack.push(BackwardFrame {
                depth,
                pending_key: pending_key.clone(),
                page,
                next_index: last as isize - 1,
                split_done: false,
            });
            link = child;
            pending_key = Some(k);
        } else if page.split_defined() {
            let bytes = page.split().unwrap().to_vec();
            stack.push(BackwardFrame {
                depth,
                pending_key: pending_key.clone(),
                page,
                next_index: -1,
                split_done: false,
            });
            link = decode_link(&bytes)?;
        } else {
            stack.push(BackwardFrame { depth, pending_key, page, next_index: -1, split_done: true });
            return Ok(());
        }
        depth -= 1;
    }
}

fn advance_forward<K: KeyCodec, V: ValueCodec, P: Pool>(
    stack: &mut Vec<ForwardFrame>,
    pool: &P,
) -> Option<Result<(K, V)>> {
    loop {
        let frame = stack.last_mut()?;
        if frame.depth == 0 {
            if !frame.split_yielded {
                frame.split_yielded = true;
                if let Some(pk) = frame.pending_key.clone() {
                    if let Some(bytes) = frame.page.split() {
                        let value = match V::decode(bytes) {
                            Ok(v) => v,
                            Err(e) => return Some(Err(e)),
                        };
                        let key = match K::decode(&pk) {
                            Ok(k) => k,
                            Err(e) => return Some(Err(e)),
                        };
                        return Some(Ok((key, value)));
                    }
                }
            }
            if frame.index < frame.page.count() {
                let i = frame.index;
                frame.index += 1;
                let key = match frame.page.key(i).and_then(K::decode) {
                    Ok(k) => k,
                    Err(e) => return Some(Err(e)),
                };
                let value = match frame.page.value(i).and_then(V::decode) {
                    Ok(v) => v,
                    Err(e) => return Some(Err(e)),
                };
                return Some(Ok((key, value)));
            }
            stack.pop();
            continue;
        }
        if frame.index < frame.page.count() {
            let i = frame.index;
            frame.index += 1;
            let k = match frame.page.key(i) {
                Ok(k) => k.to_vec(),
                Err(e) => return Some(Err(e)),
            };
            let child = match frame.page.value(i).and_then(decode_link) {
                Ok(l) => l,
                Err(e) => return Some(Err(e)),
            };
            let depth = frame.depth - 1;
            if let Err(e) = push_leftmost::<K, V, P>(stack, pool, child, depth, Some(k), None) {
                return Some(Err(e));
            }
            continue;
        }
        stack.pop();
    }
}

fn advance_backward<K: KeyCodec, V: ValueCodec, P: Pool>(
    stack: &mut Vec<BackwardFrame>,
    pool: &P,
) -> Option<Result<(K, V)>> {
    loop {
        let frame = stack.last_mut()?;
        if frame.depth == 0 {
            if frame.next_index >= 0 {
                let i = frame.next_index as usize;
                frame.next_index -= 1;
                let key = match frame.page.key(i).and_then(K::decode) {
                    Ok(k) => k,
                    Err(e) => return Some(Err(e)),
                };
                let value = match frame.page.value(i).and_then(V::decode) {
                    Ok(v) => v,
                    Err(e) => return Some(Err(e)),
                };
                return Some(Ok((key, value)));
            }
            if !frame.split_done {
                frame.split_done = true;
                if let Some(pk) = frame.pending_key.clone() {
                    if let Some(bytes) = frame.page.split() {
                        let value = match V::decode(bytes) {
                            Ok(v) => v,
                            Err(e) => return Some(Err(e)),
                        };
                        let key = match K::decode(&pk) {
                            Ok(k) => k,
                            Err(e) => return Some(Err(e)),
                        };
                        return Some(Ok((key, value)));
                    }
                }
            }
            stack.pop();
            continue;
        }
        if frame.next_index >= 0 {
            let i = frame.next_index as usize;
            frame.next_index -= 1;
            let k = match frame.page.key(i) {
                Ok(k) => k.to_vec(),
                Err(e) => return Some(Err(e)),
            };
            let child = match frame.page.value(i).and_then(decode_link) {
                Ok(l) => l,
                Err(e) => return Some(Err(e)),
            };
            let depth = frame.depth - 1;
            if let Err(e) = push_rightmost::<K, V, P>(stack, pool, child, depth, Some(k)) {
                return Some(Err(e));
            }
            continue;
        }
        if !frame.split_done {
            frame.split_done = true;
            if frame.page.split_defined() {
                let bytes = frame.page.split().unwrap().to_vec();
                let depth = frame.depth - 1;
                let pending = frame.pending_key.clone();
                let child = match decode_link(&bytes) {
                    Ok(l) => l,
                    Err(e) => return Some(Err(e)),
                };
                if let Err(e) = push_rightmost::<K, V, P>(stack, pool, child, depth, pending) {
                    return Some(Err(e));
                }
                continue;
            }
        }
        stack.pop();
    }
}

/// A bidirectional cursor over a tree's keys in ascending order.
///
/// Constructed via [`Tree::begin`](crate::tree::Tree::begin),
/// [`Tree::end`](crate::tree::Tree::end), [`Tree::iter`](crate::tree::Tree::iter)
/// or [`Tree::find`](crate::tree::Tree::find). For a full-range cursor
/// (`begin`/`end`/`iter`) `next` and `next_back` share a count of
/// remaining entries, so alternating calls from both ends meet exactly in
/// the middle without yielding the same entry twice. A `find`-scoped
/// cursor does not track that count, since that would need an O(log n)
/// rank computation this crate does not provide; mixing `next` and
/// `next_back` on one is safe as long as the two ends do not cross.
pub struct Cursor<K, V, P: Pool> {
    pool: Rc<RefCell<P>>,
    forward: Vec<ForwardFrame>,
    backward: Vec<BackwardFrame>,
    remaining: Option<u64>,
    _marker: PhantomData<(K, V)>,
}

impl<K: KeyCodec, V: ValueCodec, P: Pool> Cursor<K, V, P> {
    pub(crate) fn full_range(pool: Rc<RefCell<P>>, root: PageLink, depth: PageDepth, count: u64) -> Result<Self> {
        let mut forward = Vec::new();
        push_leftmost::<K, V, P>(&mut forward, &pool.borrow(), root, depth, None, None)?;
        let mut backward = Vec::new();
        push_rightmost::<K, V, P>(&mut backward, &pool.borrow(), root, depth, None)?;
        Ok(Cursor { pool, forward, backward, remaining: Some(count), _marker: PhantomData })
    }

    pub(crate) fn at_end(pool: Rc<RefCell<P>>, root: PageLink, depth: PageDepth, count: u64) -> Result<Self> {
        let mut backward = Vec::new();
        push_rightmost::<K, V, P>(&mut backward, &pool.borrow(), root, depth, None)?;
        Ok(Cursor { pool, forward: Vec::new(), backward, remaining: Some(count), _marker: PhantomData })
    }

    pub(crate) fn seek(pool: Rc<RefCell<P>>, root: PageLink, depth: PageDepth, key: &K) -> Result<Self> {
        let mut forward = Vec::new();
        push_leftmost::<K, V, P>(&mut forward, &pool.borrow(), root, depth, None, Some(key))?;
        let mut backward = Vec::new();
        push_rightmost::<K, V, P>(&mut backward, &pool.borrow(), root, depth, None)?;
        Ok(Cursor { pool, forward, backward, remaining: None, _marker: PhantomData })
    }
}

impl<K: KeyCodec, V: ValueCodec, P: Pool> Iterator for Cursor<K, V, P> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let pool = self.pool.borrow();
        let item = advance_forward::<K, V, P>(&mut self.forward, &pool);
        if item.is_some() {
            if let Some(r) = &mut self.remaining {
                *r -= 1;
            }
        }
        item
    }
}

impl<K: KeyCodec, V: ValueCodec, P: Pool> DoubleEndedIterator for Cursor<K, V, P> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let pool = self.pool.borrow();
        let item = advance_backward::<K, V, P>(&mut self.backward, &pool);
        if item.is_some() {
            if let Some(r) = &mut self.remaining {
                *r -= 1;
            }
        }
        item
    }
}
