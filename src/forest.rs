//! A `Forest` groups several trees over one shared pool so they commit and
//! recover atomically together.
//!
//! One pool, several named sub-structures, one commit boundary. A planted
//! tree's root is recorded not in some ad hoc in-memory map but in a
//! `Tree<TreeIndex, PageLink>` of its own — the forest's *registry* —
//! sharing the same `Rc<RefCell<P>>` pool handle every planted tree does.
//! Since the pool's copy-on-update staging is shared by every tree drawing
//! from it, committing or recovering the registry transparently commits or
//! recovers every planted tree's pages too: there is nothing forest-level
//! left to roll back by hand.

use std::cell::RefCell;
use std::rc::Rc;

use crate::codec::{KeyCodec, ValueCodec};
use crate::error::{Result, TreeError};
use crate::pool::Pool;
use crate::tree::Tree;
use crate::types::{PageLink, TreeIndex, TREE_INDEX_MAX};

/// A collection of trees sharing one pool and one commit boundary.
pub struct Forest<P: Pool> {
    pool: Rc<RefCell<P>>,
    registry: Tree<TreeIndex, PageLink, P>,
    next_index: TreeIndex,
}

impl<P: Pool> Forest<P> {
    pub fn new(pool: Rc<RefCell<P>>) -> Result<Self> {
        let registry = Tree::create(pool.clone())?;
        Ok(Forest { pool, registry, next_index: 1 })
    }

    /// Reopen a forest previously committed to `pool`, recovering its
    /// registry (and therefore the index -> root mapping for every tree
    /// planted in it) from the pool's remembered root link.
    pub fn open(pool: Rc<RefCell<P>>) -> Result<Self> {
        let registry = Tree::open(pool.clone())?;
        let next_index = registry
            .iter()?
            .try_fold(1u32, |max, entry| entry.map(|(index, _)| max.max(index + 1)))?;
        Ok(Forest { pool, registry, next_index })
    }

    /// Plant a brand-new, empty tree and return the index it was
    /// registered under.
    pub fn plant<K, V>(&mut self) -> Result<TreeIndex>
    where
        K: KeyCodec,
        V: ValueCodec,
    {
        if self.next_index > TREE_INDEX_MAX {
            return Err(TreeError::OutOfMemory);
        }
        let tree = Tree::<K, V, P>::create(self.pool.clone())?;
        let index = self.next_index;
        self.next_index += 1;
        self.registry.insert(index, tree.root_page())?;
        Ok(index)
    }

    /// Materialize a previously planted tree for use. Returns a `Tree`
    /// sharing this forest's pool; `Tree::commit`/`Tree::recover` on it
    /// fail with [`TreeError::InForest`] since the forest owns that
    /// boundary instead.
    pub fn tree<K, V>(&self, index: TreeIndex) -> Result<Tree<K, V, P>>
    where
        K: KeyCodec,
        V: ValueCodec,
    {
        let root = self
            .registry
            .get(&index)?
            .ok_or(TreeError::InvalidIndex(index as usize))?;
        Tree::attach(self.pool.clone(), root, true)
    }

    /// Record a tree's current root after mutating it through a handle
    /// obtained from [`Forest::tree`] (root pointers can change on every
    /// insert that grows the tree, so the forest must be told).
    pub fn update_root(&mut self, index: TreeIndex, root: PageLink) -> Result<()> {
        if !self.registry.replace(&index, root)? {
            return Err(TreeError::InvalidIndex(index as usize));
        }
        Ok(())
    }

    pub fn contains(&self, index: TreeIndex) -> bool {
        self.registry.contains_key(&index).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.registry.size() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.registry.empty()
    }

    /// Durably publish every tree's state at once.
    pub fn commit(&mut self) -> Result<()> {
        self.registry.commit()
    }

    /// Roll back every tree's state to the last commit at once.
    pub fn recover(&mut self) -> Result<()> {
        self.registry.recover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PagePool;

    #[test]
    fn plant_and_use_two_independent_trees() {
        let pool = Rc::new(RefCell::new(PagePool::new(256)));
        let mut forest = Forest::new(pool).unwrap();
        let a = forest.plant::<u32, u32>().unwrap();
        let b = forest.plant::<u32, u32>().unwrap();
        assert_ne!(a, b);

        let mut tree_a: Tree<u32, u32, PagePool> = forest.tree(a).unwrap();
        tree_a.insert(1, 100).unwrap();
        forest.update_root(a, tree_a.root_page()).unwrap();

        let tree_b: Tree<u32, u32, PagePool> = forest.tree(b).unwrap();
        assert_eq!(tree_b.get(&1).unwrap(), None);

        let tree_a_again: Tree<u32, u32, PagePool> = forest.tree(a).unwrap();
        assert_eq!(tree_a_again.get(&1).unwrap(), Some(100));
    }

    #[test]
    fn tree_commit_fails_inside_a_forest() {
        let pool = Rc::new(RefCell::new(PagePool::new(256)));
        let mut forest = Forest::new(pool).unwrap();
        let idx = forest.plant::<u32, u32>().unwrap();
        let mut tree: Tree<u32, u32, PagePool> = forest.tree(idx).unwrap();
        assert!(matches!(tree.commit(), Err(TreeError::InForest)));
    }

    #[test]
    fn planting_past_tree_index_max_fails() {
        let pool = Rc::new(RefCell::new(PagePool::new(256)));
        let mut forest = Forest::new(pool).unwrap();
        forest.next_index = TREE_INDEX_MAX;
        forest.plant::<u32, u32>().unwrap();
        assert!(matches!(forest.plant::<u32, u32>(), Err(TreeError::OutOfMemory)));
    }

    #[test]
    fn recover_rolls_back_every_planted_tree_together() {
        let pool = Rc::new(RefCell::new(PagePool::new(4096)));
        let mut forest = Forest::new(pool).unwrap();
        let a = forest.plant::<u32, u32>().unwrap();
        let b = forest.plant::<u32, u32>().unwrap();

        {
            let mut tree_a: Tree<u32, u32, PagePool> = forest.tree(a).unwrap();
            for k in 0..100u32 {
                tree_a.insert(k, k).unwrap();
            }
            forest.update_root(a, tree_a.root_page()).unwrap();
            let mut tree_b: Tree<u32, u32, PagePool> = forest.tree(b).unwrap();
            for k in 0..100u32 {
                tree_b.insert(k, k * 2).unwrap();
            }
            forest.update_root(b, tree_b.root_page()).unwrap();
        }
        forest.commit().unwrap();

        {
            let mut tree_a: Tree<u32, u32, PagePool> = forest.tree(a).unwrap();
            for k in 100..150u32 {
                tree_a.insert(k, k).unwrap();
            }
            forest.update_root(a, tree_a.root_page()).unwrap();
            let mut tree_b: Tree<u32, u32, PagePool> = forest.tree(b).unwrap();
            for k in 100..150u32 {
                tree_b.insert(k, k * 2).unwrap();
            }
            forest.update_root(b, tree_b.root_page()).unwrap();
        }
        forest.recover().unwrap();

        let tree_a: Tree<u32, u32, PagePool> = forest.tree(a).unwrap();
        let tree_b: Tree<u32, u32, PagePool> = forest.tree(b).unwrap();
        assert_eq!(tree_a.size(), 100);
        assert_eq!(tree_b.size(), 100);
        assert_eq!(tree_a.get(&120).unwrap(), None);
        assert_eq!(tree_b.get(&120).unwrap(), None);
    }
}
