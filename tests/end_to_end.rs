//! Crate-level scenarios exercising the tree, pool, forest, and streaming
//! layers together, the way a real embedder would use them.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use pagewright::{Forest, PagePool, PersistentPagePool, PoolOptions, StreamingTree, Tree, TreeError, UpdateMode};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pagewright=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

#[test]
fn forward_insert_then_erase_round_trip() {
    init_tracing();
    let pool = Rc::new(RefCell::new(PagePool::new(512)));
    let mut tree: Tree<u32, u32, PagePool> = Tree::create(pool).unwrap();

    for k in 0..200u32 {
        assert_eq!(tree.insert(k, k * 2).unwrap(), None);
    }
    for k in 0..200u32 {
        assert_eq!(tree.get(&k).unwrap(), Some(k * 2));
    }
    for k in 0..200u32 {
        assert_eq!(tree.remove(&k).unwrap(), Some(k * 2));
    }
    for k in 0..200u32 {
        assert_eq!(tree.get(&k).unwrap(), None);
    }
    assert_eq!(tree.verify_size().unwrap(), 0);
}

#[test]
fn reverse_insert_with_randomized_erase_preserves_invariants() {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let pool = Rc::new(RefCell::new(PagePool::new(512)));
    let mut tree: Tree<u32, Vec<u8>, PagePool> = Tree::create(pool).unwrap();

    for k in (0..300u32).rev() {
        tree.insert(k, k.to_le_bytes().to_vec()).unwrap();
    }
    assert_eq!(tree.verify_size().unwrap(), 300);

    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut keys: Vec<u32> = (0..300u32).collect();
    keys.shuffle(&mut rng);

    for (i, k) in keys.iter().enumerate() {
        let removed = tree.remove(k).unwrap();
        assert_eq!(removed, Some(k.to_le_bytes().to_vec()));
        assert_eq!(tree.verify_size().unwrap(), (300 - i - 1) as u64);
    }
}

#[test]
fn transaction_rollback_discards_uncommitted_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tx.db");
    let options = PoolOptions {
        capacity: 4096,
        fsync: false,
    };
    let pool = Rc::new(RefCell::new(PersistentPagePool::create(&path, options).unwrap()));
    let mut tree: Tree<u32, u32, PersistentPagePool> = Tree::create(pool).unwrap();
    tree.set_update_mode(UpdateMode::PersistentTransaction);

    for k in 0..1000u32 {
        tree.insert(k, k).unwrap();
    }
    tree.commit().unwrap();

    for k in 0..1000u32 {
        tree.insert(k, k + 1).unwrap();
    }
    for k in 0..1000u32 {
        assert_eq!(tree.get(&k).unwrap(), Some(k + 1));
    }

    tree.recover().unwrap();

    for k in 0..1000u32 {
        assert_eq!(tree.get(&k).unwrap(), Some(k));
    }
    assert_eq!(tree.size(), 1000);
}

#[test]
fn standalone_tree_reopens_via_pools_remembered_root() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.db");
    let options = PoolOptions {
        capacity: 4096,
        fsync: false,
    };
    {
        let pool = Rc::new(RefCell::new(PersistentPagePool::create(&path, options).unwrap()));
        let mut tree: Tree<u32, u32, PersistentPagePool> = Tree::create(pool).unwrap();
        for k in 0..50u32 {
            tree.insert(k, k * 10).unwrap();
        }
        tree.commit().unwrap();
    }
    {
        let pool = Rc::new(RefCell::new(PersistentPagePool::open(&path, options).unwrap()));
        let tree: Tree<u32, u32, PersistentPagePool> = Tree::open(pool).unwrap();
        assert_eq!(tree.size(), 50);
        for k in 0..50u32 {
            assert_eq!(tree.get(&k).unwrap(), Some(k * 10));
        }
    }
}

#[test]
fn cursor_yields_keys_in_strictly_ascending_order_from_both_ends() {
    let pool = Rc::new(RefCell::new(PagePool::new(256)));
    let mut tree: Tree<u32, u32, PagePool> = Tree::create(pool).unwrap();
    for k in (0..200u32).rev() {
        tree.insert(k, k * 2).unwrap();
    }

    let forward: Vec<u32> = tree.iter().unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(forward, (0..200u32).collect::<Vec<_>>());
    for pair in forward.windows(2) {
        assert!(pair[0] < pair[1]);
    }

    let mut cursor = tree.end().unwrap();
    let mut backward = Vec::new();
    while let Some(entry) = cursor.next_back() {
        backward.push(entry.unwrap().0);
    }
    backward.reverse();
    assert_eq!(backward, forward);

    let from_100: Vec<u32> = tree.find(&100).unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(from_100, (100..200u32).collect::<Vec<_>>());
}

#[test]
fn tree_api_surface_matches_spec_operations() {
    let pool = Rc::new(RefCell::new(PagePool::new(256)));
    let mut tree: Tree<u32, u32, PagePool> = Tree::create(pool).unwrap();

    assert!(tree.empty());
    assert_eq!(tree.size(), 0);

    tree.insert(1, 100).unwrap();
    assert!(!tree.replace(&2, 999).unwrap());
    assert!(tree.replace(&1, 200).unwrap());
    assert_eq!(tree.at(&1).unwrap(), 200);
    assert!(matches!(tree.at(&2), Err(TreeError::NotFound)));
    assert_eq!(tree.count(&1).unwrap(), 1);
    assert_eq!(tree.count(&2).unwrap(), 0);
    assert_eq!(tree.size(), 1);
    assert!(!tree.empty());

    tree.clear().unwrap();
    assert!(tree.empty());
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.depth().unwrap(), 0);

    let mut other: Tree<u32, u32, PagePool> = Tree::create(Rc::new(RefCell::new(PagePool::new(256)))).unwrap();
    for k in 0..30u32 {
        other.insert(k, k).unwrap();
    }
    tree.assign(&other).unwrap();
    assert_eq!(tree.size(), other.size());
    for k in 0..30u32 {
        assert_eq!(tree.get(&k).unwrap(), Some(k));
    }
}

#[test]
fn grow_then_merge_keeps_tree_readable() {
    let pool = Rc::new(RefCell::new(PagePool::new(256)));
    let mut tree: Tree<u64, u64, PagePool> = Tree::create(pool).unwrap();

    for k in 0..150u64 {
        tree.insert(k, k).unwrap();
    }
    for k in 0..120u64 {
        tree.remove(&k).unwrap();
    }
    for k in 120..150u64 {
        assert_eq!(tree.get(&k).unwrap(), Some(k));
    }
    for k in 0..120u64 {
        assert_eq!(tree.get(&k).unwrap(), None);
    }
    assert_eq!(tree.verify_size().unwrap(), 30);
}

#[test]
fn forest_commits_every_planted_tree_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.db");
    let options = PoolOptions {
        capacity: 512,
        fsync: false,
    };
    let pool = Rc::new(RefCell::new(PersistentPagePool::create(&path, options).unwrap()));
    let mut forest = Forest::new(pool).unwrap();

    let users = forest.plant::<u32, Vec<u8>>().unwrap();
    let orders = forest.plant::<u32, Vec<u8>>().unwrap();

    {
        let mut users_tree: Tree<u32, Vec<u8>, PersistentPagePool> = forest.tree(users).unwrap();
        users_tree.insert(1, b"alice".to_vec()).unwrap();
        forest.update_root(users, users_tree.root_page()).unwrap();
    }
    {
        let mut orders_tree: Tree<u32, Vec<u8>, PersistentPagePool> = forest.tree(orders).unwrap();
        orders_tree.insert(100, b"widget".to_vec()).unwrap();
        forest.update_root(orders, orders_tree.root_page()).unwrap();
    }

    forest.commit().unwrap();

    let users_tree: Tree<u32, Vec<u8>, PersistentPagePool> = forest.tree(users).unwrap();
    let orders_tree: Tree<u32, Vec<u8>, PersistentPagePool> = forest.tree(orders).unwrap();
    assert_eq!(users_tree.get(&1).unwrap(), Some(b"alice".to_vec()));
    assert_eq!(orders_tree.get(&100).unwrap(), Some(b"widget".to_vec()));
}

#[test]
fn forest_recover_rolls_back_every_planted_tree_to_its_last_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest-rollback.db");
    let options = PoolOptions {
        capacity: 4096,
        fsync: false,
    };
    let pool = Rc::new(RefCell::new(PersistentPagePool::create(&path, options).unwrap()));
    let mut forest = Forest::new(pool).unwrap();

    let first = forest.plant::<u32, u32>().unwrap();
    let second = forest.plant::<u32, u32>().unwrap();

    {
        let mut first_tree: Tree<u32, u32, PersistentPagePool> = forest.tree(first).unwrap();
        for k in 0..100u32 {
            first_tree.insert(k, k).unwrap();
        }
        forest.update_root(first, first_tree.root_page()).unwrap();
        let mut second_tree: Tree<u32, u32, PersistentPagePool> = forest.tree(second).unwrap();
        for k in 0..100u32 {
            second_tree.insert(k, k * 2).unwrap();
        }
        forest.update_root(second, second_tree.root_page()).unwrap();
    }
    forest.commit().unwrap();

    {
        let mut first_tree: Tree<u32, u32, PersistentPagePool> = forest.tree(first).unwrap();
        for k in 100..150u32 {
            first_tree.insert(k, k).unwrap();
        }
        forest.update_root(first, first_tree.root_page()).unwrap();
        let mut second_tree: Tree<u32, u32, PersistentPagePool> = forest.tree(second).unwrap();
        for k in 100..150u32 {
            second_tree.insert(k, k * 2).unwrap();
        }
        forest.update_root(second, second_tree.root_page()).unwrap();
    }
    forest.recover().unwrap();

    let first_tree: Tree<u32, u32, PersistentPagePool> = forest.tree(first).unwrap();
    let second_tree: Tree<u32, u32, PersistentPagePool> = forest.tree(second).unwrap();
    assert_eq!(first_tree.size(), 100);
    assert_eq!(second_tree.size(), 100);
    assert_eq!(first_tree.get(&120).unwrap(), None);
    assert_eq!(second_tree.get(&120).unwrap(), None);
}

#[test]
fn streaming_value_round_trips_across_many_chunks() {
    let pool = Rc::new(RefCell::new(PagePool::new(256)));
    let streaming: StreamingTree<u32, PagePool> = StreamingTree::create(pool).unwrap();

    let payload: Vec<Vec<u8>> = (0..20u8).map(|i| vec![i; 37]).collect();
    {
        let mut writer = streaming.writer(7).unwrap();
        for chunk in &payload {
            writer.write_chunk(chunk.clone()).unwrap();
        }
    }

    let mut reader = streaming.reader(7).unwrap();
    let mut expected = Vec::new();
    for chunk in &payload {
        expected.extend_from_slice(chunk);
    }
    assert_eq!(reader.read_all().unwrap(), expected);
    drop(reader);

    assert!(streaming.writer(7).is_ok());
}

#[test]
fn streaming_value_rejects_concurrent_writer_and_reader() {
    let pool = Rc::new(RefCell::new(PagePool::new(256)));
    let streaming: StreamingTree<u32, PagePool> = StreamingTree::create(pool).unwrap();
    let _writer = streaming.writer(1).unwrap();
    let err = streaming.reader(1).unwrap_err();
    assert!(matches!(err, TreeError::ConcurrentAccess));
}
