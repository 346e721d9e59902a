//! Integration tests for the page cache behavior of the buffer pool:
//! residency, NO-STEAL eviction, flushing and discarding.

use std::sync::Arc;

use strata::buffer::BufferPool;
use strata::catalog::Catalog;
use strata::common::{PageId, Permissions, StrataError, TableId, TransactionId};
use strata::storage::disk::HeapFile;
use strata::storage::page::HeapPageRef;
use strata::tuple::Tuple;
use tempfile::NamedTempFile;

const TABLE: TableId = TableId(1);

fn create_pool(pool_size: usize, num_pages: u32) -> (Arc<BufferPool>, Arc<HeapFile>, NamedTempFile) {
    let temp = NamedTempFile::new().unwrap();
    let catalog = Arc::new(Catalog::new());
    let file = Arc::new(HeapFile::new(TABLE, temp.path()).unwrap());
    for _ in 0..num_pages {
        file.append_empty_page().unwrap();
    }
    catalog.register_table(Arc::clone(&file));
    (Arc::new(BufferPool::new(pool_size, catalog)), file, temp)
}

fn pid(n: u32) -> PageId {
    PageId::new(TABLE, n)
}

#[test]
fn test_pages_stay_resident_within_capacity() {
    let (pool, file, _temp) = create_pool(4, 3);
    let tid = TransactionId::new();

    for n in 0..3 {
        pool.get_page(tid, pid(n), Permissions::ReadOnly).unwrap();
    }
    assert_eq!(pool.cached_pages(), 3);
    assert_eq!(file.num_reads(), 3);

    // Re-reading is served from the cache
    pool.get_page(tid, pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(file.num_reads(), 3);
}

#[test]
fn test_capacity_one_clean_page_gives_way() {
    let (pool, _file, _temp) = create_pool(1, 2);
    let t1 = TransactionId::new();
    let t2 = TransactionId::new();

    pool.get_page(t1, pid(0), Permissions::ReadOnly).unwrap();

    // The sole slot holds a clean page, so a second transaction's fetch
    // evicts it and succeeds
    pool.get_page(t2, pid(1), Permissions::ReadOnly).unwrap();
    assert_eq!(pool.cached_pages(), 1);

    // Both transactions still hold their locks
    assert!(pool.holds_lock(t1, pid(0)));
    assert!(pool.holds_lock(t2, pid(1)));
}

#[test]
fn test_capacity_one_dirty_page_exhausts_buffer() {
    let (pool, _file, _temp) = create_pool(1, 2);
    let t1 = TransactionId::new();
    let t2 = TransactionId::new();

    let page = pool.get_page(t1, pid(0), Permissions::ReadWrite).unwrap();
    {
        let mut data = page.write();
        data[64] = 0xAA;
    }
    page.set_dirty(true);

    // The sole slot holds uncommitted work; NO-STEAL forbids evicting it
    assert!(matches!(
        pool.get_page(t2, pid(1), Permissions::ReadOnly),
        Err(StrataError::BufferExhausted)
    ));

    // After t1 commits, the slot is clean and reusable
    pool.complete_transaction(t1, true).unwrap();
    pool.get_page(t2, pid(1), Permissions::ReadOnly).unwrap();
}

#[test]
fn test_dirty_page_never_evicted() {
    let (pool, _file, _temp) = create_pool(2, 3);
    let t1 = TransactionId::new();

    let p0 = pool.get_page(t1, pid(0), Permissions::ReadWrite).unwrap();
    {
        let mut data = p0.write();
        data[64] = 1;
    }
    p0.set_dirty(true);

    pool.get_page(t1, pid(1), Permissions::ReadOnly).unwrap();

    // Fetching a third page must evict the clean page, not the dirty one
    pool.get_page(t1, pid(2), Permissions::ReadOnly).unwrap();
    assert_eq!(pool.cached_pages(), 2);

    // The dirty page is still resident with its modification intact
    let again = pool.get_page(t1, pid(0), Permissions::ReadOnly).unwrap();
    assert!(Arc::ptr_eq(&p0, &again));
    assert_eq!(again.read()[64], 1);
}

#[test]
fn test_commit_persists_through_reopen() {
    let temp = NamedTempFile::new().unwrap();
    let path = temp.path().to_path_buf();

    {
        let catalog = Arc::new(Catalog::new());
        let file = Arc::new(HeapFile::new(TABLE, &path).unwrap());
        catalog.register_table(file);
        let pool = BufferPool::new(4, catalog);

        let tid = TransactionId::new();
        let mut tuple = Tuple::new(&b"survives restart"[..]);
        pool.insert_tuple(tid, TABLE, &mut tuple).unwrap();
        pool.complete_transaction(tid, true).unwrap();
    }

    // A fresh heap file over the same path sees the committed bytes
    let file = HeapFile::new(TABLE, &path).unwrap();
    let data = file.read_page(pid(0)).unwrap();
    let view = HeapPageRef::new(&data);
    assert_eq!(view.tuple_count(), 1);
    assert_eq!(
        view.get_tuple(strata::SlotId::new(0)).unwrap(),
        b"survives restart"
    );
}

#[test]
fn test_commit_refreshes_before_image() {
    let (pool, _file, _temp) = create_pool(4, 0);
    let tid = TransactionId::new();

    let mut tuple = Tuple::new(&b"committed row"[..]);
    pool.insert_tuple(tid, TABLE, &mut tuple).unwrap();

    let page = pool
        .get_page(tid, tuple.rid().unwrap().page_id, Permissions::ReadOnly)
        .unwrap();
    pool.complete_transaction(tid, true).unwrap();

    // The before-image now matches the committed content, so a later
    // abort by another transaction cannot roll the commit back
    assert_eq!(&*page.before_image(), &*page.snapshot());
    assert!(!page.is_dirty());
}

#[test]
fn test_flush_all_pages_cleans_cache() {
    let (pool, file, _temp) = create_pool(4, 2);
    let tid = TransactionId::new();

    for n in 0..2 {
        let page = pool.get_page(tid, pid(n), Permissions::ReadWrite).unwrap();
        {
            let mut data = page.write();
            data[64] = n as u8 + 1;
        }
        page.set_dirty(true);
    }

    let writes_before = file.num_writes();
    pool.flush_all_pages().unwrap();
    assert_eq!(file.num_writes(), writes_before + 2);

    for n in 0..2 {
        let page = pool.get_page(tid, pid(n), Permissions::ReadOnly).unwrap();
        assert!(!page.is_dirty());
    }
}

#[test]
fn test_discard_page_drops_unflushed_writes() {
    let (pool, file, _temp) = create_pool(4, 1);
    let tid = TransactionId::new();

    let page = pool.get_page(tid, pid(0), Permissions::ReadWrite).unwrap();
    {
        let mut data = page.write();
        data[64] = 0xFF;
    }
    page.set_dirty(true);

    let writes_before = file.num_writes();
    pool.discard_page(pid(0));
    assert_eq!(file.num_writes(), writes_before);

    // The next fetch rereads the on-disk bytes
    let reloaded = pool.get_page(tid, pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(reloaded.read()[64], 0);
    assert_eq!(file.num_reads(), 2);
}
