use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::common::{PageId, Permissions, Result, StrataError, TableId, TransactionId};
use crate::tuple::Tuple;

use super::{LockTable, Page, PageCache, WaitForGraph};

/// BufferPool multiplexes concurrent transactions over a bounded cache of
/// disk pages. It is responsible for locking: fetching a page acquires a
/// page-granular shared or exclusive lock on behalf of the transaction,
/// held until the transaction completes. Acquisition busy-polls, probing a
/// wait-for graph for deadlock on every failed attempt; a transaction caught
/// in a cycle fails with `TransactionAborted` and must be rolled back by its
/// caller.
///
/// Buffering follows NO-STEAL/FORCE: a dirty page is never evicted or
/// written back while its writer is in flight, and commit flushes every page
/// the transaction dirtied. Abort restores each written page from its
/// before-image, so an aborted transaction leaves no trace.
///
/// One instance serves the whole process; collaborators receive it by
/// reference rather than through a global.
pub struct BufferPool {
    /// Resident pages
    cache: PageCache,
    /// Page-granular lock state
    lock_table: LockTable,
    /// Blocked-transaction edges for deadlock detection
    wait_graph: WaitForGraph,
    /// Pages each live transaction has locked through `get_page`
    touched: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
    /// Table routing
    catalog: Arc<Catalog>,
}

impl BufferPool {
    /// Creates a BufferPool caching up to `pool_size` pages, routing I/O
    /// through the given catalog.
    pub fn new(pool_size: usize, catalog: Arc<Catalog>) -> Self {
        Self {
            cache: PageCache::new(pool_size),
            lock_table: LockTable::new(),
            wait_graph: WaitForGraph::new(),
            touched: Mutex::new(HashMap::new()),
            catalog,
        }
    }

    /// Returns the maximum number of resident pages.
    pub fn pool_size(&self) -> usize {
        self.cache.capacity()
    }

    /// Returns the number of currently resident pages.
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    /// Retrieves the specified page with the associated permissions on
    /// behalf of `tid`, blocking until the lock is granted.
    ///
    /// Acquisition loops over non-blocking attempts. After each failure the
    /// transaction's wait-for edges are rebuilt from the page's current
    /// holders and the graph is checked for a cycle through `tid`; on a
    /// cycle the edges are dropped and the call fails with
    /// `TransactionAborted`, which the caller must answer by rolling the
    /// transaction back (`complete_transaction(tid, false)`).
    ///
    /// Once locked, the page is served from the cache, loading from the
    /// owning heap file on a miss (which may evict a clean page, or fail
    /// with `BufferExhausted` if every resident page is dirty).
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<Arc<Page>> {
        self.acquire_lock(tid, pid, perm)?;

        self.touched.lock().entry(tid).or_default().insert(pid);

        let file = self.catalog.storage_handle(pid.table_id())?;
        self.cache.fetch(pid, &file)
    }

    fn acquire_lock(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<()> {
        loop {
            if self.lock_table.try_acquire(tid, pid, perm) {
                self.wait_graph.clear(tid);
                return Ok(());
            }

            let mut blockers = self.lock_table.holders(pid);
            blockers.remove(&tid);
            self.wait_graph.update(tid, blockers);

            if self.wait_graph.has_cycle(tid) {
                self.wait_graph.clear(tid);
                debug!("deadlock: aborting {} waiting on {}", tid, pid);
                return Err(StrataError::TransactionAborted(tid));
            }

            trace!("{} blocked on {}", tid, pid);
            thread::yield_now();
        }
    }

    /// Adds a tuple to the specified table on behalf of `tid`. The heap
    /// file acquires a write lock on every page it touches by calling back
    /// into `get_page`; the pages it reports as modified are marked dirty
    /// and (re)inserted into the cache so later requests see them.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let file = self.catalog.storage_handle(table_id)?;
        let modified = file.insert_tuple(self, tid, tuple)?;
        for page in modified {
            page.set_dirty(true);
            self.cache.put(page)?;
        }
        Ok(())
    }

    /// Removes a stored tuple on behalf of `tid`, routed through the table
    /// named by the tuple's record id. Locking and dirty marking as for
    /// `insert_tuple`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.rid().ok_or(StrataError::MissingRecordId)?;
        let file = self.catalog.storage_handle(rid.page_id.table_id())?;
        let modified = file.delete_tuple(self, tid, tuple)?;
        for page in modified {
            page.set_dirty(true);
            self.cache.put(page)?;
        }
        Ok(())
    }

    /// Releases `tid`'s lock on a single page before the transaction
    /// completes.
    ///
    /// Calling this is risky: dropping a lock early lets other transactions
    /// observe state the releasing transaction still depends on, breaking
    /// isolation. It exists for narrow protocol needs where an operation
    /// can prove the page's content no longer matters to it.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_table.release(tid, pid);
        if let Some(pages) = self.touched.lock().get_mut(&tid) {
            pages.remove(&pid);
        }
    }

    /// Returns whether `tid` holds a lock on `pid` in either mode.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_table.holds(tid, pid)
    }

    /// Commits or aborts `tid`, then releases every lock it holds.
    ///
    /// Commit (FORCE): every page the transaction dirtied is flushed to its
    /// heap file and its before-image is refreshed to the persisted bytes.
    /// Abort: every page the transaction wrote is restored in place from
    /// its before-image. Because the transaction still holds its exclusive
    /// locks while this runs, and each lock is released only after its page
    /// has been flushed or restored, no other transaction ever observes a
    /// half-committed or half-rolled-back page.
    pub fn complete_transaction(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let touched = self.touched.lock().remove(&tid).unwrap_or_default();

        for pid in touched {
            if let Some(page) = self.cache.get(pid) {
                // Only pages under this transaction's exclusive lock can
                // hold its writes
                if self.lock_table.holds_exclusive(tid, pid) {
                    if commit {
                        if page.is_dirty() {
                            self.flush_page(pid)?;
                            page.set_before_image();
                        }
                    } else {
                        page.restore_before_image();
                    }
                }
            }
            self.lock_table.release(tid, pid);
        }

        self.wait_graph.clear(tid);
        debug!(
            "{} {}",
            tid,
            if commit { "committed" } else { "aborted" }
        );
        Ok(())
    }

    /// Writes a resident page to its heap file and marks it clean. Does not
    /// touch the before-image; only commit does that.
    ///
    /// NB: flushing a page dirtied by an in-flight transaction persists
    /// uncommitted data, which NO-STEAL otherwise forbids. Reserved for
    /// shutdown-style callers that know no transaction is live.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        if let Some(page) = self.cache.get(pid) {
            let file = self.catalog.storage_handle(pid.table_id())?;
            file.write_page(&page)?;
            page.set_dirty(false);
        }
        Ok(())
    }

    /// Flushes every resident page. Same caveat as `flush_page`.
    pub fn flush_all_pages(&self) -> Result<()> {
        for pid in self.cache.page_ids() {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without flushing it, so the next fetch
    /// rereads it from disk. Used by recovery-style callers that must not
    /// be served a stale cached copy.
    pub fn discard_page(&self, pid: PageId) {
        self.cache.remove(pid);
    }
}
