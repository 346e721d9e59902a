use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::common::{PageId, Permissions, TransactionId};

/// Lock state for a single page: the set of shared holders and the optional
/// exclusive holder. At most one transaction holds the exclusive lock, and
/// once settled the shared set never contains the exclusive holder.
#[derive(Default)]
struct LockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl LockState {
    /// Non-blocking acquisition attempt. Grant rules:
    ///   - denied outright if another transaction holds the exclusive lock;
    ///   - ReadWrite granted when no other shared holders remain; a lone
    ///     shared hold by the requester upgrades in place (the shared entry
    ///     is cleared and the requester becomes the exclusive holder);
    ///   - ReadOnly granted unless blocked by a foreign exclusive holder;
    ///     a requester that already holds the exclusive lock reads through
    ///     it without being added to the shared set.
    fn try_acquire(&mut self, tid: TransactionId, perm: Permissions) -> bool {
        if let Some(owner) = self.exclusive {
            if owner != tid {
                return false;
            }
        }

        match perm {
            Permissions::ReadWrite => {
                if self.shared.len() > 1 {
                    return false;
                }
                if self.shared.len() == 1 {
                    if self.shared.contains(&tid) {
                        self.shared.clear();
                    } else {
                        return false;
                    }
                }
                self.exclusive = Some(tid);
            }
            Permissions::ReadOnly => {
                if self.exclusive != Some(tid) {
                    self.shared.insert(tid);
                }
            }
        }
        true
    }

    /// Removes `tid` from both roles.
    fn release(&mut self, tid: TransactionId) {
        if self.exclusive == Some(tid) {
            self.exclusive = None;
        } else {
            self.shared.remove(&tid);
        }
    }

    fn holds(&self, tid: TransactionId) -> bool {
        self.exclusive == Some(tid) || self.shared.contains(&tid)
    }

    /// Every transaction currently holding this lock in either mode.
    fn holders(&self) -> HashSet<TransactionId> {
        let mut holders = self.shared.clone();
        if let Some(owner) = self.exclusive {
            holders.insert(owner);
        }
        holders
    }
}

/// LockTable tracks page-granular shared/exclusive locks for the buffer
/// pool. Lock state is created lazily on the first request for a page and
/// never removed; each page's state sits behind its own mutex so that
/// transactions working on different pages never contend with each other.
#[derive(Default)]
pub struct LockTable {
    entries: Mutex<HashMap<PageId, Arc<Mutex<LockState>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, pid: PageId) -> Arc<Mutex<LockState>> {
        Arc::clone(self.entries.lock().entry(pid).or_default())
    }

    /// Attempts to take the lock on `pid` for `tid` in the mode implied by
    /// `perm`. Returns whether the lock was granted; never blocks.
    pub fn try_acquire(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> bool {
        let granted = self.entry(pid).lock().try_acquire(tid, perm);
        if granted {
            trace!("{} acquired {:?} lock on {}", tid, perm, pid);
        }
        granted
    }

    /// Releases whatever lock `tid` holds on `pid`. No-op if it holds none.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        self.entry(pid).lock().release(tid);
        trace!("{} released lock on {}", tid, pid);
    }

    /// Returns whether `tid` holds a lock on `pid` in either mode.
    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.entry(pid).lock().holds(tid)
    }

    /// Returns whether `tid` is the exclusive holder of `pid`.
    pub fn holds_exclusive(&self, tid: TransactionId, pid: PageId) -> bool {
        self.entry(pid).lock().exclusive == Some(tid)
    }

    /// Returns every transaction currently holding `pid` in either mode.
    /// Used to rebuild a blocked transaction's wait-for edges.
    pub fn holders(&self, pid: PageId) -> HashSet<TransactionId> {
        self.entry(pid).lock().holders()
    }
}
