use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::common::TransactionId;

/// WaitForGraph records which transactions each blocked transaction is
/// waiting on, and answers cycle queries over that graph.
///
/// An edge `tid -> other` means `tid` failed to acquire a lock currently
/// held by `other`. The graph is not continuously maintained: a blocked
/// transaction overwrites its own outgoing edges on every failed
/// acquisition attempt and removes them once it acquires the lock or gives
/// up. The whole graph sits behind one mutex so every cycle check sees a
/// consistent snapshot. Two transactions probing at the same instant can
/// both observe the same cycle and both abort; that false positive is the
/// accepted price of the polling design.
#[derive(Default)]
pub struct WaitForGraph {
    edges: Mutex<HashMap<TransactionId, HashSet<TransactionId>>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `tid`'s outgoing edges with the given blockers. An empty
    /// set still records an entry; callers pass the current holders of the
    /// contested page, minus `tid` itself (a transaction never blocks
    /// itself, even mid-upgrade).
    pub fn update(&self, tid: TransactionId, blockers: HashSet<TransactionId>) {
        self.edges.lock().insert(tid, blockers);
    }

    /// Removes `tid`'s outgoing edges. Called on successful acquisition
    /// and when `tid` aborts.
    pub fn clear(&self, tid: TransactionId) {
        self.edges.lock().remove(&tid);
    }

    /// Depth-first search for a path from `tid` back to `tid`.
    pub fn has_cycle(&self, tid: TransactionId) -> bool {
        let edges = self.edges.lock();
        let mut visited = HashSet::new();
        let mut stack = vec![tid];

        while let Some(cur) = stack.pop() {
            if !visited.insert(cur) {
                continue;
            }
            if let Some(nexts) = edges.get(&cur) {
                for &next in nexts {
                    if next == tid {
                        return true;
                    }
                    stack.push(next);
                }
            }
        }
        false
    }
}
