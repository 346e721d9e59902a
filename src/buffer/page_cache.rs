use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{PageId, Result, StrataError};
use crate::storage::disk::HeapFile;

use super::Page;

/// PageCache is the bounded set of resident pages. On a miss at capacity it
/// evicts an arbitrary clean page; a dirty page is never evicted and never
/// written back by eviction (NO-STEAL: dirty bytes are uncommitted work that
/// only commit may persist and only abort may discard). When every resident
/// page is dirty the miss fails with `BufferExhausted`.
///
/// Page I/O happens outside the map lock; if two transactions race to load
/// the same page, the first copy inserted wins and the loser adopts it.
pub struct PageCache {
    /// Maximum number of resident pages
    capacity: usize,
    /// Resident pages by identity
    pages: Mutex<HashMap<PageId, Arc<Page>>>,
}

impl PageCache {
    /// Creates a cache holding at most `capacity` pages.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            capacity,
            pages: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Returns the resident page for `pid`, if any.
    pub fn get(&self, pid: PageId) -> Option<Arc<Page>> {
        self.pages.lock().get(&pid).cloned()
    }

    /// Returns the resident page, loading it from `file` on a miss.
    pub fn fetch(&self, pid: PageId, file: &HeapFile) -> Result<Arc<Page>> {
        {
            let mut pages = self.pages.lock();
            if let Some(page) = pages.get(&pid) {
                return Ok(Arc::clone(page));
            }
            if pages.len() >= self.capacity {
                Self::evict_locked(&mut pages)?;
            }
        }

        let data = file.read_page(pid)?;
        let page = Arc::new(Page::new(pid, data));

        let mut pages = self.pages.lock();
        Ok(Arc::clone(pages.entry(pid).or_insert(page)))
    }

    /// Inserts or overwrites a resident page, evicting if room is needed
    /// for a new entry.
    pub fn put(&self, page: Arc<Page>) -> Result<()> {
        let mut pages = self.pages.lock();
        if !pages.contains_key(&page.id()) && pages.len() >= self.capacity {
            Self::evict_locked(&mut pages)?;
        }
        pages.insert(page.id(), page);
        Ok(())
    }

    /// Removes `pid` from the cache unconditionally, without flushing.
    pub fn remove(&self, pid: PageId) -> Option<Arc<Page>> {
        self.pages.lock().remove(&pid)
    }

    /// Returns the identities of all resident pages.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.lock().keys().copied().collect()
    }

    /// Returns the number of resident pages.
    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }

    /// Returns the cache capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards any clean resident page. The choice is unordered; dirty
    /// pages are not candidates.
    fn evict_locked(pages: &mut HashMap<PageId, Arc<Page>>) -> Result<()> {
        let victim = pages
            .iter()
            .find(|(_, page)| !page.is_dirty())
            .map(|(&pid, _)| pid);

        match victim {
            Some(pid) => {
                pages.remove(&pid);
                debug!("evicted clean page {}", pid);
                Ok(())
            }
            None => Err(StrataError::BufferExhausted),
        }
    }
}
