use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;

/// Page is the in-memory representation of one disk page while it is
/// resident in the buffer pool. It carries the page bytes behind a
/// reader-writer lock, a dirty flag, and the before-image: a full copy of
/// the bytes as of the last moment the page was clean (freshly loaded, or
/// freshly flushed at commit). Aborting transactions roll their writes back
/// by restoring the before-image.
///
/// Pages are owned by the page cache; transactions only ever hold
/// `Arc<Page>` references handed out by the buffer pool.
pub struct Page {
    /// The page's identity
    id: PageId,
    /// The page bytes
    data: RwLock<Box<[u8]>>,
    /// Whether the page has uncommitted modifications
    dirty: AtomicBool,
    /// Snapshot of the bytes at the last clean point
    before_image: Mutex<Box<[u8]>>,
}

impl Page {
    /// Creates a resident page from freshly loaded bytes. The before-image
    /// starts out identical to the data, since a just-loaded page is clean.
    pub fn new(id: PageId, data: Box<[u8]>) -> Self {
        let before_image = data.clone();
        Self {
            id,
            data: RwLock::new(data),
            dirty: AtomicBool::new(false),
            before_image: Mutex::new(before_image),
        }
    }

    /// Returns the page's identity.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Returns a read guard over the page bytes.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Returns a write guard over the page bytes. Mutating through this
    /// guard does not mark the page dirty; callers do that explicitly
    /// (the buffer pool does it for tuple operations).
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    /// Returns whether the page has uncommitted modifications.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Sets the dirty flag.
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// Returns a copy of the current page bytes, for writing to disk.
    pub fn snapshot(&self) -> Box<[u8]> {
        self.data.read().clone()
    }

    /// Resets the before-image to the current bytes. Called after a commit
    /// flush, when the on-disk state has caught up with memory.
    pub fn set_before_image(&self) {
        let data = self.data.read();
        *self.before_image.lock() = data.clone();
    }

    /// Returns a copy of the before-image.
    pub fn before_image(&self) -> Box<[u8]> {
        self.before_image.lock().clone()
    }

    /// Discards in-memory writes by restoring the before-image, leaving the
    /// page clean. The swap happens under the data write lock, so no reader
    /// observes a partially rolled-back page.
    pub fn restore_before_image(&self) {
        let mut data = self.data.write();
        let image = self.before_image.lock();
        data.copy_from_slice(&image);
        self.dirty.store(false, Ordering::Release);
    }
}
