use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::buffer::{BufferPool, Page};
use crate::common::{
    PageId, Permissions, RecordId, Result, StrataError, TableId, TransactionId, PAGE_SIZE,
};
use crate::storage::page::HeapPage;
use crate::tuple::Tuple;

/// HeapFile is the on-disk container for one table: an unordered collection
/// of fixed-size heap pages, addressed by `page_no * page_size` byte offsets
/// within a single file. It serves raw page I/O for the buffer pool and the
/// tuple-level insert/delete operations, which go back through the pool so
/// that every page they touch is fetched under a write lock.
pub struct HeapFile {
    /// The table this file backs
    table_id: TableId,
    /// The backing file
    db_file: Mutex<File>,
    /// Path to the backing file
    db_path: String,
    /// Size of each page in this file
    page_size: usize,
    /// Number of pages currently allocated
    num_pages: AtomicU32,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
}

impl HeapFile {
    /// Creates a new HeapFile for the given table and file path.
    /// Creates the file if it doesn't exist.
    pub fn new<P: AsRef<Path>>(table_id: TableId, db_path: P) -> Result<Self> {
        Self::with_page_size(table_id, db_path, PAGE_SIZE)
    }

    /// Creates a HeapFile with a non-default page size.
    /// Intended for tests that want small pages; production callers use
    /// `HeapFile::new`.
    pub fn with_page_size<P: AsRef<Path>>(
        table_id: TableId,
        db_path: P,
        page_size: usize,
    ) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / page_size as u64) as u32;

        Ok(Self {
            table_id,
            db_file: Mutex::new(file),
            db_path: path_str,
            page_size,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Returns the table this file backs.
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Returns the page size used by this file.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages currently allocated.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }

    /// Returns the number of disk reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of disk writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the path to the backing file.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Reads a page from disk. Fails with `PageNotFound` for a page number
    /// past the end of the file.
    pub fn read_page(&self, pid: PageId) -> Result<Box<[u8]>> {
        assert_eq!(pid.table_id(), self.table_id);

        if pid.page_no() >= self.num_pages() {
            return Err(StrataError::PageNotFound(pid));
        }

        let offset = (pid.page_no() as u64) * (self.page_size as u64);
        let mut data = vec![0u8; self.page_size].into_boxed_slice();

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data)?;
        drop(file);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!("read {} from {}", pid, self.db_path);
        Ok(data)
    }

    /// Writes a resident page back to its fixed offset.
    pub fn write_page(&self, page: &Page) -> Result<()> {
        let pid = page.id();
        assert_eq!(pid.table_id(), self.table_id);

        let data = page.snapshot();
        assert_eq!(data.len(), self.page_size);

        self.write_bytes(pid.page_no(), &data)?;
        trace!("wrote {} to {}", pid, self.db_path);
        Ok(())
    }

    /// Extends the file by one zeroed, heap-initialized page and returns
    /// its ID.
    pub fn append_empty_page(&self) -> Result<PageId> {
        let page_no = self.num_pages.fetch_add(1, Ordering::SeqCst);
        let pid = PageId::new(self.table_id, page_no);

        let mut data = vec![0u8; self.page_size].into_boxed_slice();
        HeapPage::new(&mut data).init(pid);
        self.write_bytes(page_no, &data)?;

        trace!("appended {} to {}", pid, self.db_path);
        Ok(pid)
    }

    fn write_bytes(&self, page_no: u32, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), self.page_size);

        let offset = (page_no as u64) * (self.page_size as u64);

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        drop(file);

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Adds a tuple to this table on behalf of `tid`, scanning existing
    /// pages front to back for free space and extending the file when all
    /// are full. Every page examined is fetched through the buffer pool
    /// under ReadWrite permission, so this may block on locks or fail with
    /// a transaction abort. Returns the pages it modified; the buffer pool
    /// marks them dirty.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<Arc<Page>>> {
        let num_pages = self.num_pages();
        for page_no in 0..num_pages {
            let pid = PageId::new(self.table_id, page_no);
            let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;

            let slot_id = {
                let mut data = page.write();
                let mut view = HeapPage::new(&mut data);
                if view.can_insert(tuple.len()) {
                    Some(view.insert_tuple(tuple.bytes())?)
                } else {
                    None
                }
            };

            if let Some(slot_id) = slot_id {
                tuple.set_rid(RecordId::new(pid, slot_id));
                return Ok(vec![page]);
            }
        }

        // Every existing page is full: extend the file, then take the new
        // page through the pool like any other so it is locked and cached.
        let pid = self.append_empty_page()?;
        let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;

        let slot_id = {
            let mut data = page.write();
            HeapPage::new(&mut data).insert_tuple(tuple.bytes())?
        };
        tuple.set_rid(RecordId::new(pid, slot_id));
        Ok(vec![page])
    }

    /// Removes a stored tuple on behalf of `tid`, resolving it through its
    /// record id. Returns the page it modified.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Arc<Page>>> {
        let rid = tuple.rid().ok_or(StrataError::MissingRecordId)?;
        assert_eq!(rid.page_id.table_id(), self.table_id);

        let page = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        {
            let mut data = page.write();
            HeapPage::new(&mut data).delete_tuple(rid.slot_id)?;
        }
        Ok(vec![page])
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.db_file.lock();
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        // Ensure all data is flushed to disk
        let file = self.db_file.get_mut();
        let _ = file.sync_all();
    }
}
