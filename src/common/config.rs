/// Size of a page in bytes (4 KB). Heap files may override this for
/// testing via `HeapFile::with_page_size`.
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages held by the buffer pool
pub const DEFAULT_POOL_SIZE: usize = 50;
