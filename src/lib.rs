//! Strata - a transactional page-store engine in Rust
//!
//! This crate provides the buffer-management core of a relational storage
//! engine: a bounded page cache with page-granular two-mode locking,
//! wait-for-graph deadlock detection, and NO-STEAL/FORCE transaction
//! commit/abort semantics.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `HeapFile`: Per-table page container; reads, writes and appends
//!     fixed-size pages, and hosts tuple-level insert/delete
//!   - `HeapPage`/`HeapPageRef`: Slotted-page views for variable-length
//!     tuple storage within a page
//!
//! - **Buffer Pool** (`buffer`): Memory and concurrency management
//!   - `BufferPool`: Serves page requests under transaction locks and
//!     drives commit/abort
//!   - `PageCache`: Bounded resident set with clean-only eviction
//!   - `LockTable`: Shared/exclusive page locks with in-place upgrade
//!   - `WaitForGraph`: Deadlock detection over blocked transactions
//!   - `Page`: Resident page with dirty flag and before-image
//!
//! - **Catalog** (`catalog`): Table-to-file routing
//!
//! - **Tuple** (`tuple`): Opaque record payloads with storage identities
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPool;
//! use strata::catalog::Catalog;
//! use strata::common::{Permissions, TableId, TransactionId};
//! use strata::storage::disk::HeapFile;
//! use strata::tuple::Tuple;
//!
//! // Register a table with the catalog
//! let catalog = Arc::new(Catalog::new());
//! let table_id = TableId::new(1);
//! catalog.register_table(Arc::new(HeapFile::new(table_id, "test.db").unwrap()));
//!
//! // One buffer pool serves every transaction in the process
//! let pool = BufferPool::new(50, catalog);
//!
//! // Insert a tuple and commit
//! let tid = TransactionId::new();
//! let mut tuple = Tuple::new(&b"Hello, World!"[..]);
//! pool.insert_tuple(tid, table_id, &mut tuple).unwrap();
//! pool.complete_transaction(tid, true).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{
    PageId, Permissions, RecordId, Result, SlotId, StrataError, TableId, TransactionId,
};
