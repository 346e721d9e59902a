use thiserror::Error;

use super::types::{PageId, TableId, TransactionId};

/// Engine error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} aborted: deadlock detected")]
    TransactionAborted(TransactionId),

    #[error("buffer pool is full, no clean page to evict")]
    BufferExhausted,

    #[error("{0} does not exist in its backing file")]
    PageNotFound(PageId),

    #[error("{0} is not registered in the catalog")]
    TableNotFound(TableId),

    #[error("tuple has no record id")]
    MissingRecordId,

    #[error("page overflow: tuple size {tuple_size} exceeds available space {available}")]
    PageOverflow { tuple_size: usize, available: usize },

    #[error("invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("slot {0} is empty")]
    EmptySlot(u16),
}

impl StrataError {
    /// True for the deadlock-triggered abort condition, which callers are
    /// expected to handle by rolling the transaction back.
    pub fn is_aborted(&self) -> bool {
        matches!(self, StrataError::TransactionAborted(_))
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;
