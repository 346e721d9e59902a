use bytes::Bytes;

use crate::common::RecordId;

/// Represents a single record in a table.
///
/// The engine treats record contents as opaque bytes; interpreting them is
/// the job of whatever layer sits above the storage engine. A tuple gains a
/// `RecordId` once it has been stored in a page, which is what delete
/// operations use to find it again.
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The record payload
    data: Bytes,
    /// Where this tuple lives on disk, if it has been stored
    rid: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple with the given payload. The tuple has no record
    /// id until it is inserted through the buffer pool.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            rid: None,
        }
    }

    /// Returns the raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the record id, if this tuple has been stored.
    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    /// Sets the record id. Called by the heap file once the tuple has a slot.
    pub fn set_rid(&mut self, rid: RecordId) {
        self.rid = Some(rid);
    }
}
