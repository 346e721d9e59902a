//! System catalog: routes table IDs to their backing heap files.
//!
//! The buffer pool holds a shared `Catalog` and uses it to find the file
//! behind every page it loads or flushes. There is no ambient global
//! instance; whoever builds the engine constructs a catalog and threads it
//! through the constructors that need it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{Result, StrataError, TableId};
use crate::storage::disk::HeapFile;

/// Registry of the tables known to the engine.
#[derive(Default)]
pub struct Catalog {
    tables: Mutex<HashMap<TableId, Arc<HeapFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table's heap file, replacing any previous registration
    /// for the same table ID.
    pub fn register_table(&self, file: Arc<HeapFile>) {
        self.tables.lock().insert(file.table_id(), file);
    }

    /// Returns the heap file backing the given table.
    pub fn storage_handle(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .lock()
            .get(&table_id)
            .cloned()
            .ok_or(StrataError::TableNotFound(table_id))
    }

    /// Returns the IDs of all registered tables.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_catalog_register_and_lookup() {
        let catalog = Catalog::new();
        let temp = NamedTempFile::new().unwrap();
        let file = Arc::new(HeapFile::new(TableId::new(1), temp.path()).unwrap());

        catalog.register_table(Arc::clone(&file));

        let handle = catalog.storage_handle(TableId::new(1)).unwrap();
        assert_eq!(handle.table_id(), TableId::new(1));
    }

    #[test]
    fn test_catalog_unknown_table() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.storage_handle(TableId::new(9)),
            Err(StrataError::TableNotFound(_))
        ));
    }
}
