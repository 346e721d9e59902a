use std::sync::Arc;

use strata::buffer::BufferPool;
use strata::catalog::Catalog;
use strata::common::{Permissions, TableId, TransactionId};
use strata::storage::disk::HeapFile;
use strata::storage::page::HeapPageRef;
use strata::tuple::Tuple;

fn main() {
    env_logger::init();

    println!("Strata - a transactional page-store engine in Rust");
    println!("===================================================\n");

    let db_path = "demo.db";
    let table_id = TableId::new(1);

    // Register the demo table
    let catalog = Arc::new(Catalog::new());
    let file = Arc::new(HeapFile::new(table_id, db_path).expect("Failed to create heap file"));
    catalog.register_table(file);
    println!("Registered table {} backed by {}", table_id.as_u32(), db_path);

    // One buffer pool serves the whole process
    let pool = BufferPool::new(10, catalog);
    println!("Created buffer pool with {} page slots\n", pool.pool_size());

    // A committing transaction
    let t1 = TransactionId::new();
    let rows = [
        b"Hello, World!".as_slice(),
        b"This is Strata",
        b"A transactional page store in Rust",
    ];
    let mut first_pid = None;
    for row in rows {
        let mut tuple = Tuple::new(row);
        pool.insert_tuple(t1, table_id, &mut tuple)
            .expect("Failed to insert tuple");
        let rid = tuple.rid().expect("stored tuple has a record id");
        first_pid.get_or_insert(rid.page_id);
        println!("{} inserted {} bytes at {}", t1, tuple.len(), rid.page_id);
    }
    pool.complete_transaction(t1, true)
        .expect("Failed to commit");
    println!("{} committed\n", t1);

    // An aborting transaction: its insert leaves no trace
    let t2 = TransactionId::new();
    let mut doomed = Tuple::new(&b"never visible"[..]);
    pool.insert_tuple(t2, table_id, &mut doomed)
        .expect("Failed to insert tuple");
    println!("{} inserted {} bytes, then rolls back", t2, doomed.len());
    pool.complete_transaction(t2, false)
        .expect("Failed to abort");
    println!("{} aborted\n", t2);

    // Read back what survived
    let t3 = TransactionId::new();
    let pid = first_pid.expect("demo inserted at least one tuple");
    let page = pool
        .get_page(t3, pid, Permissions::ReadOnly)
        .expect("Failed to fetch page");
    {
        let data = page.read();
        let view = HeapPageRef::new(&data);
        println!("{} holds {} tuples:", pid, view.tuple_count());
        for slot_id in view.slot_ids() {
            let bytes = view.get_tuple(slot_id).expect("slot is occupied");
            println!("  [{}] {}", slot_id.as_u16(), String::from_utf8_lossy(bytes));
        }
    }
    pool.complete_transaction(t3, true)
        .expect("Failed to commit");

    println!("\nDone. Database file: {}", db_path);
}
