use crate::common::{PageId, Result, SlotId, StrataError, TableId};

/// Heap page layout:
///
/// +------------------+
/// | Page Header      |  (HEADER_SIZE bytes)
/// +------------------+
/// | Slot Array       |  (grows downward)
/// | [slot 0]         |
/// | [slot 1]         |
/// | ...              |
/// +------------------+
/// |                  |
/// | Free Space       |
/// |                  |
/// +------------------+
/// | Tuple Data       |  (grows upward from bottom)
/// | [tuple n]        |
/// | [tuple n-1]      |
/// | ...              |
/// +------------------+
///
/// Header fields (all little-endian u32):
///   - table_id: owning table
///   - page_no: position within the table file
///   - num_slots: size of the slot array
///   - free_space_start: end of the slot array
///   - free_space_end: start of the tuple data area
///
/// Each slot entry contains:
///   - offset: u16 (offset from start of page to tuple data)
///   - length: u16 (length of the tuple)
///   - A length of 0 indicates an empty/deleted slot
const HEADER_SIZE: usize = 20;

/// Size of each slot entry in bytes
const SLOT_SIZE: usize = 4;

const TABLE_ID_OFFSET: usize = 0;
const PAGE_NO_OFFSET: usize = 4;
const NUM_SLOTS_OFFSET: usize = 8;
const FREE_SPACE_START_OFFSET: usize = 12;
const FREE_SPACE_END_OFFSET: usize = 16;

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    u32::from_le_bytes(bytes)
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Represents a slot entry in the slot array
#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    /// Offset from start of page to tuple data
    pub offset: u16,
    /// Length of the tuple (0 = empty/deleted)
    pub length: u16,
}

impl SlotEntry {
    pub fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }

    pub fn empty() -> Self {
        Self {
            offset: 0,
            length: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// HeapPage provides methods to interpret and manipulate a page buffer
/// as a slotted page with variable-length tuples. The buffer may be any
/// size at least HEADER_SIZE bytes; heap files decide the page size.
pub struct HeapPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeapPage<'a> {
    /// Creates a new HeapPage view over the given data buffer.
    pub fn new(data: &'a mut [u8]) -> Self {
        assert!(data.len() >= HEADER_SIZE + SLOT_SIZE);
        assert!(data.len() <= u16::MAX as usize);
        Self { data }
    }

    /// Initializes a fresh heap page with the given page ID.
    pub fn init(&mut self, page_id: PageId) {
        let size = self.data.len();
        self.data.fill(0);
        write_u32(self.data, TABLE_ID_OFFSET, page_id.table_id().as_u32());
        write_u32(self.data, PAGE_NO_OFFSET, page_id.page_no());
        write_u32(self.data, NUM_SLOTS_OFFSET, 0);
        write_u32(self.data, FREE_SPACE_START_OFFSET, HEADER_SIZE as u32);
        write_u32(self.data, FREE_SPACE_END_OFFSET, size as u32);
    }

    /// Returns the page ID recorded in the header.
    pub fn page_id(&self) -> PageId {
        PageId::new(
            TableId::new(read_u32(self.data, TABLE_ID_OFFSET)),
            read_u32(self.data, PAGE_NO_OFFSET),
        )
    }

    /// Returns the number of slots.
    pub fn num_slots(&self) -> u16 {
        read_u32(self.data, NUM_SLOTS_OFFSET) as u16
    }

    fn set_num_slots(&mut self, num_slots: u16) {
        write_u32(self.data, NUM_SLOTS_OFFSET, num_slots as u32);
    }

    /// Returns the start of free space (end of slot array).
    pub fn free_space_start(&self) -> u16 {
        read_u32(self.data, FREE_SPACE_START_OFFSET) as u16
    }

    fn set_free_space_start(&mut self, offset: u16) {
        write_u32(self.data, FREE_SPACE_START_OFFSET, offset as u32);
    }

    /// Returns the end of free space (start of tuple data area).
    pub fn free_space_end(&self) -> u16 {
        read_u32(self.data, FREE_SPACE_END_OFFSET) as u16
    }

    fn set_free_space_end(&mut self, offset: u16) {
        write_u32(self.data, FREE_SPACE_END_OFFSET, offset as u32);
    }

    /// Returns the amount of free space available.
    pub fn free_space(&self) -> usize {
        let start = self.free_space_start() as usize;
        let end = self.free_space_end() as usize;
        end.saturating_sub(start)
    }

    /// Returns whether there's enough space to insert a tuple of the given size.
    pub fn can_insert(&self, tuple_size: usize) -> bool {
        // Need space for the tuple data plus a new slot entry
        self.free_space() >= tuple_size + SLOT_SIZE
    }

    /// Gets a slot entry by slot ID.
    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        read_slot(self.data, self.num_slots(), slot_id)
    }

    fn set_slot(&mut self, slot_id: SlotId, entry: SlotEntry) {
        let slot_offset = HEADER_SIZE + (slot_id.as_u16() as usize) * SLOT_SIZE;
        self.data[slot_offset..slot_offset + 2].copy_from_slice(&entry.offset.to_le_bytes());
        self.data[slot_offset + 2..slot_offset + 4].copy_from_slice(&entry.length.to_le_bytes());
    }

    /// Inserts a tuple and returns its slot ID.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<SlotId> {
        let tuple_size = tuple.len();

        // Find an empty slot to reuse, or plan a new one
        let (slot_id, is_new_slot) = self.find_or_create_slot();

        let needed = if is_new_slot {
            tuple_size + SLOT_SIZE
        } else {
            tuple_size
        };
        if self.free_space() < needed {
            return Err(StrataError::PageOverflow {
                tuple_size,
                available: self.free_space().saturating_sub(SLOT_SIZE),
            });
        }

        if is_new_slot {
            self.set_num_slots(self.num_slots() + 1);
            self.set_free_space_start(self.free_space_start() + SLOT_SIZE as u16);
        }

        // Tuple data grows from the end of the page
        let tuple_offset = self.free_space_end() - tuple_size as u16;
        self.data[tuple_offset as usize..tuple_offset as usize + tuple_size]
            .copy_from_slice(tuple);

        self.set_slot(slot_id, SlotEntry::new(tuple_offset, tuple_size as u16));
        self.set_free_space_end(tuple_offset);

        Ok(slot_id)
    }

    fn find_or_create_slot(&self) -> (SlotId, bool) {
        let num_slots = self.num_slots();
        for i in 0..num_slots {
            if let Some(entry) = self.get_slot(SlotId::new(i)) {
                if entry.is_empty() {
                    return (SlotId::new(i), false);
                }
            }
        }
        (SlotId::new(num_slots), true)
    }

    /// Gets tuple data by slot ID.
    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        read_tuple(self.data, self.num_slots(), slot_id)
    }

    /// Deletes a tuple by slot ID.
    /// This marks the slot as empty but doesn't reclaim the space.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(StrataError::InvalidSlotId(slot_id.as_u16()))?;
        if entry.is_empty() {
            return Err(StrataError::EmptySlot(slot_id.as_u16()));
        }
        self.set_slot(slot_id, SlotEntry::empty());
        Ok(())
    }

    /// Returns an iterator over all non-empty slot IDs.
    pub fn slot_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        let num_slots = self.num_slots();
        (0..num_slots).filter_map(move |i| {
            let slot_id = SlotId::new(i);
            self.get_slot(slot_id)
                .filter(|e| !e.is_empty())
                .map(|_| slot_id)
        })
    }

    /// Returns the number of non-empty tuples.
    pub fn tuple_count(&self) -> usize {
        self.slot_ids().count()
    }
}

/// Read-only view of a heap page.
pub struct HeapPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeapPageRef<'a> {
    /// Creates a new read-only HeapPage view.
    pub fn new(data: &'a [u8]) -> Self {
        assert!(data.len() >= HEADER_SIZE + SLOT_SIZE);
        Self { data }
    }

    /// Returns the page ID recorded in the header.
    pub fn page_id(&self) -> PageId {
        PageId::new(
            TableId::new(read_u32(self.data, TABLE_ID_OFFSET)),
            read_u32(self.data, PAGE_NO_OFFSET),
        )
    }

    /// Returns the number of slots.
    pub fn num_slots(&self) -> u16 {
        read_u32(self.data, NUM_SLOTS_OFFSET) as u16
    }

    /// Gets a slot entry by slot ID.
    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        read_slot(self.data, self.num_slots(), slot_id)
    }

    /// Gets tuple data by slot ID.
    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        read_tuple(self.data, self.num_slots(), slot_id)
    }

    /// Returns an iterator over all non-empty slot IDs.
    pub fn slot_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        let num_slots = self.num_slots();
        (0..num_slots).filter_map(move |i| {
            let slot_id = SlotId::new(i);
            self.get_slot(slot_id)
                .filter(|e| !e.is_empty())
                .map(|_| slot_id)
        })
    }

    /// Returns the number of non-empty tuples.
    pub fn tuple_count(&self) -> usize {
        self.slot_ids().count()
    }
}

fn read_slot(data: &[u8], num_slots: u16, slot_id: SlotId) -> Option<SlotEntry> {
    let slot_num = slot_id.as_u16();
    if slot_num >= num_slots {
        return None;
    }

    let slot_offset = HEADER_SIZE + (slot_num as usize) * SLOT_SIZE;
    let offset_bytes: [u8; 2] = data[slot_offset..slot_offset + 2].try_into().unwrap();
    let length_bytes: [u8; 2] = data[slot_offset + 2..slot_offset + 4].try_into().unwrap();

    Some(SlotEntry::new(
        u16::from_le_bytes(offset_bytes),
        u16::from_le_bytes(length_bytes),
    ))
}

fn read_tuple(data: &[u8], num_slots: u16, slot_id: SlotId) -> Result<&[u8]> {
    let entry =
        read_slot(data, num_slots, slot_id).ok_or(StrataError::InvalidSlotId(slot_id.as_u16()))?;

    if entry.is_empty() {
        return Err(StrataError::EmptySlot(slot_id.as_u16()));
    }

    let start = entry.offset as usize;
    let end = start + entry.length as usize;

    Ok(&data[start..end])
}
