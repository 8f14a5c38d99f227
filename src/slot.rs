/// Segregated free-list table (C1) plus the allocation-scan and node
/// splice/remove primitives used by the allocator (C4).
use std::sync::Mutex;

use crate::binlog::{BinlogWriter, NullBinlog};
use crate::error::{Result, TrunkError};
use crate::pool::NodePool;
use crate::types::{BinlogEntry, BinlogOp, ExtentStatus, TrunkExtent};

struct Slot {
    class_size: u32,
    // Box<TrunkExtent> so nodes can be handed to and reclaimed from `pool`
    // without reallocating on every add_node/take_free_from cycle.
    #[allow(clippy::vec_box)]
    list: Mutex<Vec<Box<TrunkExtent>>>,
}

pub struct SlotTable {
    slots: Vec<Slot>,
    pool: NodePool<TrunkExtent>,
    min_size: u32,
    max_size: u32,
}

impl SlotTable {
    /// Class sizes are `0, min, 2*min, 4*min, ...` up to the smallest
    /// power-of-two >= `trunk_file_size / 2`; the last slot is clamped to
    /// exactly that maximum.
    pub fn new(min_size: u32, trunk_file_size: u32) -> Self {
        let max_size = trunk_file_size / 2;
        let mut class_sizes = vec![0u32];
        let mut bytes = min_size;
        while bytes < max_size {
            class_sizes.push(bytes);
            bytes = bytes.saturating_mul(2);
        }
        class_sizes.push(max_size);
        *class_sizes.last_mut().unwrap() = max_size;

        let slots = class_sizes.into_iter()
            .map(|class_size| Slot { class_size, list: Mutex::new(Vec::new()) })
            .collect();

        Self { slots, pool: NodePool::new(), min_size, max_size }
    }

    pub fn min_size(&self) -> u32 { self.min_size }
    pub fn max_size(&self) -> u32 { self.max_size }
    pub fn slot_count(&self) -> usize { self.slots.len() }
    pub fn class_size(&self, index: usize) -> u32 { self.slots[index].class_size }

    /// Largest class <= size, scanning from the top down. Used to place an
    /// extent (insertion) and to locate the slot a given extent lives in
    /// for `confirm`/`free`.
    fn insertion_slot_index(&self, size: u32) -> usize {
        for (i, slot) in self.slots.iter().enumerate().rev() {
            if slot.class_size <= size {
                return i;
            }
        }
        0
    }

    /// Smallest class >= size, scanning from the bottom up. `None` means
    /// the request exceeds every slot's class (NoSlot).
    pub fn allocation_slot_index(&self, size: u32) -> Option<usize> {
        self.slots.iter().position(|slot| slot.class_size >= size)
    }

    /// Splices `extent` into its insertion slot, sorted ascending by size
    /// (ties go after existing equal-size entries), and writes an
    /// ADD_SPACE record while still holding the slot lock.
    pub fn add_node(&self, extent: TrunkExtent, binlog: &dyn BinlogWriter) -> Result<()> {
        let idx = self.insertion_slot_index(extent.file.size);
        let node = self.pool.acquire(extent);
        let slot = &self.slots[idx];
        let mut list = slot.list.lock().unwrap();
        let pos = list.partition_point(|e| e.file.size <= node.file.size);
        list.insert(pos, node);
        binlog.log_op(BinlogOp::AddSpace, extent.path, extent.file)?;
        Ok(())
    }

    /// Scans slots `start_index..` for the first FREE extent, skipping any
    /// HOLD entries it passes over. Releases each slot's lock before
    /// advancing to the next, per the no-nested-slot-locks discipline.
    pub fn take_free_from(&self, start_index: usize) -> Option<TrunkExtent> {
        for slot in &self.slots[start_index..] {
            let mut list = slot.list.lock().unwrap();
            if let Some(pos) = list.iter().position(|e| e.status == ExtentStatus::Free) {
                let node = list.remove(pos);
                drop(list);
                let data = *node;
                self.pool.release(node);
                return Some(data);
            }
        }
        None
    }

    /// Locates the extent matching `key` on every field except `status`
    /// (the confirm/free lookup key) and removes it, writing `op`.
    pub fn remove_matching(&self, key: &TrunkExtent, op: BinlogOp, binlog: &dyn BinlogWriter) -> Result<TrunkExtent> {
        let idx = self.insertion_slot_index(key.file.size);
        let slot = &self.slots[idx];
        let mut list = slot.list.lock().unwrap();
        let pos = list.iter().position(|e| e.same_location(key)).ok_or(TrunkError::NotFound)?;
        let node = list.remove(pos);
        let data = *node;
        binlog.log_op(op, data.path, data.file)?;
        drop(list);
        self.pool.release(node);
        Ok(data)
    }

    /// Flips the matching extent's status back to FREE without unlinking
    /// it (the `confirm(cancel)` path) and writes SET_SPACE_FREE.
    pub fn restore_matching(&self, key: &TrunkExtent, binlog: &dyn BinlogWriter) -> Result<TrunkExtent> {
        let idx = self.insertion_slot_index(key.file.size);
        let slot = &self.slots[idx];
        let mut list = slot.list.lock().unwrap();
        let pos = list.iter().position(|e| e.same_location(key)).ok_or(TrunkError::NotFound)?;
        list[pos].status = ExtentStatus::Free;
        let data = *list[pos];
        binlog.log_op(BinlogOp::SetSpaceFree, data.path, data.file)?;
        Ok(data)
    }

    /// Reapplies one binlog record during recovery. `AddSpace` links a new
    /// extent; `DelSpace` unlinks it. `SetSpaceFree` only flips the status
    /// of an extent that is already linked (it was inserted by its own
    /// earlier `AddSpace` record), so replaying it is a no-op — applying it
    /// as another `add_node` would double-insert the same location.
    /// Malformed or already-missing entries are logged and skipped rather
    /// than aborting recovery, matching the binlog's own replay discipline.
    pub fn apply_replay(&self, entry: &BinlogEntry) {
        let extent = TrunkExtent::new(entry.path, entry.file, ExtentStatus::Free);
        match entry.op {
            BinlogOp::AddSpace => {
                let _ = self.add_node(extent, &NullBinlog);
            }
            BinlogOp::DelSpace => {
                let _ = self.remove_matching(&extent, BinlogOp::DelSpace, &NullBinlog);
            }
            BinlogOp::SetSpaceFree => {}
        }
    }

    /// Total extents currently linked anywhere in the table. For tests.
    #[cfg(test)]
    pub fn total_linked(&self) -> usize {
        self.slots.iter().map(|s| s.list.lock().unwrap().len()).sum()
    }

    #[cfg(test)]
    pub fn extents_in_slot(&self, index: usize) -> Vec<TrunkExtent> {
        self.slots[index].list.lock().unwrap().iter().map(|b| **b).collect()
    }
}
