/// Allocator (C4): reserve / split / confirm / cancel / free over the slot
/// table (C1) and the trunk file manager (C3).
use log::*;
use trunk_io::TrunkIo;

use crate::binlog::BinlogWriter;
use crate::error::{Result, TrunkError};
use crate::slot::SlotTable;
use crate::trunk::TrunkFileManager;
use crate::types::{BinlogOp, ExtentStatus, TrunkExtent, TrunkFileRef, TrunkPath};

pub struct Allocator {
    slots: SlotTable,
    trunks: TrunkFileManager,
}

impl Allocator {
    pub fn new(slots: SlotTable, trunks: TrunkFileManager) -> Self {
        Self { slots, trunks }
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Reserves `size` bytes, creating a new trunk if no free extent
    /// covers the request. The returned extent has `status = Hold` and is
    /// already linked in the slot table; the caller must follow up with
    /// `confirm`.
    pub fn alloc<T: TrunkIo>(&self, size: u32, binlog: &dyn BinlogWriter) -> Result<TrunkExtent> {
        if size == 0 {
            return Err(TrunkError::Invalid("alloc size must be > 0".to_string()));
        }
        // the minimum trackable granularity is slot_min_size; smaller
        // requests still consume a full slot_min_size extent
        let keep_size = size.max(self.slots.min_size());
        let start = self.slots.allocation_slot_index(keep_size).ok_or(TrunkError::NoSlot)?;

        let mut extent = match self.slots.take_free_from(start) {
            Some(extent) => extent,
            None => self.create_trunk_extent::<T>()?,
        };

        self.split(&mut extent, keep_size, binlog)?;

        extent.status = ExtentStatus::Hold;
        self.slots.add_node(extent, binlog)?;
        debug!("alloc({}) -> trunk {} offset {}", size, extent.file.id, extent.file.offset);
        Ok(extent)
    }

    fn create_trunk_extent<T: TrunkIo>(&self) -> Result<TrunkExtent> {
        let (path, id, _io) = self.trunks.create_next_file::<T>()?;
        Ok(TrunkExtent::new(
            path,
            TrunkFileRef { id, offset: 0, size: self.trunks.trunk_file_size() },
            ExtentStatus::Free,
        ))
    }

    /// If the remainder after keeping `keep_size` bytes would fall below
    /// the slot table's minimum tracked size, the remainder is discarded
    /// (absorbed as internal fragmentation) rather than split off.
    fn split(&self, extent: &mut TrunkExtent, keep_size: u32, binlog: &dyn BinlogWriter) -> Result<()> {
        let remainder_size = extent.file.size - keep_size;
        if remainder_size < self.slots.min_size() {
            return Ok(());
        }
        let remainder = TrunkExtent::new(
            extent.path,
            TrunkFileRef { id: extent.file.id, offset: extent.file.offset + keep_size, size: remainder_size },
            ExtentStatus::Free,
        );
        self.slots.add_node(remainder, binlog)?;
        extent.file.size = keep_size;
        Ok(())
    }

    /// Finalizes a HOLD reservation. `success = true` consumes it (removed
    /// from the table, DEL_SPACE); `success = false` releases it back to
    /// FREE (SET_SPACE_FREE), still linked.
    pub fn confirm(&self, extent: &TrunkExtent, success: bool, binlog: &dyn BinlogWriter) -> Result<()> {
        if success {
            self.slots.remove_matching(extent, BinlogOp::DelSpace, binlog)?;
        } else {
            self.slots.restore_matching(extent, binlog)?;
        }
        Ok(())
    }

    /// Directly releases a region the caller already owns outright (not
    /// via the HOLD/confirm protocol) back to the free list. Regions
    /// smaller than the slot minimum aren't worth tracking.
    pub fn free(&self, path: TrunkPath, file: TrunkFileRef, binlog: &dyn BinlogWriter) -> Result<()> {
        if file.size < self.slots.min_size() {
            return Ok(());
        }
        self.slots.add_node(TrunkExtent::new(path, file, ExtentStatus::Free), binlog)
    }
}
