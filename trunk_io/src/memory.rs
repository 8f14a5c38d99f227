use anyhow::{anyhow, Result};
use crate::TrunkIo;

/// In-memory trunk backing used by allocator unit tests, so the slot-table
/// properties can be checked without touching the filesystem.
pub struct MemoryTrunkIo {
    mem: Vec<u8>,
}

impl TrunkIo for MemoryTrunkIo {
    fn open(_path: &str) -> Result<Self> {
        Err(anyhow!("MemoryTrunkIo has no backing store to reopen"))
    }

    fn create_exclusive(_path: &str, size: u64) -> Result<Self> {
        Ok(Self { mem: vec![0u8; size as usize] })
    }

    fn ensure_len(&mut self, size: u64) -> Result<()> {
        if (self.mem.len() as u64) < size {
            self.mem.resize(size as usize, 0);
        }
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let offset = offset as usize;
        if offset + buf.len() > self.mem.len() {
            return Err(anyhow!("read past end of trunk"));
        }
        buf.copy_from_slice(&self.mem[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let offset = offset as usize;
        if offset + buf.len() > self.mem.len() {
            return Err(anyhow!("write past end of trunk"));
        }
        self.mem[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.mem.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() -> Result<()> {
        let mut trunk = MemoryTrunkIo::create_exclusive("mem", 1024)?;
        trunk.write_at(100, b"payload")?;
        let mut buf = [0u8; 7];
        trunk.read_at(100, &mut buf)?;
        assert_eq!(&buf, b"payload");
        Ok(())
    }

    #[test]
    fn read_past_end_is_an_error() -> Result<()> {
        let trunk = MemoryTrunkIo::create_exclusive("mem", 16)?;
        let mut buf = [0u8; 8];
        assert!(trunk.read_at(12, &mut buf).is_err());
        Ok(())
    }
}
