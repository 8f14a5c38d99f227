use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use anyhow::{anyhow, Result};
use log::*;
use crate::TrunkIo;

/// Real trunk file backed by a file descriptor.
#[derive(Debug)]
pub struct FileTrunkIo {
    file: File,
}

impl TrunkIo for FileTrunkIo {
    fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    fn create_exclusive(path: &str, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(size)?;
        debug!("created trunk file {} ({} bytes)", path, size);
        Ok(Self { file })
    }

    fn ensure_len(&mut self, size: u64) -> Result<()> {
        let current = self.file.metadata()?.len();
        if current < size {
            warn!("trunk file shorter than expected ({} < {}), growing", current, size);
            self.file.set_len(size)?;
        }
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buf, offset)
            .map_err(|e| anyhow!("read_at({}, {} bytes) failed: {}", offset, buf.len(), e))
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.write_all_at(buf, offset)
            .map_err(|e| anyhow!("write_at({}, {} bytes) failed: {}", offset, buf.len(), e))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}
