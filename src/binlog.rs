/// The durable operation log. The allocator treats this as the out-of-scope
/// `log_op(ts, op, entry)` collaborator from the spec; this module supplies
/// the minimal concrete implementation needed to run the allocator end to
/// end and to reconstruct a `SlotTable` after a restart.
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use log::*;

use crate::types::{BinlogEntry, BinlogOp, TrunkFileRef, TrunkPath};

pub trait BinlogWriter: Send + Sync {
    /// Append one operation record. Assumed durable by every caller; a
    /// failure is surfaced but never rolls back the in-memory change that
    /// already happened (see allocator failure semantics).
    fn log_op(&self, op: BinlogOp, path: TrunkPath, file: TrunkFileRef) -> std::io::Result<()>;
}

/// Append-only, newline-delimited binlog file.
pub struct Binlog {
    file: Mutex<File>,
}

impl Binlog {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    /// Replays every record in `path` in file order, reapplying it to
    /// `table`. Malformed lines are logged and skipped rather than
    /// aborting the whole replay, matching §7's recovery design.
    pub fn replay(path: impl AsRef<Path>, mut apply: impl FnMut(BinlogEntry)) -> std::io::Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(0);
        }
        let reader = BufReader::new(File::open(path)?);
        let mut applied = 0;
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Some(entry) => {
                    apply(entry);
                    applied += 1;
                }
                None => warn!("binlog: skipping malformed line {}: {}", lineno + 1, line),
            }
        }
        info!("binlog: replayed {} entries from {}", applied, path.display());
        Ok(applied)
    }
}

impl BinlogWriter for Binlog {
    fn log_op(&self, op: BinlogOp, path: TrunkPath, file: TrunkFileRef) -> std::io::Result<()> {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let line = format!(
            "{} {} {} {} {} {} {} {}\n",
            ts, op.as_str(), path.store_path_index, path.sub_path_high, path.sub_path_low,
            file.id, file.offset, file.size,
        );
        let mut f = self.file.lock().unwrap();
        f.write_all(line.as_bytes())?;
        f.flush()
    }
}

fn parse_line(line: &str) -> Option<BinlogEntry> {
    let mut parts = line.split_whitespace();
    let timestamp: u64 = parts.next()?.parse().ok()?;
    let op = BinlogOp::parse(parts.next()?)?;
    let store_path_index: u16 = parts.next()?.parse().ok()?;
    let sub_path_high: u8 = parts.next()?.parse().ok()?;
    let sub_path_low: u8 = parts.next()?.parse().ok()?;
    let id: u32 = parts.next()?.parse().ok()?;
    let offset: u32 = parts.next()?.parse().ok()?;
    let size: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(BinlogEntry {
        timestamp,
        op,
        path: TrunkPath { store_path_index, sub_path_high, sub_path_low },
        file: TrunkFileRef { id, offset, size },
    })
}

/// Binlog writer that discards every record; used by tests that only care
/// about in-memory slot-table behavior.
pub struct NullBinlog;

impl BinlogWriter for NullBinlog {
    fn log_op(&self, _op: BinlogOp, _path: TrunkPath, _file: TrunkFileRef) -> std::io::Result<()> {
        Ok(())
    }
}
