/// Trunk file manager (C3): creates, sizes, and names new trunk container
/// files, and selects which storage path a new trunk lands on.
use std::path::PathBuf;
use std::sync::Mutex;

use log::*;
use trunk_io::TrunkIo;

use crate::codec::{sub_path_for_id, trunk_filename};
use crate::config::Config;
use crate::error::{Result, TrunkError};
use crate::paths::StorePaths;
use crate::types::{StorePathMode, TrunkPath};

pub struct TrunkFileManager {
    paths: StorePaths,
    mode: StorePathMode,
    trunk_file_size: u32,
    avg_storage_reserved_mb: u64,
    cursor: Mutex<i64>,
    next_id: Mutex<u32>,
}

fn to_trunk_error(e: anyhow::Error) -> TrunkError {
    TrunkError::Io(std::io::Error::other(e.to_string()))
}

impl TrunkFileManager {
    pub fn new(paths: StorePaths, cfg: &Config) -> Self {
        Self {
            paths,
            mode: cfg.store_path_mode,
            trunk_file_size: cfg.trunk_file_size,
            avg_storage_reserved_mb: cfg.avg_storage_reserved_mb,
            cursor: Mutex::new(0),
            next_id: Mutex::new(0),
        }
    }

    pub fn trunk_file_size(&self) -> u32 {
        self.trunk_file_size
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Sets the load-balance cursor externally; a negative value disables
    /// placement entirely (NoSpace), matching the load-balance contract.
    pub fn set_load_balance_cursor(&self, index: i64) {
        *self.cursor.lock().unwrap() = index;
    }

    fn select_store_path(&self) -> Result<usize> {
        let count = self.paths.count();
        if count == 0 {
            return Err(TrunkError::NoSpace);
        }
        let mut cursor = self.cursor.lock().unwrap();
        match self.mode {
            StorePathMode::LoadBalance => {
                if *cursor < 0 {
                    Err(TrunkError::NoSpace)
                } else {
                    Ok(*cursor as usize)
                }
            }
            StorePathMode::RoundRobin => {
                let mut index = (*cursor as usize) % count;
                if self.paths.free_mb(index) <= self.avg_storage_reserved_mb {
                    let found = (0..count).find(|&i| self.paths.free_mb(i) > self.avg_storage_reserved_mb);
                    match found {
                        Some(i) => index = i,
                        None => return Err(TrunkError::NoSpace),
                    }
                }
                *cursor = (index as i64 + 1) % count as i64;
                Ok(index)
            }
        }
    }

    fn next_trunk_id(&self) -> u32 {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        *id
    }

    /// `<store_path>/data/<HH>/<LL>/<base64-trunk-id>`.
    pub fn full_path(&self, path: TrunkPath, id: u32) -> PathBuf {
        self.paths.root(path.store_path_index as usize)
            .join("data")
            .join(format!("{:02x}", path.sub_path_high))
            .join(format!("{:02x}", path.sub_path_low))
            .join(trunk_filename(id))
    }

    /// Selects a store path and creates a brand-new trunk file of exactly
    /// `trunk_file_size` bytes, retrying with the next id on a filename
    /// collision.
    pub fn create_next_file<T: TrunkIo>(&self) -> Result<(TrunkPath, u32, T)> {
        let store_path_index = self.select_store_path()?;
        loop {
            let id = self.next_trunk_id();
            let (sub_path_high, sub_path_low) = sub_path_for_id(id);
            let path = TrunkPath { store_path_index: store_path_index as u16, sub_path_high, sub_path_low };
            let full_path = self.full_path(path, id);
            if full_path.exists() {
                continue;
            }
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let path_str = full_path.to_str()
                .ok_or_else(|| TrunkError::Invalid("non-utf8 trunk path".to_string()))?;
            let io = T::create_exclusive(path_str, self.trunk_file_size as u64).map_err(to_trunk_error)?;
            info!("created trunk {} at {}", id, full_path.display());
            return Ok((path, id, io));
        }
    }

    pub fn open_trunk<T: TrunkIo>(&self, path: TrunkPath, id: u32) -> Result<T> {
        let full_path = self.full_path(path, id);
        let path_str = full_path.to_str()
            .ok_or_else(|| TrunkError::Invalid("non-utf8 trunk path".to_string()))?;
        T::open(path_str).map_err(to_trunk_error)
    }

    /// Reconstruction helper used when replaying the binlog: no-op if the
    /// file already exists and is large enough, otherwise grows or creates
    /// it to exactly `size` bytes.
    pub fn ensure_size<T: TrunkIo>(&self, path: TrunkPath, id: u32, size: u64) -> Result<T> {
        let full_path = self.full_path(path, id);
        let path_str = full_path.to_str()
            .ok_or_else(|| TrunkError::Invalid("non-utf8 trunk path".to_string()))?;
        if full_path.exists() {
            let mut io = T::open(path_str).map_err(to_trunk_error)?;
            let len = io.len().map_err(to_trunk_error)?;
            if len < size {
                warn!("trunk {} shorter than expected ({} < {} bytes), growing", id, len, size);
                io.ensure_len(size).map_err(to_trunk_error)?;
            }
            Ok(io)
        } else {
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            T::create_exclusive(path_str, size).map_err(to_trunk_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trunk_io::file::FileTrunkIo;

    fn manager(root: &std::path::Path, mode: StorePathMode) -> TrunkFileManager {
        let paths = StorePaths::new(vec![root.to_path_buf()]);
        paths.set_free_mb(0, 10_000);
        let cfg = Config { store_path_mode: mode, trunk_file_size: 1024, avg_storage_reserved_mb: 100, ..Config::default() };
        TrunkFileManager::new(paths, &cfg)
    }

    #[test]
    fn create_next_file_assigns_monotone_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), StorePathMode::RoundRobin);
        let (_, id1, _io1): (_, _, FileTrunkIo) = mgr.create_next_file().unwrap();
        let (_, id2, _io2): (_, _, FileTrunkIo) = mgr.create_next_file().unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
    }

    #[test]
    fn create_next_file_writes_exactly_trunk_file_size_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), StorePathMode::RoundRobin);
        let (path, id, io): (_, _, FileTrunkIo) = mgr.create_next_file().unwrap();
        assert_eq!(io.len().unwrap(), 1024);
        assert!(mgr.full_path(path, id).exists());
    }

    #[test]
    fn round_robin_skips_path_below_reserved_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(vec![dir.path().join("a"), dir.path().join("b")]);
        paths.set_free_mb(0, 10); // below threshold
        paths.set_free_mb(1, 10_000);
        let cfg = Config { store_path_mode: StorePathMode::RoundRobin, trunk_file_size: 1024, avg_storage_reserved_mb: 100, ..Config::default() };
        let mgr = TrunkFileManager::new(paths, &cfg);
        let (path, _, _io): (_, _, FileTrunkIo) = mgr.create_next_file().unwrap();
        assert_eq!(path.store_path_index, 1);
    }

    #[test]
    fn round_robin_fails_with_no_space_when_every_path_is_low() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(vec![dir.path().to_path_buf()]);
        paths.set_free_mb(0, 1);
        let cfg = Config { store_path_mode: StorePathMode::RoundRobin, trunk_file_size: 1024, avg_storage_reserved_mb: 100, ..Config::default() };
        let mgr = TrunkFileManager::new(paths, &cfg);
        let err = mgr.create_next_file::<FileTrunkIo>().unwrap_err();
        assert!(matches!(err, TrunkError::NoSpace));
    }

    #[test]
    fn load_balance_negative_cursor_fails_with_no_space() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), StorePathMode::LoadBalance);
        mgr.set_load_balance_cursor(-1);
        let err = mgr.create_next_file::<FileTrunkIo>().unwrap_err();
        assert!(matches!(err, TrunkError::NoSpace));
    }

    #[test]
    fn ensure_size_grows_an_existing_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), StorePathMode::RoundRobin);
        let path = TrunkPath { store_path_index: 0, sub_path_high: 1, sub_path_low: 2 };
        let id = 9;
        let _io: FileTrunkIo = mgr.ensure_size(path, id, 512).unwrap();
        let grown: FileTrunkIo = mgr.ensure_size(path, id, 1024).unwrap();
        assert_eq!(grown.len().unwrap(), 1024);
    }
}
