/// Core data types shared by every allocator component.
use serde::{Deserialize, Serialize};

/// Identifies a storage directory: which configured store path, and the
/// two-byte sub-path pair derived from the trunk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrunkPath {
    pub store_path_index: u16,
    pub sub_path_high: u8,
    pub sub_path_low: u8,
}

/// Identifies a region within a trunk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrunkFileRef {
    pub id: u32,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtentStatus {
    Free,
    Hold,
}

/// A free (or reserved) region tracked by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrunkExtent {
    pub path: TrunkPath,
    pub file: TrunkFileRef,
    pub status: ExtentStatus,
}

impl TrunkExtent {
    pub fn new(path: TrunkPath, file: TrunkFileRef, status: ExtentStatus) -> Self {
        Self { path, file, status }
    }

    /// Compares every field except `status`, the key used by `confirm`
    /// and `free` to locate an existing entry.
    pub fn same_location(&self, other: &TrunkExtent) -> bool {
        self.path == other.path && self.file == other.file
    }
}

/// Where new trunk files are placed when more than one store path exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorePathMode {
    RoundRobin,
    LoadBalance,
}

/// A single binlog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinlogEntry {
    pub timestamp: u64,
    pub op: BinlogOp,
    pub path: TrunkPath,
    pub file: TrunkFileRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinlogOp {
    AddSpace,
    DelSpace,
    SetSpaceFree,
}

impl BinlogOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinlogOp::AddSpace => "ADD_SPACE",
            BinlogOp::DelSpace => "DEL_SPACE",
            BinlogOp::SetSpaceFree => "SET_SPACE_FREE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD_SPACE" => Some(BinlogOp::AddSpace),
            "DEL_SPACE" => Some(BinlogOp::DelSpace),
            "SET_SPACE_FREE" => Some(BinlogOp::SetSpaceFree),
            _ => None,
        }
    }
}
