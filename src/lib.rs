pub mod allocator;
pub mod binlog;
pub mod codec;
pub mod config;
pub mod error;
pub mod paths;
pub mod pool;
pub mod slot;
pub mod stat;
pub mod trunk;
pub mod types;

pub use allocator::Allocator;
pub use config::Config;
pub use error::{Result, TrunkError};
pub use slot::SlotTable;
pub use trunk::TrunkFileManager;
