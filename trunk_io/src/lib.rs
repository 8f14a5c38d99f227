#[derive(Default, Debug)]
pub struct TrunkIoStats {
    pub read_cnt: u32,
    pub write_cnt: u32,
    pub create_cnt: u32,
}

/// Positioned I/O over a single trunk container file.
///
/// Mirrors the shape of a disk driver: open/create, read/write at an
/// absolute offset, and a size query. Implementations never buffer across
/// calls; the allocator and stat resolver are responsible for seeking to
/// the right place for every call.
pub trait TrunkIo: Send {
    /// Open an existing trunk file for reading and writing.
    fn open(path: &str) -> anyhow::Result<Self> where Self: Sized;

    /// Create a new trunk file of exactly `size` bytes, failing if one
    /// already exists at `path` (`O_CREAT | O_EXCL` semantics).
    fn create_exclusive(path: &str, size: u64) -> anyhow::Result<Self> where Self: Sized;

    /// Grow the file to `size` bytes if it is smaller; no-op otherwise.
    fn ensure_len(&mut self, size: u64) -> anyhow::Result<()>;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> anyhow::Result<()>;

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> anyhow::Result<()>;

    fn len(&self) -> anyhow::Result<u64>;
}

pub mod file;
pub mod memory;
