/// Storage-path registry: the set of configured store roots plus their
/// current free-space figures, used by the trunk file manager's placement
/// policy.
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub struct StorePaths {
    roots: Vec<PathBuf>,
    free_mb: RwLock<Vec<u64>>,
}

impl StorePaths {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let free_mb = RwLock::new(vec![u64::MAX; roots.len()]);
        Self { roots, free_mb }
    }

    pub fn count(&self) -> usize {
        self.roots.len()
    }

    pub fn root(&self, index: usize) -> &Path {
        &self.roots[index]
    }

    pub fn free_mb(&self, index: usize) -> u64 {
        self.free_mb.read().unwrap()[index]
    }

    /// Refreshes the cached free-MB figure for one path. Real deployments
    /// poll this from a statfs-style call; tests set it directly.
    pub fn set_free_mb(&self, index: usize, mb: u64) {
        self.free_mb.write().unwrap()[index] = mb;
    }

    pub fn avg_free_mb(&self) -> u64 {
        let free_mb = self.free_mb.read().unwrap();
        if free_mb.is_empty() {
            return 0;
        }
        free_mb.iter().sum::<u64>() / free_mb.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_free_mb_per_path_and_average() {
        let paths = StorePaths::new(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        paths.set_free_mb(0, 100);
        paths.set_free_mb(1, 300);
        assert_eq!(paths.free_mb(0), 100);
        assert_eq!(paths.avg_free_mb(), 200);
    }
}
