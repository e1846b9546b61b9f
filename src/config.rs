use std::num::NonZeroUsize;

/// Tuning knobs for an [`ArchiveVfs`](crate::ArchiveVfs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsOptions {
    /// Upper bound on archives parsed at the same time
    pub max_parallel_indexing: usize,
    /// Check CRC-32 and length when a served stream reaches its end
    pub verify_crc: bool,
}

impl Default for VfsOptions {
    fn default() -> Self {
        Self {
            max_parallel_indexing: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            verify_crc: true,
        }
    }
}

impl VfsOptions {
    pub fn with_max_parallel_indexing(mut self, n: usize) -> Self {
        self.max_parallel_indexing = n.max(1);
        self
    }

    pub fn with_verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallelism_is_at_least_one() {
        let options = VfsOptions::default().with_max_parallel_indexing(0);
        assert_eq!(options.max_parallel_indexing, 1);
        assert!(options.verify_crc);
        assert!(VfsOptions::default().max_parallel_indexing >= 1);
    }
}
