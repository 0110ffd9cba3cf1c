use binrep_crypto::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

/// Tunables shared by the engines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Releases resolved in parallel by the tree walker.
    pub concurrency: usize,
    /// Per-transfer download cap in bytes per second.
    pub max_bandwidth: Option<u64>,
    /// Chunk size of the download copy loop.
    pub copy_buffer_size: usize,
    /// Releases kept per name after a push.
    pub keep_releases: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_bandwidth: None,
            copy_buffer_size: DEFAULT_CHUNK_SIZE,
            keep_releases: 5,
        }
    }
}

impl EngineConfig {
    /// Bandwidth of one transfer when `concurrency` transfers share the cap.
    pub fn per_worker_bandwidth(&self) -> Option<u64> {
        self.max_bandwidth
            .map(|total| (total / self.concurrency.max(1) as u64).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.keep_releases, 5);
        assert_eq!(config.copy_buffer_size, 64 * 1024);
        assert!(config.max_bandwidth.is_none());
    }

    #[test]
    fn bandwidth_is_split_across_workers() {
        let config = EngineConfig {
            concurrency: 4,
            max_bandwidth: Some(1_000_000),
            ..EngineConfig::default()
        };
        assert_eq!(config.per_worker_bandwidth(), Some(250_000));
        assert_eq!(EngineConfig::default().per_worker_bandwidth(), None);
    }
}
