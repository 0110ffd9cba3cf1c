use std::sync::Arc;

use binrep_store::ObjectStore;
use binrep_types::{manifest_key, release_prefix, RepositoryName, Timestamp, DELIMITER};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::release::list_timestamps;

/// Deletes old releases.
///
/// Deletion is per object and not transactional. An interrupted prune
/// leaves a partially deleted release behind; running it again finishes
/// the job because only the remaining objects are listed.
#[derive(Clone)]
pub struct RetentionEngine {
    store: Arc<dyn ObjectStore>,
}

impl RetentionEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Keep the newest `keep` releases of `name` and delete the rest.
    ///
    /// Returns the deleted timestamps, oldest first. The first failed
    /// deletion aborts the prune; earlier deletions stay applied.
    pub async fn prune(&self, name: &RepositoryName, keep: usize) -> EngineResult<Vec<Timestamp>> {
        let timestamps = list_timestamps(self.store.as_ref(), name).await?;
        if timestamps.len() <= keep {
            debug!(%name, count = timestamps.len(), keep, "nothing to prune");
            return Ok(Vec::new());
        }

        let excess = timestamps.len() - keep;
        let doomed: Vec<Timestamp> = timestamps.into_iter().take(excess).collect();
        for timestamp in &doomed {
            self.purge(name, timestamp).await?;
        }
        info!(%name, pruned = doomed.len(), keep, "pruned releases");
        Ok(doomed)
    }

    /// Delete one release after checking that its manifest exists.
    pub async fn delete_release(
        &self,
        name: &RepositoryName,
        timestamp: &Timestamp,
    ) -> EngineResult<()> {
        let key = manifest_key(name, timestamp);
        let present = self
            .store
            .exists(&key)
            .await
            .map_err(|e| EngineError::backend(&key, e))?;
        if !present {
            return Err(EngineError::NotFound { what: key });
        }
        self.purge(name, timestamp).await
    }

    /// Delete every object below the release prefix, including objects the
    /// manifest does not mention.
    async fn purge(&self, name: &RepositoryName, timestamp: &Timestamp) -> EngineResult<()> {
        let prefix = format!("{}{DELIMITER}", release_prefix(name, timestamp));
        let listing = self
            .store
            .list(&prefix, None)
            .await
            .map_err(|e| EngineError::backend(&prefix, e))?;
        if listing.truncated {
            warn!(%prefix, "object listing truncated; some objects of this release were not deleted");
        }

        for key in &listing.keys {
            self.store
                .delete(key)
                .await
                .map_err(|e| EngineError::Backend {
                    key: key.clone(),
                    source: e,
                })?;
            debug!(%key, "deleted object");
        }
        info!(%name, %timestamp, objects = listing.keys.len(), "deleted release");
        Ok(())
    }
}

impl std::fmt::Debug for RetentionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionEngine").finish_non_exhaustive()
    }
}
