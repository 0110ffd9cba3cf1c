use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use binrep_meta::BinarySource;
use binrep_store::ObjectStore;
use binrep_types::{RepositoryName, Timestamp, MANIFEST_FILE_NAME};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::release::Release;
use crate::retention::RetentionEngine;
use crate::transfer::{PushOptions, PushOutcome, TransferEngine};
use crate::walker::{ReleaseVisitor, TreeWalker, WalkSummary};

/// Result of a push followed by retention.
#[derive(Clone, Debug)]
pub struct PushReport {
    pub outcome: PushOutcome,
    /// Timestamps removed by the prune that followed the push.
    pub pruned: Vec<Timestamp>,
}

/// Result of mirroring the latest releases to a local directory.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Releases downloaded by this run.
    pub synced: Vec<(RepositoryName, Timestamp)>,
    /// Releases whose local directory already existed.
    pub skipped: Vec<(RepositoryName, Timestamp)>,
    pub summary: WalkSummary,
}

/// High-level release repository API over one object store.
pub struct Repository {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
    transfer: TransferEngine,
    retention: RetentionEngine,
}

impl Repository {
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self {
            transfer: TransferEngine::new(store.clone(), config.clone()),
            retention: RetentionEngine::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transfer(&self) -> &TransferEngine {
        &self.transfer
    }

    pub fn retention(&self) -> &RetentionEngine {
        &self.retention
    }

    pub fn walker(&self) -> TreeWalker {
        TreeWalker::new(self.store.clone(), self.config.concurrency)
    }

    /// Push `sources`, then prune `name` down to `keep` releases.
    ///
    /// A skipped push does not prune.
    pub async fn push<S>(
        &self,
        name: &RepositoryName,
        sources: &[S],
        options: PushOptions,
        keep: usize,
    ) -> EngineResult<PushReport>
    where
        S: AsRef<dyn BinarySource> + Sync,
    {
        let outcome = self.transfer.push(name, sources, options).await?;
        let pruned = if outcome.is_skipped() {
            Vec::new()
        } else {
            self.retention.prune(name, keep).await?
        };
        Ok(PushReport { outcome, pruned })
    }

    pub async fn pull(
        &self,
        name: &RepositoryName,
        timestamp: Option<&Timestamp>,
        dest: &Path,
    ) -> EngineResult<Release> {
        self.transfer.pull(name, timestamp, dest).await
    }

    /// Visit every release in the store.
    pub async fn walk_all(&self, visitor: Arc<dyn ReleaseVisitor>) -> EngineResult<WalkSummary> {
        self.walker().walk_all("", visitor).await
    }

    /// Mirror the latest release of every name into `root/<name>/<timestamp>`.
    ///
    /// The bandwidth cap is shared evenly by the concurrent downloads.
    pub async fn sync(&self, root: &Path) -> EngineResult<SyncReport> {
        tokio::fs::create_dir_all(root).await?;
        let visitor = Arc::new(SyncVisitor {
            transfer: self
                .transfer
                .clone()
                .with_bandwidth(self.config.per_worker_bandwidth()),
            root: root.to_path_buf(),
            report: Mutex::new(SyncReport::default()),
        });

        let walked = self.walker().walk_latest("", visitor.clone()).await;
        let mut report = std::mem::take(&mut *visitor.report.lock().expect("lock poisoned"));
        report.summary = walked?;
        info!(
            synced = report.synced.len(),
            skipped = report.skipped.len(),
            root = %root.display(),
            "sync finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct SyncVisitor {
    transfer: TransferEngine,
    root: PathBuf,
    report: Mutex<SyncReport>,
}

#[async_trait]
impl ReleaseVisitor for SyncVisitor {
    async fn visit(&self, release: Release) -> EngineResult<()> {
        let dir = release.local_dir(&self.root)?;
        let entry = (release.name.clone(), release.timestamp.clone());
        if tokio::fs::try_exists(&dir).await? {
            info!(name = %release.name, timestamp = %release.timestamp, "already synced");
            self.report.lock().expect("lock poisoned").skipped.push(entry);
            return Ok(());
        }

        if let Err(e) = self.fetch_into(&release, &dir).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                warn!(dir = %dir.display(), error = %cleanup, "failed to remove incomplete release");
            }
            return Err(e);
        }
        self.report.lock().expect("lock poisoned").synced.push(entry);
        Ok(())
    }
}

impl SyncVisitor {
    async fn fetch_into(&self, release: &Release, dir: &Path) -> EngineResult<()> {
        self.transfer.pull_release(release, dir).await?;
        let yaml = release
            .meta
            .to_yaml()
            .map_err(|e| EngineError::manifest(release.manifest_key(), e))?;
        tokio::fs::write(dir.join(MANIFEST_FILE_NAME), yaml)
            .await
            .map_err(EngineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrep_meta::BytesSource;
    use binrep_store::InMemoryObjectStore;

    fn name(s: &str) -> RepositoryName {
        RepositoryName::parse(s).unwrap()
    }

    fn at(ts: &str) -> PushOptions {
        PushOptions {
            force: false,
            timestamp: Some(Timestamp::parse(ts).unwrap()),
        }
    }

    fn tool(body: &'static [u8]) -> Vec<Arc<dyn BinarySource>> {
        vec![Arc::new(BytesSource::new("tool", body))]
    }

    #[tokio::test]
    async fn push_prunes_to_keep() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = Repository::new(store, EngineConfig::default());
        let proj = name("org/proj");

        repo.push(&proj, &tool(b"1"), at("20210101000000"), 2).await.unwrap();
        repo.push(&proj, &tool(b"2"), at("20210102000000"), 2).await.unwrap();
        let report = repo.push(&proj, &tool(b"3"), at("20210103000000"), 2).await.unwrap();

        assert_eq!(report.pruned, vec![Timestamp::parse("20210101000000").unwrap()]);
        assert_eq!(repo.transfer().timestamps(&proj).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn skipped_push_does_not_prune() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = Repository::new(store, EngineConfig::default());
        let proj = name("org/proj");

        repo.push(&proj, &tool(b"1"), at("20210101000000"), 5).await.unwrap();
        repo.push(&proj, &tool(b"2"), at("20210102000000"), 5).await.unwrap();
        let report = repo.push(&proj, &tool(b"2"), at("20210103000000"), 1).await.unwrap();

        assert!(report.outcome.is_skipped());
        assert!(report.pruned.is_empty());
        assert_eq!(repo.transfer().timestamps(&proj).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sync_mirrors_latest_and_skips_existing() {
        let store = Arc::new(InMemoryObjectStore::new());
        let config = EngineConfig {
            concurrency: 2,
            ..EngineConfig::default()
        };
        let repo = Repository::new(store, config);
        repo.push(&name("org/a"), &tool(b"a1"), at("20210101000000"), 5).await.unwrap();
        repo.push(&name("org/a"), &tool(b"a2"), at("20210102000000"), 5).await.unwrap();
        repo.push(&name("org/b"), &tool(b"b1"), at("20210101000000"), 5).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let report = repo.sync(dir.path()).await.unwrap();
        assert_eq!(report.synced.len(), 2);
        assert!(report.skipped.is_empty());

        let a = dir.path().join("org/a/20210102000000");
        assert_eq!(std::fs::read(a.join("tool")).unwrap(), b"a2");
        assert!(a.join("meta.yml").is_file());
        assert!(!dir.path().join("org/a/20210101000000").exists());

        let again = repo.sync(dir.path()).await.unwrap();
        assert!(again.synced.is_empty());
        assert_eq!(again.skipped.len(), 2);
    }
}
