use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use binrep_store::ObjectStore;
use binrep_types::{classify_key, KeyClass, RepositoryName, Timestamp, DELIMITER};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::release::{fetch_latest, fetch_release, Release};

/// Callback invoked once per discovered release.
///
/// Invocations run concurrently and in no particular order.
#[async_trait]
pub trait ReleaseVisitor: Send + Sync {
    async fn visit(&self, release: Release) -> EngineResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WalkMode {
    /// Every release at the timestamp it was found under.
    All,
    /// The latest release of each name found.
    Latest,
}

/// Totals of one walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Releases handed to the visitor successfully.
    pub visited: usize,
    /// Releases whose resolution or visit failed.
    pub failed: usize,
}

/// Recursive, depth-first discovery of releases under a key prefix.
///
/// Each level is listed with the delimiter. Entries that classify as a
/// release boundary become jobs on a pool of at most `concurrency` tasks;
/// the rest are descended into once every job of the level has finished.
/// A failed job is logged and counted, never cancels its siblings, and the
/// last recorded failure is returned after the walk completes.
#[derive(Clone)]
pub struct TreeWalker {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl TreeWalker {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Visit every release under `root`.
    pub async fn walk_all(
        &self,
        root: &str,
        visitor: Arc<dyn ReleaseVisitor>,
    ) -> EngineResult<WalkSummary> {
        self.walk(root, WalkMode::All, visitor).await
    }

    /// Visit only the latest release of every name under `root`.
    pub async fn walk_latest(
        &self,
        root: &str,
        visitor: Arc<dyn ReleaseVisitor>,
    ) -> EngineResult<WalkSummary> {
        self.walk(root, WalkMode::Latest, visitor).await
    }

    async fn walk(
        &self,
        root: &str,
        mode: WalkMode,
        visitor: Arc<dyn ReleaseVisitor>,
    ) -> EngineResult<WalkSummary> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let last_error: Arc<Mutex<Option<EngineError>>> = Arc::new(Mutex::new(None));
        let mut summary = WalkSummary::default();
        let mut seen_names: HashSet<RepositoryName> = HashSet::new();
        let mut pending = vec![root.to_string()];

        while let Some(prefix) = pending.pop() {
            let listing = self
                .store
                .list(&prefix, Some(DELIMITER))
                .await
                .map_err(|e| EngineError::backend(&prefix, e))?;
            if listing.truncated {
                warn!(%prefix, "listing truncated; entries beyond the first page are not walked");
            }

            let mut jobs = JoinSet::new();
            let mut seen_here: HashSet<(RepositoryName, Timestamp)> = HashSet::new();
            let mut descend = Vec::new();

            let entries = listing.common_prefixes.iter().map(|p| (p, true));
            let entries = entries.chain(listing.keys.iter().map(|k| (k, false)));
            for (entry, is_prefix) in entries {
                let (name, timestamp) = match classify_key(entry) {
                    KeyClass::Boundary { name, timestamp } => (name, timestamp),
                    KeyClass::Descend(next) => {
                        if is_prefix {
                            descend.push(next);
                        }
                        continue;
                    }
                };
                if !seen_here.insert((name.clone(), timestamp.clone())) {
                    continue;
                }
                let target = match mode {
                    WalkMode::All => Some(timestamp),
                    WalkMode::Latest if seen_names.insert(name.clone()) => None,
                    WalkMode::Latest => continue,
                };

                // Blocks while the pool is saturated.
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let store = self.store.clone();
                let visitor = visitor.clone();
                let last_error = last_error.clone();
                jobs.spawn(async move {
                    let _permit = permit;
                    let result = match target {
                        Some(ts) => fetch_release(store.as_ref(), &name, &ts).await,
                        None => fetch_latest(store.as_ref(), &name).await,
                    };
                    let result = match result {
                        Ok(release) => visitor.visit(release).await,
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(%name, error = %e, "failed to process release");
                            *last_error.lock().expect("lock poisoned") = Some(e);
                            false
                        }
                    }
                });
            }

            while let Some(joined) = jobs.join_next().await {
                match joined {
                    Ok(true) => summary.visited += 1,
                    Ok(false) => summary.failed += 1,
                    Err(e) => {
                        warn!(error = %e, "walk job aborted");
                        summary.failed += 1;
                        *last_error.lock().expect("lock poisoned") =
                            Some(EngineError::Worker(e.to_string()));
                    }
                }
            }
            debug!(%prefix, descend = descend.len(), "walked level");

            pending.extend(descend.into_iter().rev());
        }

        let failure = last_error.lock().expect("lock poisoned").take();
        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

impl std::fmt::Debug for TreeWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
