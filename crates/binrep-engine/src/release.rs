use std::path::{Path, PathBuf};

use binrep_meta::MetaDocument;
use binrep_store::ObjectStore;
use binrep_types::{
    manifest_key, object_key, release_prefix, RepositoryName, Timestamp, DELIMITER,
};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// One timestamped publication of a set of binaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Release {
    pub name: RepositoryName,
    pub timestamp: Timestamp,
    pub meta: MetaDocument,
}

impl Release {
    pub fn new(name: RepositoryName, timestamp: Timestamp, meta: MetaDocument) -> Self {
        Self {
            name,
            timestamp,
            meta,
        }
    }

    /// `<name>/<timestamp>`
    pub fn prefix(&self) -> String {
        release_prefix(&self.name, &self.timestamp)
    }

    pub fn manifest_key(&self) -> String {
        manifest_key(&self.name, &self.timestamp)
    }

    pub fn object_key(&self, binary: &str) -> String {
        object_key(&self.name, &self.timestamp, binary)
    }

    /// Local mirror directory `<root>/<name>/<timestamp>`.
    ///
    /// Name segments that would step outside `root` are rejected.
    pub fn local_dir(&self, root: &Path) -> EngineResult<PathBuf> {
        let mut dir = root.to_path_buf();
        for segment in self.name.segments() {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(EngineError::InvalidArgument(format!(
                    "release name {} cannot be mapped to a local directory",
                    self.name
                )));
            }
            dir.push(segment);
        }
        dir.push(self.timestamp.as_str());
        Ok(dir)
    }
}

/// Timestamps published under `name`, oldest first.
///
/// Only the first listing page is read; a truncated listing is logged.
pub(crate) async fn list_timestamps(
    store: &dyn ObjectStore,
    name: &RepositoryName,
) -> EngineResult<Vec<Timestamp>> {
    let prefix = name.listing_prefix();
    let listing = store
        .list(&prefix, Some(DELIMITER))
        .await
        .map_err(|e| EngineError::backend(&prefix, e))?;
    if listing.truncated {
        warn!(%name, "release listing truncated; older releases beyond the first page are ignored");
    }

    let mut timestamps: Vec<Timestamp> = listing
        .common_prefixes
        .iter()
        .filter_map(|p| {
            let segment = p.strip_prefix(&prefix)?.trim_end_matches('/');
            Timestamp::parse(segment).ok()
        })
        .collect();
    timestamps.sort();
    timestamps.dedup();
    Ok(timestamps)
}

/// Fetch and decode the manifest of one release.
pub(crate) async fn fetch_release(
    store: &dyn ObjectStore,
    name: &RepositoryName,
    timestamp: &Timestamp,
) -> EngineResult<Release> {
    let key = manifest_key(name, timestamp);
    let data = store
        .get(&key)
        .await
        .map_err(|e| EngineError::backend(&key, e))?;
    let meta = MetaDocument::from_yaml(&data).map_err(|e| EngineError::manifest(&key, e))?;
    Ok(Release::new(name.clone(), timestamp.clone(), meta))
}

/// Fetch the most recent release of `name`.
pub(crate) async fn fetch_latest(
    store: &dyn ObjectStore,
    name: &RepositoryName,
) -> EngineResult<Release> {
    let timestamps = list_timestamps(store, name).await?;
    let latest = binrep_types::latest_of(&timestamps).ok_or_else(|| EngineError::NotFound {
        what: format!("no releases under {name}"),
    })?;
    fetch_release(store, name, latest).await
}
