use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use binrep_crypto::HashingWriter;
use binrep_meta::{BinaryDescriptor, BinarySource, MetaDocument};
use binrep_store::ObjectStore;
use binrep_types::{RepositoryName, Timestamp};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::release::{fetch_latest, fetch_release, list_timestamps, Release};
use crate::throttle::ThrottledReader;

/// Options for a single push.
#[derive(Clone, Debug, Default)]
pub struct PushOptions {
    /// Publish even when every checksum matches the latest release.
    pub force: bool,
    /// Timestamp of the new release; the current UTC time when `None`.
    pub timestamp: Option<Timestamp>,
}

/// Result of a push.
#[derive(Clone, Debug)]
pub enum PushOutcome {
    /// Nothing changed since `latest`; no release was written.
    Skipped { latest: Release },
    /// A new release was written.
    Created { release: Release },
}

impl PushOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// The release that now represents the pushed binaries.
    pub fn release(&self) -> &Release {
        match self {
            Self::Skipped { latest } => latest,
            Self::Created { release } => release,
        }
    }
}

/// Moves releases between the object store and local files.
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Same engine with a different per-transfer bandwidth cap.
    pub fn with_bandwidth(mut self, max_bandwidth: Option<u64>) -> Self {
        self.config.max_bandwidth = max_bandwidth;
        self
    }

    /// Timestamps published under `name`, oldest first.
    pub async fn timestamps(&self, name: &RepositoryName) -> EngineResult<Vec<Timestamp>> {
        list_timestamps(self.store.as_ref(), name).await
    }

    /// Returns `true` if at least one release exists under `name`.
    pub async fn exists(&self, name: &RepositoryName) -> EngineResult<bool> {
        Ok(!self.timestamps(name).await?.is_empty())
    }

    pub async fn find_latest(&self, name: &RepositoryName) -> EngineResult<Release> {
        fetch_latest(self.store.as_ref(), name).await
    }

    /// Fetch a release by its exact timestamp. A missing manifest is
    /// `NotFound`.
    pub async fn find_by_timestamp(
        &self,
        name: &RepositoryName,
        timestamp: &Timestamp,
    ) -> EngineResult<Release> {
        fetch_release(self.store.as_ref(), name, timestamp).await
    }

    /// Publish `sources` as a new release of `name`.
    ///
    /// The manifest is uploaded before the binaries. A failed push leaves
    /// whatever was already uploaded in place.
    pub async fn push<S>(
        &self,
        name: &RepositoryName,
        sources: &[S],
        options: PushOptions,
    ) -> EngineResult<PushOutcome>
    where
        S: AsRef<dyn BinarySource> + Sync,
    {
        if sources.is_empty() {
            return Err(EngineError::InvalidArgument(
                "push requires at least one binary".into(),
            ));
        }

        let meta = MetaDocument::build(sources).await?;
        for binary in &meta.binaries {
            binary.validate_name()?;
        }

        if !options.force {
            match self.find_latest(name).await {
                Ok(latest) if meta.matches_checksums_of(&latest.meta) => {
                    info!(%name, timestamp = %latest.timestamp, "binaries unchanged since latest release; skipping push");
                    return Ok(PushOutcome::Skipped { latest });
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let timestamp = options.timestamp.unwrap_or_else(Timestamp::now);
        let release = Release::new(name.clone(), timestamp, meta);

        let manifest_key = release.manifest_key();
        let yaml = release
            .meta
            .to_yaml()
            .map_err(|e| EngineError::manifest(&manifest_key, e))?;
        self.store
            .put(&manifest_key, Bytes::from(yaml))
            .await
            .map_err(|e| EngineError::backend(&manifest_key, e))?;
        debug!(key = %manifest_key, "uploaded manifest");

        for (source, binary) in sources.iter().zip(&release.meta.binaries) {
            let key = release.object_key(&binary.name);
            let reader = source
                .as_ref()
                .open()
                .await
                .map_err(|e| EngineError::ChecksumError {
                    name: binary.name.clone(),
                    reason: format!("failed to reopen source for upload: {e}"),
                })?;
            let size = self
                .store
                .upload(&key, reader)
                .await
                .map_err(|e| EngineError::backend(&key, e))?;
            debug!(%key, size, "uploaded binary");
        }

        info!(
            %name,
            timestamp = %release.timestamp,
            binaries = release.meta.len(),
            "pushed release"
        );
        Ok(PushOutcome::Created { release })
    }

    /// Download a release of `name` into `dest`, verifying every binary.
    ///
    /// Without a timestamp the latest release is used. The first failing
    /// binary aborts the pull.
    pub async fn pull(
        &self,
        name: &RepositoryName,
        timestamp: Option<&Timestamp>,
        dest: &Path,
    ) -> EngineResult<Release> {
        let release = match timestamp {
            Some(ts) => self.find_by_timestamp(name, ts).await?,
            None => self.find_latest(name).await?,
        };
        self.pull_release(&release, dest).await?;
        Ok(release)
    }

    /// Download every binary of an already resolved release into `dest`.
    pub async fn pull_release(&self, release: &Release, dest: &Path) -> EngineResult<()> {
        tokio::fs::create_dir_all(dest).await?;
        for binary in &release.meta.binaries {
            self.pull_binary(release, binary, dest).await?;
        }
        info!(
            name = %release.name,
            timestamp = %release.timestamp,
            dest = %dest.display(),
            "pulled release"
        );
        Ok(())
    }

    async fn pull_binary(
        &self,
        release: &Release,
        binary: &BinaryDescriptor,
        dest: &Path,
    ) -> EngineResult<PathBuf> {
        binary.validate_name()?;
        let key = release.object_key(&binary.name);
        let path = dest.join(&binary.name);

        let reader = self
            .store
            .open_read(&key)
            .await
            .map_err(|e| EngineError::backend(&key, e))?;
        let mut reader: Box<dyn AsyncRead + Send + Unpin> = match self.config.max_bandwidth {
            Some(limit) => Box::new(ThrottledReader::new(reader, limit)),
            None => reader,
        };

        // A previous pull may have left a read-only file here.
        remove_if_present(&path).await?;
        let file = create_with_mode(&path, binary.mode).await?;
        let mut writer = HashingWriter::new(file);
        let mut buf = vec![0u8; self.config.copy_buffer_size.max(1)];
        loop {
            let n = reader.read(&mut buf).await.map_err(|e| EngineError::Backend {
                key: key.clone(),
                source: e.into(),
            })?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
        }
        writer.flush().await?;
        let size = writer.bytes_written();
        let (file, observed) = writer.finish();
        drop(file);
        set_mode(&path, binary.mode).await?;

        if observed != binary.checksum {
            remove_if_present(&path).await?;
            return Err(EngineError::ChecksumMismatch {
                name: binary.name.clone(),
                key,
                expected: binary.checksum.clone(),
                observed,
            });
        }
        debug!(%key, path = %path.display(), size, "downloaded binary");
        Ok(path)
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
async fn create_with_mode(path: &Path, mode: u32) -> io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .await
}

#[cfg(not(unix))]
async fn create_with_mode(path: &Path, _mode: u32) -> io::Result<tokio::fs::File> {
    tokio::fs::File::create(path).await
}

/// Apply `mode` exactly; creation is subject to the umask.
#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
