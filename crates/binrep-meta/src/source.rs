use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::{MetaError, MetaResult};
use crate::meta::DEFAULT_MODE;

/// Boxed reader handed out by a [`BinarySource`].
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// A binary that can be read from the start any number of times.
#[async_trait]
pub trait BinarySource: Send + Sync {
    /// Object name of the binary inside its release.
    fn name(&self) -> &str;

    /// POSIX permission bits recorded in the manifest.
    fn mode(&self) -> u32;

    /// Open a fresh reader positioned at the first byte.
    async fn open(&self) -> io::Result<SourceReader>;
}

/// Binary read from a local file.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    mode: u32,
}

impl FileSource {
    /// Describe the file at `path`, naming it after its final component and
    /// taking its mode from the filesystem.
    pub async fn from_path(path: impl Into<PathBuf>) -> MetaResult<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| MetaError::InvalidDescriptor {
                name: path.display().to_string(),
                reason: "path has no usable file name".into(),
            })?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| MetaError::Checksum {
                name: name.clone(),
                reason: format!("failed to stat {}: {e}", path.display()),
            })?;
        if !metadata.is_file() {
            return Err(MetaError::InvalidDescriptor {
                name,
                reason: format!("{} is not a regular file", path.display()),
            });
        }
        Ok(Self {
            mode: file_mode(&metadata),
            path,
            name,
        })
    }

    /// Describe a file with an explicit name and mode.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, mode: u32) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BinarySource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> u32 {
        self.mode
    }

    async fn open(&self) -> io::Result<SourceReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    DEFAULT_MODE
}

/// Binary held in memory.
#[derive(Clone, Debug)]
pub struct BytesSource {
    name: String,
    data: Bytes,
    mode: u32,
}

impl BytesSource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::with_mode(name, data, DEFAULT_MODE)
    }

    pub fn with_mode(name: impl Into<String>, data: impl Into<Bytes>, mode: u32) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mode,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[async_trait]
impl BinarySource for BytesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> u32 {
        self.mode
    }

    async fn open(&self) -> io::Result<SourceReader> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}
