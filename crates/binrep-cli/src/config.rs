use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use binrep_engine::EngineConfig;
use binrep_store::{FsObjectStore, ObjectStore};
use serde::Deserialize;
use tracing::debug;

use crate::bandwidth::parse_bandwidth;

/// Settings read from the optional TOML file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub concurrency: Option<usize>,
    pub keep_releases: Option<usize>,
    /// Human size, e.g. "10 MB".
    pub max_bandwidth: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Engine configuration from the file alone.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = EngineConfig::default();
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(keep) = self.keep_releases {
            config.keep_releases = keep;
        }
        if let Some(bandwidth) = &self.max_bandwidth {
            let parsed = parse_bandwidth(bandwidth)
                .map_err(|e| anyhow::anyhow!("max_bandwidth in config file: {e}"))?;
            config.max_bandwidth = Some(parsed);
        }
        Ok(config)
    }
}

/// Where the repository lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Local directory holding one file per object.
    Local(PathBuf),
}

impl Endpoint {
    /// Accepts a bare path or a `file://` URL.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("backend endpoint must not be empty");
        }
        if !raw.contains("://") {
            return Ok(Self::Local(PathBuf::from(raw)));
        }

        let url = url::Url::parse(raw).with_context(|| format!("invalid endpoint {raw:?}"))?;
        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| anyhow::anyhow!("endpoint {raw:?} is not a local file path")),
            scheme => bail!(
                "unsupported endpoint scheme {scheme:?} in {raw:?}; use a directory path or a file:// URL"
            ),
        }
    }

    pub async fn open(&self) -> anyhow::Result<Arc<dyn ObjectStore>> {
        match self {
            Self::Local(root) => {
                let store = FsObjectStore::open(root)
                    .await
                    .with_context(|| format!("failed to open repository at {}", root.display()))?;
                Ok(Arc::new(store))
            }
        }
    }
}

/// Pick the endpoint: the flag or environment first, then the file.
pub fn resolve_endpoint(flag: Option<&str>, file: &FileConfig) -> anyhow::Result<Endpoint> {
    let raw = flag
        .filter(|s| !s.trim().is_empty())
        .or(file.endpoint.as_deref())
        .context("backend endpoint required; use --endpoint or BINREP_BACKEND_ENDPOINT")?;
    Endpoint::parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_and_file_url() {
        assert_eq!(
            Endpoint::parse("/srv/binrep").unwrap(),
            Endpoint::Local(PathBuf::from("/srv/binrep"))
        );
        assert_eq!(
            Endpoint::parse("relative/dir").unwrap(),
            Endpoint::Local(PathBuf::from("relative/dir"))
        );
        #[cfg(unix)]
        assert_eq!(
            Endpoint::parse("file:///srv/binrep").unwrap(),
            Endpoint::Local(PathBuf::from("/srv/binrep"))
        );
    }

    #[test]
    fn remote_schemes_are_rejected() {
        let err = Endpoint::parse("s3://my-bucket").unwrap_err();
        assert!(err.to_string().contains("unsupported endpoint scheme"));
        assert!(Endpoint::parse("  ").is_err());
    }

    #[test]
    fn flag_wins_over_file() {
        let file = FileConfig {
            endpoint: Some("/from/file".into()),
            ..FileConfig::default()
        };
        assert_eq!(
            resolve_endpoint(Some("/from/flag"), &file).unwrap(),
            Endpoint::Local(PathBuf::from("/from/flag"))
        );
        assert_eq!(
            resolve_endpoint(None, &file).unwrap(),
            Endpoint::Local(PathBuf::from("/from/file"))
        );
        assert!(resolve_endpoint(None, &FileConfig::default()).is_err());
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binrep.toml");
        std::fs::write(
            &path,
            "endpoint = \"/srv/binrep\"\nconcurrency = 4\nkeep_releases = 3\nmax_bandwidth = \"8 MB\"\n",
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        let engine = file.engine_config().unwrap();
        assert_eq!(file.endpoint.as_deref(), Some("/srv/binrep"));
        assert_eq!(engine.concurrency, 4);
        assert_eq!(engine.keep_releases, 3);
        assert_eq!(engine.max_bandwidth, Some(8_000_000));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binrep.toml");
        std::fs::write(&path, "endpont = \"/typo\"\n").unwrap();
        assert!(FileConfig::load(&path).is_err());
    }
}
