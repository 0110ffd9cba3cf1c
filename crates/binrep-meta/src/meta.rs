use binrep_crypto::{digest_reader, Checksum, DEFAULT_CHUNK_SIZE};
use binrep_types::MANIFEST_FILE_NAME;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MetaError, MetaResult};
use crate::source::BinarySource;

/// Mode recorded for binaries whose manifest entry carries none.
pub const DEFAULT_MODE: u32 = 0o755;

fn default_mode() -> u32 {
    DEFAULT_MODE
}

/// One binary of a release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryDescriptor {
    /// Object name inside the release prefix; also the local file name.
    pub name: String,
    /// Hex SHA-256 of the full contents.
    pub checksum: Checksum,
    /// POSIX permission bits.
    #[serde(default = "default_mode")]
    pub mode: u32,
    /// Free-form version label carried by some manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl BinaryDescriptor {
    pub fn new(name: impl Into<String>, checksum: Checksum, mode: u32) -> Self {
        Self {
            name: name.into(),
            checksum,
            mode,
            version: None,
        }
    }

    /// Check that `name` is safe to use as a single local file name.
    pub fn validate_name(&self) -> MetaResult<()> {
        let reason = if self.name.is_empty() {
            Some("name must not be empty")
        } else if self.name.contains('/') || self.name.contains('\\') {
            Some("name must not contain a path separator")
        } else if self.name == "." || self.name == ".." {
            Some("name must not be a relative directory")
        } else if self.name == MANIFEST_FILE_NAME {
            Some("name is reserved for the release manifest")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(MetaError::InvalidDescriptor {
                name: self.name.clone(),
                reason: reason.into(),
            }),
            None => Ok(()),
        }
    }
}

/// Manifest of a release: binaries in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaDocument {
    #[serde(default)]
    pub binaries: Vec<BinaryDescriptor>,
}

impl MetaDocument {
    pub fn new(binaries: Vec<BinaryDescriptor>) -> Self {
        Self { binaries }
    }

    /// Checksum every source once and describe it.
    ///
    /// Sources are read in order; the first unreadable one aborts the build
    /// with [`MetaError::Checksum`].
    pub async fn build<S>(sources: &[S]) -> MetaResult<Self>
    where
        S: AsRef<dyn BinarySource>,
    {
        let mut binaries = Vec::with_capacity(sources.len());
        for source in sources {
            let source = source.as_ref();
            let name = source.name().to_string();
            let mut reader = source.open().await.map_err(|e| MetaError::Checksum {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            let (checksum, size) = digest_reader(&mut reader, DEFAULT_CHUNK_SIZE)
                .await
                .map_err(|e| MetaError::Checksum {
                    name: name.clone(),
                    reason: format!("failed to read data for checksum: {e}"),
                })?;
            debug!(binary = %name, size, checksum = %checksum.short(), "checksummed binary");
            binaries.push(BinaryDescriptor::new(name, checksum, source.mode()));
        }
        Ok(Self { binaries })
    }

    /// Extend the binary list, keeping existing entries first.
    pub fn append(&mut self, binaries: impl IntoIterator<Item = BinaryDescriptor>) {
        self.binaries.extend(binaries);
    }

    pub fn get(&self, name: &str) -> Option<&BinaryDescriptor> {
        self.binaries.iter().find(|b| b.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.binaries.iter().map(|b| b.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }

    /// Returns `true` if every binary here has a same-named entry in
    /// `latest` with an equal checksum.
    ///
    /// The join is by name, not position. A binary missing from `latest`
    /// counts as a difference; extra binaries in `latest` are ignored. An
    /// empty document never matches.
    pub fn matches_checksums_of(&self, latest: &MetaDocument) -> bool {
        !self.is_empty()
            && self.binaries.iter().all(|b| {
                latest
                    .get(&b.name)
                    .is_some_and(|prev| prev.checksum == b.checksum)
            })
    }

    pub fn to_yaml(&self) -> MetaResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(data: &[u8]) -> MetaResult<Self> {
        Ok(serde_yaml::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::source::{BytesSource, SourceReader};

    const DROOT_SUM: &str = "ec9efb6249e0e4797bde75afbfe962e0db81c530b5bb1cfd2cbe0e2fc2c8cf48";
    const GRABENI_SUM: &str = "3e30f16f0ec41ab92ceca57a527efff18b6bacabd12a842afda07b8329e32259";

    fn descriptor(name: &str, sum: &str) -> BinaryDescriptor {
        BinaryDescriptor::new(name, Checksum::parse(sum).unwrap(), 0o755)
    }

    struct BrokenSource;

    #[async_trait::async_trait]
    impl BinarySource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }
        fn mode(&self) -> u32 {
            0o644
        }
        async fn open(&self) -> std::io::Result<SourceReader> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "closed"))
        }
    }

    #[tokio::test]
    async fn build_checksums_each_source_in_order() {
        let sources: Vec<Arc<dyn BinarySource>> = vec![
            Arc::new(BytesSource::new("droot", &b"droot-body"[..])),
            Arc::new(BytesSource::with_mode("grabeni", &b"grabeni-body"[..], 0o700)),
        ];
        let meta = MetaDocument::build(&sources).await.unwrap();

        assert_eq!(meta.names().collect::<Vec<_>>(), vec!["droot", "grabeni"]);
        assert_eq!(meta.binaries[0].checksum, Checksum::of(b"droot-body"));
        assert_eq!(meta.binaries[1].mode, 0o700);
    }

    #[tokio::test]
    async fn build_fails_on_unreadable_source() {
        let sources: Vec<Box<dyn BinarySource>> = vec![Box::new(BrokenSource)];
        let err = MetaDocument::build(&sources).await.unwrap_err();
        assert!(matches!(err, MetaError::Checksum { ref name, .. } if name == "broken"));
    }

    #[test]
    fn yaml_wire_format() {
        let meta = MetaDocument::new(vec![descriptor("droot", DROOT_SUM)]);
        let yaml = meta.to_yaml().unwrap();
        assert!(yaml.contains("binaries:"));
        assert!(yaml.contains("name: droot"));
        assert!(yaml.contains(&format!("checksum: {DROOT_SUM}")));
        assert!(yaml.contains("mode: 493"));
        assert!(!yaml.contains("version"));
        assert_eq!(MetaDocument::from_yaml(yaml.as_bytes()).unwrap(), meta);
    }

    #[test]
    fn parse_tolerates_missing_and_unknown_fields() {
        let yaml = format!(
            "version: 2\nbinaries:\n- name: droot\n  checksum: {DROOT_SUM}\n  timestamp: \"20171017152508\"\n"
        );
        let meta = MetaDocument::from_yaml(yaml.as_bytes()).unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.binaries[0].mode, DEFAULT_MODE);
    }

    #[test]
    fn parse_rejects_malformed_checksum() {
        let yaml = "binaries:\n- name: droot\n  checksum: not-hex\n";
        assert!(MetaDocument::from_yaml(yaml.as_bytes()).is_err());
    }

    #[test]
    fn manifest_name_is_reserved() {
        let err = descriptor(MANIFEST_FILE_NAME, DROOT_SUM).validate_name().unwrap_err();
        assert!(matches!(err, MetaError::InvalidDescriptor { ref name, .. } if name == "meta.yml"));
        assert!(descriptor("meta.yml.bak", DROOT_SUM).validate_name().is_ok());
    }

    #[test]
    fn append_keeps_order() {
        let mut meta = MetaDocument::new(vec![descriptor("droot", DROOT_SUM)]);
        meta.append(vec![descriptor("grabeni", GRABENI_SUM)]);
        assert_eq!(meta.names().collect::<Vec<_>>(), vec!["droot", "grabeni"]);
    }

    #[test]
    fn identical_checksums_match() {
        let latest = MetaDocument::new(vec![
            descriptor("droot", DROOT_SUM),
            descriptor("grabeni", GRABENI_SUM),
        ]);
        let pushed = MetaDocument::new(vec![
            descriptor("grabeni", GRABENI_SUM),
            descriptor("droot", DROOT_SUM),
        ]);
        assert!(pushed.matches_checksums_of(&latest));
    }

    #[test]
    fn one_changed_checksum_does_not_match() {
        let latest = MetaDocument::new(vec![
            descriptor("droot", "0000000009e0e4797bde75afbfe962e0db81c530b5bb1cfd2cbe0e2fc2000000"),
            descriptor("grabeni", GRABENI_SUM),
        ]);
        let pushed = MetaDocument::new(vec![
            descriptor("droot", DROOT_SUM),
            descriptor("grabeni", GRABENI_SUM),
        ]);
        assert!(!pushed.matches_checksums_of(&latest));
    }

    #[test]
    fn new_binary_does_not_match() {
        let latest = MetaDocument::new(vec![descriptor("droot", DROOT_SUM)]);
        let pushed = MetaDocument::new(vec![
            descriptor("droot", DROOT_SUM),
            descriptor("grabeni", GRABENI_SUM),
        ]);
        assert!(!pushed.matches_checksums_of(&latest));
        assert!(!MetaDocument::default().matches_checksums_of(&latest));
    }

    #[test]
    fn unsafe_names_are_rejected() {
        for bad in ["", "../etc/passwd", "a/b", "..", "."] {
            assert!(descriptor(bad, DROOT_SUM).validate_name().is_err(), "{bad:?}");
        }
        assert!(descriptor("droot", DROOT_SUM).validate_name().is_ok());
    }
}
