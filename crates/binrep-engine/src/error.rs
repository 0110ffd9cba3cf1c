use binrep_crypto::Checksum;
use binrep_meta::MetaError;
use binrep_store::StoreError;
use binrep_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A name, timestamp or manifest does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A source binary could not be read while building the manifest.
    #[error("checksum error for {name}: {reason}")]
    ChecksumError { name: String, reason: String },

    /// A downloaded binary does not hash to the checksum in its manifest.
    #[error("checksum mismatch for {name} ({key}): expected {expected}, observed {observed}")]
    ChecksumMismatch {
        name: String,
        key: String,
        expected: Checksum,
        observed: Checksum,
    },

    /// Storage or transport fault.
    #[error("backend error on {key}: {source}")]
    Backend { key: String, source: StoreError },

    /// A stored manifest could not be decoded.
    #[error("invalid manifest {key}: {reason}")]
    InvalidManifest { key: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Wrap a store failure on `key`. A missing object becomes `NotFound`.
    pub fn backend(key: impl Into<String>, source: StoreError) -> Self {
        let key = key.into();
        match source {
            StoreError::NotFound { .. } => Self::NotFound { what: key },
            source => Self::Backend { key, source },
        }
    }

    /// Wrap a failure to encode or decode the manifest stored at `key`.
    pub fn manifest(key: impl Into<String>, source: MetaError) -> Self {
        match source {
            MetaError::Serialization(reason) => Self::InvalidManifest {
                key: key.into(),
                reason,
            },
            source => source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<TypeError> for EngineError {
    fn from(e: TypeError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<MetaError> for EngineError {
    fn from(e: MetaError) -> Self {
        match e {
            MetaError::Checksum { name, reason } => Self::ChecksumError { name, reason },
            MetaError::InvalidDescriptor { .. } => Self::InvalidArgument(e.to_string()),
            MetaError::Serialization(reason) => Self::InvalidManifest {
                key: String::new(),
                reason,
            },
            MetaError::Io(e) => Self::Io(e),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_errors_name_their_key() {
        let err = EngineError::manifest(
            "org/proj/20210101000000/meta.yml",
            MetaError::Serialization("bad yaml".into()),
        );
        assert!(matches!(
            err,
            EngineError::InvalidManifest { ref key, ref reason }
                if key == "org/proj/20210101000000/meta.yml" && reason == "bad yaml"
        ));
        assert_eq!(
            err.to_string(),
            "invalid manifest org/proj/20210101000000/meta.yml: bad yaml"
        );
    }

    #[test]
    fn manifest_keeps_other_meta_errors() {
        let err = EngineError::manifest(
            "org/proj/20210101000000/meta.yml",
            MetaError::Checksum {
                name: "tool".into(),
                reason: "closed".into(),
            },
        );
        assert!(matches!(err, EngineError::ChecksumError { ref name, .. } if name == "tool"));
    }

    #[test]
    fn missing_object_becomes_not_found() {
        let err = EngineError::backend(
            "org/proj/20210101000000/tool",
            StoreError::NotFound {
                key: "org/proj/20210101000000/tool".into(),
            },
        );
        assert!(err.is_not_found());
    }
}
