/// Errors from building or decoding release manifests.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// A binary source could not be opened or read while checksumming.
    #[error("failed to checksum {name}: {reason}")]
    Checksum { name: String, reason: String },

    /// A descriptor is unusable (empty name, unsafe path, ...).
    #[error("invalid binary descriptor {name:?}: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// The manifest could not be encoded or decoded.
    #[error("manifest serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for MetaError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for manifest operations.
pub type MetaResult<T> = Result<T, MetaError>;
