/// Errors from checksum parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid checksum {value:?}: {reason}")]
    InvalidChecksum { value: String, reason: String },
}
