//! Foundation types for binrep.
//!
//! A binrep repository is a flat object store whose keys follow a fixed
//! layout:
//!
//! ```text
//! <name>/<timestamp>/meta.yml
//! <name>/<timestamp>/<binary-name>
//! ```
//!
//! where `<name>` is an arbitrary-depth slash path such as
//! `github.com/yuuki/droot` and `<timestamp>` is a 14-digit UTC
//! `YYYYMMDDHHMMSS` string. This crate owns that layout and nothing else:
//! every function here is pure.
//!
//! # Key Types
//!
//! - [`RepositoryName`] — slash-delimited artifact family name
//! - [`Timestamp`] — fixed-width UTC release timestamp
//! - [`KeyClass`] — classification of a listed key as a release boundary or
//!   a prefix to descend into

pub mod address;
pub mod error;
pub mod name;
pub mod timestamp;

pub use address::{
    classify_key, latest_of, manifest_key, object_key, parse_release_name, release_prefix,
    KeyClass, DELIMITER, MANIFEST_FILE_NAME,
};
pub use error::{TypeError, TypeResult};
pub use name::RepositoryName;
pub use timestamp::{Timestamp, TIMESTAMP_FORMAT, TIMESTAMP_LEN};
