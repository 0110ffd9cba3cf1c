//! Release manifest (`meta.yml`) model for binrep.
//!
//! Every release carries exactly one [`MetaDocument`]: an ordered list of
//! [`BinaryDescriptor`]s naming each binary, its SHA-256 checksum and its
//! POSIX mode bits. The manifest is the only integrity anchor of a release.
//!
//! # Wire format
//!
//! ```yaml
//! binaries:
//! - name: droot
//!   checksum: ec9efb6249e0e4797bde75afbfe962e0db81c530b5bb1cfd2cbe0e2fc2c8cf48
//!   mode: 493
//! ```
//!
//! Unknown fields are ignored and `mode` defaults to `0o755` when absent, so
//! manifests written by older releases keep loading.
//!
//! # Sources
//!
//! Building a manifest consumes each binary once to checksum it, and pushing
//! needs the bytes again for upload. [`BinarySource`] therefore hands out a
//! fresh reader on every [`BinarySource::open`] call instead of a single-use
//! stream.

pub mod error;
pub mod meta;
pub mod source;

pub use error::{MetaError, MetaResult};
pub use meta::{BinaryDescriptor, MetaDocument, DEFAULT_MODE};
pub use source::{BinarySource, BytesSource, FileSource, SourceReader};
