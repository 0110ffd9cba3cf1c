//! Object store backends for binrep.
//!
//! The release engine never talks to a concrete storage service. It consumes
//! the [`ObjectStore`] trait: a flat key space with prefix + delimiter
//! listing, whole-object get/put/delete and streaming upload/download. The
//! backend is built once and injected into each engine, never reached
//! through global state.
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- `BTreeMap`-based store for tests and
//!   embedding, with configurable page size and fault injection
//! - [`FsObjectStore`] -- keys mapped to files under a local directory
//!
//! # Design Rules
//!
//! 1. Keys are `/`-separated and never start with `/`.
//! 2. Listing follows S3 semantics: keys are returned in lexicographic
//!    order, keys sharing a delimiter-terminated segment after the prefix
//!    collapse into one common prefix, and at most one page is returned.
//! 3. Deleting a missing key succeeds.
//! 4. Puts are independent; there are no multi-object transactions.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::{ObjectReader, ObjectStore};
pub use types::{Listing, DEFAULT_MAX_KEYS};
