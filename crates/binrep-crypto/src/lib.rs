//! Checksum primitives for binrep.
//!
//! A release manifest anchors the integrity of every binary with a
//! hex-encoded SHA-256 digest of its full contents. This crate computes
//! those digests either over in-memory bytes, over an async reader, or as a
//! side effect of writing (the hashing tee used on download).

pub mod checksum;
pub mod error;
pub mod hasher;

pub use checksum::Checksum;
pub use error::CryptoError;
pub use hasher::{digest_reader, ChecksumHasher, HashingWriter, DEFAULT_CHUNK_SIZE};
