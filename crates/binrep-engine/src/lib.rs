//! Release engine for binrep.
//!
//! A release is a set of binaries published together under
//! `<name>/<timestamp>/`, described by a `meta.yml` manifest that records
//! each binary's name, SHA-256 checksum and mode. This crate implements the
//! operations over that layout against any [`binrep_store::ObjectStore`].
//!
//! # Modules
//!
//! - [`transfer`] -- push with dedupe-skip, checksum-verified pull
//! - [`retention`] -- pruning to the newest K releases, release deletion
//! - [`walker`] -- concurrent discovery of releases at any key depth
//! - [`repository`] -- facade combining the above (push + prune, sync)
//! - [`throttle`] -- bandwidth-limited reader for downloads
//!
//! # Design Rules
//!
//! 1. The store is injected; nothing here holds a global handle.
//! 2. Manifests are written before payloads. A reader may briefly see a
//!    manifest whose binaries are not uploaded yet.
//! 3. A downloaded file whose checksum does not match is deleted before the
//!    error is returned.
//! 4. Only the first page of a listing is used; truncation is logged.

pub mod config;
pub mod error;
pub mod release;
pub mod repository;
pub mod retention;
pub mod throttle;
pub mod transfer;
pub mod walker;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use release::Release;
pub use repository::{PushReport, Repository, SyncReport};
pub use retention::RetentionEngine;
pub use throttle::ThrottledReader;
pub use transfer::{PushOptions, PushOutcome, TransferEngine};
pub use walker::{ReleaseVisitor, TreeWalker, WalkSummary};
