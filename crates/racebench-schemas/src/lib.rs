//! Schema definitions shared across the racebench pipeline.
//!
//! This crate contains the data structures that define racebench's
//! configuration, run-record, and persisted-store formats. Configuration and
//! report manifests are JSON documents; the result store is a typed CSV
//! whose column layout is fixed by a [`StoreSchema`] for the lifetime of one
//! store file.
//!
//! Keeping the schemas in one crate guarantees consistent contracts between
//! collection (`racebench-harness`) and analysis (`racebench-report`).

mod config;
mod manifest;
mod record;

#[doc(inline)]
pub use config::*;
#[doc(inline)]
pub use manifest::*;
#[doc(inline)]
pub use record::*;
