//! Collection side of the racebench pipeline.
//!
//! Drives the external analyzer once per (trace, variant) pair, parses its
//! unstructured stdout into typed metrics through the extraction grammar,
//! and persists complete records into the append-only result store. The
//! whole pipeline is single-threaded and strictly sequential: one analyzer
//! invocation at a time, one store writer, reads only in a later disjoint
//! pass.

mod builder;
mod command;
mod error;
mod grammar;
mod store;

pub use builder::{analyzer_command, build_record};
pub use command::{run_build_commands, CommandOutput, CommandSpec};
pub use error::HarnessError;
pub use grammar::Grammar;
pub use store::{read_table, StoreWriter};
