#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]

//! A totally-ordered, mergeable log of operations.
//!
//! An [[OperationLog]] is a value-type CRDT: independent replicas append
//! locally, exchange serialized copies, and merge deterministically. After any
//! two replicas have merged each other they hold identical operation
//! sequences and identical derived snapshots, regardless of merge order.
//!
//! Ordering is provided by the vector clocks of
//! [`opsync_core::clocks`]; the folded state by any
//! [`opsync_data_types::Snapshot`] implementation.

mod baseline;
mod codec;
mod errors;
mod log;
mod logged_operation;
mod summary;

pub use baseline::{Baseline, ChainHash};
pub use errors::LogError;
pub use log::{OperationLog, RevertOp};
pub use logged_operation::LoggedOperation;
pub use summary::{AppliedOperation, ApplyKind, Summary};
