#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]

//! Value types that an operation log can fold.
//!
//! The log itself is generic: it stores anything that implements
//! [[Operation]] and folds it over anything that implements [[Snapshot]].
//! This crate defines those two interfaces plus some ready-made
//! implementations ([[text::CharString]], [[register::ValueRegister]]).

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

pub mod register;
pub mod text;

/// A single user-level edit that can be folded into a [[Snapshot]].
///
/// Operations are plain immutable values: once constructed nothing mutates
/// them, they are only copied, serialized, and replayed. Serialization goes
/// through serde, so replicas exchange operations without knowing their
/// concrete type layout.
pub trait Operation:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + 'static
{
    /// A short human-readable description, e.g. for history views.
    fn description(&self) -> Option<String> {
        None
    }
}

/// The state derived by folding [[Operation]]s over some starting value.
///
/// Implementations must have value semantics: [[Snapshot::apply]] is a pure
/// function from `(state, operation)` to `(state, outcome)` and must be
/// deterministic, since replicas rely on replaying the same operations to
/// reach the same state. The undo operation reported in a non-skipped
/// [[Outcome]] must restore the pre-`apply` state when applied to the
/// post-`apply` state; the log's undo support is built entirely on that
/// contract.
pub trait Snapshot:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + 'static
{
    type Op: Operation;

    /// The canonical starting state for a fresh log.
    fn empty() -> Self;

    /// Fold one operation, returning the new state and what happened.
    #[must_use]
    fn apply(&self, operation: &Self::Op) -> (Self, Outcome<Self::Op>);
}

/// What happened when a snapshot tried to apply an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<Op> {
    /// The operation applied exactly as stated.
    Full { undo: Op },
    /// The operation applied, but not exactly as stated.
    Partial { undo: Op, reason: String },
    /// The operation did not change the state at all.
    Skipped { reason: String },
}
impl<Op> Outcome<Op> {
    /// The operation that would revert this application, if it changed anything.
    pub fn undo_operation(&self) -> Option<&Op> {
        match self {
            Outcome::Full { undo } | Outcome::Partial { undo, .. } => Some(undo),
            Outcome::Skipped { .. } => None,
        }
    }

    pub const fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }
}
