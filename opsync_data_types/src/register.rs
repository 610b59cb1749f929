//! A single-slot register where the most recently folded assignment wins.

use crate::{Operation, Outcome, Snapshot};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

/// Holds exactly one value; every applied [[SetValue]] replaces it.
///
/// Which assignment ends up visible is decided entirely by the order in which
/// the owning log folds the operations, so all replicas converge on the same
/// winner without the register itself resolving conflicts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRegister<T> {
    value: T,
}

impl<T> ValueRegister<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Replaces the register's value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetValue<T> {
    pub value: T,
}

impl<T> Operation for SetValue<T>
where
    T: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + 'static,
{
    fn description(&self) -> Option<String> {
        Some(format!("set value to {:?}", self.value))
    }
}

impl<T> Snapshot for ValueRegister<T>
where
    T: Clone + fmt::Debug + PartialEq + Default + Serialize + DeserializeOwned + 'static,
{
    type Op = SetValue<T>;

    fn empty() -> Self {
        Self::default()
    }

    fn apply(&self, operation: &Self::Op) -> (Self, Outcome<Self::Op>) {
        let next = Self {
            value: operation.value.clone(),
        };
        let undo = SetValue {
            value: self.value.clone(),
        };
        (next, Outcome::Full { undo })
    }
}
