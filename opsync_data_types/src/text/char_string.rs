use crate::{Operation, Outcome, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A text value edited one character at a time, from the end.
///
/// The two operations are deliberately minimal but exercise every
/// [[Outcome]] variant: appending always succeeds in full, while removal can
/// skip (empty string) or apply partially (the removed character was not the
/// expected one).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharString {
    content: String,
}

impl CharString {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Display for CharString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// Edits accepted by [[CharString]].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharStringOperation {
    /// Append one character at the end.
    Append(char),
    /// Remove the last character, which is expected to be the given one.
    ///
    /// The expectation exists so the operation is self-describing as the
    /// inverse of an [[CharStringOperation::Append]]; a mismatch still
    /// removes, but reports a partial application.
    RemoveLast(char),
}

impl Operation for CharStringOperation {
    fn description(&self) -> Option<String> {
        match self {
            CharStringOperation::Append(c) => Some(format!("append '{c}'")),
            CharStringOperation::RemoveLast(c) => Some(format!("remove last '{c}'")),
        }
    }
}

impl Snapshot for CharString {
    type Op = CharStringOperation;

    fn empty() -> Self {
        Self::default()
    }

    fn apply(&self, operation: &Self::Op) -> (Self, Outcome<Self::Op>) {
        match operation {
            CharStringOperation::Append(c) => {
                let mut content = self.content.clone();
                content.push(*c);
                (
                    Self { content },
                    Outcome::Full {
                        undo: CharStringOperation::RemoveLast(*c),
                    },
                )
            }
            CharStringOperation::RemoveLast(expected) => {
                let mut content = self.content.clone();
                match content.pop() {
                    None => (
                        self.clone(),
                        Outcome::Skipped {
                            reason: "cannot remove from an empty string".to_owned(),
                        },
                    ),
                    Some(removed) if removed == *expected => (
                        Self { content },
                        Outcome::Full {
                            undo: CharStringOperation::Append(removed),
                        },
                    ),
                    Some(removed) => (
                        Self { content },
                        Outcome::Partial {
                            undo: CharStringOperation::Append(removed),
                            reason: format!("removed '{removed}' instead of '{expected}'"),
                        },
                    ),
                }
            }
        }
    }
}
