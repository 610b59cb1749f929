use crate::logged_operation::LoggedOperation;
use opsync_core::clocks::{TimestampStrategy, VectorClock};
use opsync_data_types::Outcome;
use std::{collections::BTreeSet, fmt};
use uuid::Uuid;

/// How a single operation affected the snapshot when it was folded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyKind {
    Full,
    Partial { reason: String },
    Skipped { reason: String },
}
impl ApplyKind {
    /// The classification of an [[Outcome]], without the undo payload.
    pub fn of<Op>(outcome: &Outcome<Op>) -> Self {
        match outcome {
            Outcome::Full { .. } => ApplyKind::Full,
            Outcome::Partial { reason, .. } => ApplyKind::Partial {
                reason: reason.clone(),
            },
            Outcome::Skipped { reason } => ApplyKind::Skipped {
                reason: reason.clone(),
            },
        }
    }

    pub const fn is_skipped(&self) -> bool {
        matches!(self, ApplyKind::Skipped { .. })
    }
}

impl fmt::Display for ApplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyKind::Full => write!(f, "full"),
            ApplyKind::Partial { reason } => write!(f, "partial ({reason})"),
            ApplyKind::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// One folded operation as recorded in a [[Summary]].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedOperation<A> {
    pub id: Uuid,
    /// Position in the overall fold, counted from the very first operation
    /// the log ever folded (compacted ones included).
    pub index: u64,
    pub actor: A,
    pub kind: ApplyKind,
}

/// Accumulated metadata about everything a log has folded so far.
///
/// A summary never forgets: compaction moves operations out of the log, but
/// their apply records stay in the baseline summary the log keeps folding
/// onto.
#[derive(Clone, Debug)]
pub struct Summary<A> {
    actors: BTreeSet<A>,
    latest_clock: VectorClock<A>,
    operation_count: u64,
    operation_infos: Vec<AppliedOperation<A>>,
}

impl<A> PartialEq for Summary<A>
where
    A: Ord + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.actors == other.actors
            && self.latest_clock == other.latest_clock
            && self.operation_count == other.operation_count
            && self.operation_infos == other.operation_infos
    }
}

impl<A> Summary<A>
where
    A: Ord + Clone,
{
    /// The summary of a fresh log: one known actor, nothing folded yet.
    pub fn new(actor: A, strategy: TimestampStrategy) -> Self {
        let mut actors = BTreeSet::new();
        actors.insert(actor.clone());
        Self {
            actors,
            latest_clock: VectorClock::new(actor, strategy),
            operation_count: 0,
            operation_infos: Vec::new(),
        }
    }

    /// Rebuild a summary from its parts, e.g. when loading from storage.
    pub fn from_parts(
        actors: impl IntoIterator<Item = A>,
        latest_clock: VectorClock<A>,
        operation_count: u64,
        operation_infos: Vec<AppliedOperation<A>>,
    ) -> Self {
        Self {
            actors: actors.into_iter().collect(),
            latest_clock,
            operation_count,
            operation_infos,
        }
    }

    /// Every actor that has ever authored a folded operation (plus the local
    /// one).
    pub fn actors(&self) -> impl Iterator<Item = &A> {
        self.actors.iter()
    }

    pub fn contains_actor(&self, actor: &A) -> bool {
        self.actors.contains(actor)
    }

    /// The merge of all folded operation clocks.
    pub fn latest_clock(&self) -> &VectorClock<A> {
        &self.latest_clock
    }

    pub fn operation_count(&self) -> u64 {
        self.operation_count
    }

    pub fn operation_infos(&self) -> &[AppliedOperation<A>] {
        &self.operation_infos
    }

    /// Record the application of one operation.
    pub(crate) fn record<O>(&mut self, operation: &LoggedOperation<A, O>, kind: ApplyKind) {
        self.actors.insert(operation.actor().clone());
        self.latest_clock = self.latest_clock.merged(operation.clock());
        self.operation_infos.push(AppliedOperation {
            id: operation.id(),
            index: self.operation_count,
            actor: operation.actor().clone(),
            kind,
        });
        self.operation_count += 1;
    }
}

impl<A> fmt::Display for Summary<A>
where
    A: Ord + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} operations by {} actors, latest at {}",
            self.operation_count,
            self.actors.len(),
            self.latest_clock
        )
    }
}
