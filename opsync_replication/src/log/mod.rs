mod insert;
mod merge;
mod reduce;

use crate::baseline::Baseline;
use crate::errors::{CorruptLogSnafu, Result};
use crate::logged_operation::LoggedOperation;
use crate::summary::{ApplyKind, Summary};
use opsync_core::clocks::{ClockProvider, TimestampStrategy};
use opsync_data_types::Snapshot;
use snafu::ensure;
use std::cmp;
use uuid::Uuid;

/// An entry of the undo/redo stacks: the operation that would revert one
/// previously applied log entry.
///
/// This is a plain operation, not a [[LoggedOperation]]: it has not been
/// clocked yet and is not part of the log. Actually undoing appends it like
/// any other operation, so peers see undos as ordinary log entries.
#[derive(Clone, Debug, PartialEq)]
pub struct RevertOp<O> {
    /// The log entry this operation reverts.
    pub reverting: Uuid,
    pub operation: O,
}

/// A totally-ordered sequence of operations authored by multiple independent
/// actors, together with the state obtained by folding them over a baseline.
///
/// The log is a value, not a shared concurrent object: replicas are
/// independent copies that append locally and reconcile via
/// [[OperationLog::merge]] or [[OperationLog::insert]]. All derived state
/// (snapshot, summary, undo/redo stacks) is recomputed from the baseline
/// whenever remote operations change the sequence, so it is always exactly
/// the fold of the operation sequence in total order.
///
/// Mutations either succeed or leave the log untouched; there are no partial
/// failure states.
#[derive(Clone, Debug)]
pub struct OperationLog<L, A, S>
where
    S: Snapshot,
{
    log_id: L,
    actor: A,
    baseline: Baseline<S, A>,
    initial_summary: Summary<A>,
    operations: Vec<LoggedOperation<A, S::Op>>,
    clock_provider: ClockProvider<A>,
    // Derived state below; always consistent with baseline + operations.
    snapshot: S,
    summary: Summary<A>,
    undo_stack: Vec<RevertOp<S::Op>>,
    redo_stack: Vec<RevertOp<S::Op>>,
}

impl<L, A, S> OperationLog<L, A, S>
where
    A: Ord + Clone,
    S: Snapshot,
{
    /// A fresh, empty log for the given logical identity and local actor.
    ///
    /// Uses wall-clock tie-breaking; see
    /// [[OperationLog::with_timestamp_strategy]] for the alternatives.
    pub fn new(log_id: L, actor: A) -> Self {
        Self::with_timestamp_strategy(log_id, actor, TimestampStrategy::UnixTime)
    }

    /// A fresh, empty log whose clocks use the given timestamp strategy.
    ///
    /// All replicas of one logical log must agree on the strategy.
    pub fn with_timestamp_strategy(log_id: L, actor: A, strategy: TimestampStrategy) -> Self {
        let initial_summary = Summary::new(actor.clone(), strategy);
        Self {
            log_id,
            baseline: Baseline::initial(),
            snapshot: S::empty(),
            summary: initial_summary.clone(),
            initial_summary,
            operations: Vec::new(),
            clock_provider: ClockProvider::new(actor.clone(), strategy),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            actor,
        }
    }

    /// Rebuild a log from decoded container parts.
    ///
    /// The container stores operations in total order and the summary as it
    /// was at the baseline; everything else is derived here by replaying.
    pub(crate) fn from_container_parts(
        log_id: L,
        actor: A,
        baseline: Baseline<S, A>,
        initial_summary: Summary<A>,
        operations: Vec<LoggedOperation<A, S::Op>>,
    ) -> Result<Self> {
        ensure!(
            operations
                .windows(2)
                .all(|pair| pair[0].total_cmp(&pair[1]) == cmp::Ordering::Less),
            CorruptLogSnafu {
                context: "operations are not strictly ascending",
            }
        );
        if let (Some(first), Some(baseline_clock)) = (operations.first(), baseline.clock()) {
            ensure!(
                first.clock().total_cmp(baseline_clock) == cmp::Ordering::Greater,
                CorruptLogSnafu {
                    context: "operations do not start after the baseline clock",
                }
            );
        }

        let seed = operations
            .last()
            .map(|operation| operation.clock().clone())
            .or_else(|| baseline.clock().cloned());
        let clock_provider = match seed {
            Some(clock) => ClockProvider::seeded(actor.clone(), clock),
            None => ClockProvider::new(actor.clone(), initial_summary.latest_clock().strategy()),
        };

        let mut log = Self {
            log_id,
            snapshot: baseline.snapshot().clone(),
            summary: initial_summary.clone(),
            baseline,
            initial_summary,
            operations,
            clock_provider,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            actor,
        };
        log.recompute_from_baseline();
        Ok(log)
    }

    pub fn log_id(&self) -> &L {
        &self.log_id
    }

    pub fn actor_id(&self) -> &A {
        &self.actor
    }

    /// The current folded state.
    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    /// Metadata over everything this log has ever folded.
    pub fn summary(&self) -> &Summary<A> {
        &self.summary
    }

    /// The summary as it was at the baseline, i.e. covering only compacted
    /// history.
    pub fn initial_summary(&self) -> &Summary<A> {
        &self.initial_summary
    }

    pub fn baseline(&self) -> &Baseline<S, A> {
        &self.baseline
    }

    /// The operation sequence, strictly ascending in total order.
    pub fn operations(&self) -> &[LoggedOperation<A, S::Op>] {
        &self.operations
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Append a locally authored operation.
    ///
    /// This cannot fail: an operation the snapshot cannot apply is still
    /// logged, with the refusal recorded in the summary.
    pub fn append(&mut self, operation: S::Op) {
        if let Some(revert) = self.mint_and_apply(operation) {
            self.undo_stack.push(revert);
        }
        // A fresh append invalidates any pending redos.
        self.redo_stack.clear();
    }

    /// Append the inverse of the most recent undoable entry.
    ///
    /// The undo is an ordinary new log entry with a fresh clock; peers see it
    /// like any other operation. Returns `false` (and does nothing) when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop() else {
            return false;
        };
        if let Some(revert) = self.mint_and_apply(entry.operation) {
            self.redo_stack.push(revert);
        }
        true
    }

    /// Append the inverse of the most recent undo.
    ///
    /// Returns `false` (and does nothing) when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.redo_stack.pop() else {
            return false;
        };
        if let Some(revert) = self.mint_and_apply(entry.operation) {
            self.undo_stack.push(revert);
        }
        true
    }

    /// Mint a clock, wrap `operation`, fold it into the live state, and
    /// record it; the returned entry reverts it, unless it was skipped.
    ///
    /// The freshly minted clock is strictly greatest, so pushing at the end
    /// keeps the sequence sorted.
    fn mint_and_apply(&mut self, operation: S::Op) -> Option<RevertOp<S::Op>> {
        let clock = self.clock_provider.next();
        let logged = LoggedOperation::new(self.actor.clone(), clock, operation);

        let (next, outcome) = self.snapshot.apply(logged.operation());
        self.summary.record(&logged, ApplyKind::of(&outcome));
        self.snapshot = next;
        let revert = outcome.undo_operation().map(|undo| RevertOp {
            reverting: logged.id(),
            operation: undo.clone(),
        });

        tracing::trace!(
            operations = self.operations.len() + 1,
            skipped = revert.is_none(),
            "appended operation"
        );
        self.operations.push(logged);
        revert
    }

    /// Rebuild all derived state by folding the operation sequence over the
    /// baseline.
    ///
    /// The undo stack afterwards covers every non-skipped operation since the
    /// baseline, in apply order; the redo stack is gone, since the sequence
    /// it referred to no longer exists.
    pub(crate) fn recompute_from_baseline(&mut self) {
        self.snapshot = self.baseline.snapshot().clone();
        self.summary = self.initial_summary.clone();
        self.undo_stack.clear();
        self.redo_stack.clear();

        for operation in &self.operations {
            let (next, outcome) = self.snapshot.apply(operation.operation());
            self.summary.record(operation, ApplyKind::of(&outcome));
            self.snapshot = next;
            if let Some(undo) = outcome.undo_operation() {
                self.undo_stack.push(RevertOp {
                    reverting: operation.id(),
                    operation: undo.clone(),
                });
            }
        }
    }
}
