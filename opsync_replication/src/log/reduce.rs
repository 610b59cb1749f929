use super::OperationLog;
use crate::baseline::{Baseline, ChainHash};
use crate::errors::{ReduceNotPossibleSnafu, Result};
use crate::logged_operation::LoggedOperation;
use crate::summary::ApplyKind;
use opsync_data_types::Snapshot;
use uuid::Uuid;

impl<L, A, S> OperationLog<L, A, S>
where
    A: Ord + Clone,
    S: Snapshot,
{
    /// Compact every operation up to and including the one with `id` into the
    /// baseline.
    pub fn reduce_until_operation(&mut self, id: Uuid) -> Result<()> {
        self.reduce_where(|operation, _| operation.id() == id)
    }

    /// Compact until the running hash chain reaches `target`.
    ///
    /// This is how a replica re-aligns to a peer's compaction point: the
    /// target hash identifies a prefix of the shared history without naming
    /// its operations.
    pub fn reduce_until_hash(&mut self, target: ChainHash) -> Result<()> {
        self.reduce_where(|_, hash| *hash == target)
    }

    /// Compact the shortest operation prefix whose last element satisfies
    /// `cutoff`.
    ///
    /// Operations are folded in order into a candidate baseline; `cutoff`
    /// sees each operation together with the hash chain up to and including
    /// it. Once it holds, the folded prefix becomes the new baseline (its
    /// summary becomes the baseline summary, its last clock the baseline
    /// clock) and the derived state is rebuilt from there.
    ///
    /// Fails with [[LogError::ReduceNotPossible]](crate::LogError), leaving
    /// the log untouched, when no operation satisfies `cutoff`.
    pub fn reduce_where<F>(&mut self, mut cutoff: F) -> Result<()>
    where
        F: FnMut(&LoggedOperation<A, S::Op>, &ChainHash) -> bool,
    {
        let mut snapshot = self.baseline.snapshot().clone();
        let mut summary = self.initial_summary.clone();
        let mut hash = *self.baseline.hash();
        let mut last_clock = None;
        let mut cutoff_index = None;

        for (index, operation) in self.operations.iter().enumerate() {
            let (next, outcome) = snapshot.apply(operation.operation());
            summary.record(operation, ApplyKind::of(&outcome));
            snapshot = next;
            hash = hash.chained(operation.id());
            last_clock = Some(operation.clock().clone());
            if cutoff(operation, &hash) {
                cutoff_index = Some(index);
                break;
            }
        }

        let Some(cutoff_index) = cutoff_index else {
            return ReduceNotPossibleSnafu.fail();
        };

        tracing::debug!(
            compacted = cutoff_index + 1,
            remaining = self.operations.len() - cutoff_index - 1,
            baseline = %hash,
            "reduced operations into the baseline"
        );
        self.baseline = Baseline::from_parts(snapshot, hash, last_clock);
        self.initial_summary = summary;
        self.operations.drain(..=cutoff_index);
        self.recompute_from_baseline();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{append_chars, assert_consistent, test_log};
    use crate::{ChainHash, LogError};
    use opsync_data_types::text::CharStringOperation;
    use uuid::Uuid;

    #[test]
    fn reduce_everything_moves_the_state_into_the_baseline() {
        let mut log = test_log("1", "a");
        append_chars(&mut log, "ABC");
        let last_clock = log.operations()[2].clock().clone();
        let cutoff = log.operations()[2].id();

        log.reduce_until_operation(cutoff).unwrap();

        assert!(log.operations().is_empty());
        assert_eq!(log.snapshot().as_str(), "ABC");
        assert_eq!(log.baseline().snapshot().as_str(), "ABC");
        assert_eq!(log.baseline().clock(), Some(&last_clock));
        assert_ne!(*log.baseline().hash(), ChainHash::ZERO);
        // The fold history is preserved in the baseline summary.
        assert_eq!(log.initial_summary().operation_count(), 3);
        assert_eq!(log.summary().operation_count(), 3);
        // Compacted operations can no longer be undone.
        assert!(!log.can_undo());
        assert_consistent(&log);
    }

    #[test]
    fn reduce_to_a_mid_point_keeps_the_tail() {
        let mut log = test_log("1", "a");
        append_chars(&mut log, "ABC");
        let cutoff = log.operations()[1].id();

        log.reduce_until_operation(cutoff).unwrap();

        assert_eq!(log.operations().len(), 1);
        assert_eq!(log.snapshot().as_str(), "ABC");
        assert_eq!(log.baseline().snapshot().as_str(), "AB");
        assert_eq!(log.initial_summary().operation_count(), 2);
        assert_eq!(log.summary().operation_count(), 3);
        // The remaining operation is still undoable.
        assert!(log.undo());
        assert_eq!(log.snapshot().as_str(), "AB");
        assert_consistent(&log);
    }

    #[test]
    fn reduce_with_unmatched_cutoff_leaves_the_log_unchanged() {
        let mut log = test_log("1", "a");
        append_chars(&mut log, "AB");
        let snapshot = log.snapshot().clone();
        let hash = *log.baseline().hash();

        let result = log.reduce_until_operation(Uuid::new_v4());
        assert!(matches!(result, Err(LogError::ReduceNotPossible { .. })));
        assert_eq!(log.operations().len(), 2);
        assert_eq!(log.snapshot(), &snapshot);
        assert_eq!(*log.baseline().hash(), hash);
        assert_consistent(&log);
    }

    #[test]
    fn reduce_on_an_empty_log_is_not_possible() {
        let mut log = test_log("1", "a");
        assert!(matches!(
            log.reduce_until_hash(ChainHash::ZERO.chained(Uuid::new_v4())),
            Err(LogError::ReduceNotPossible { .. })
        ));
    }

    #[test]
    fn reduce_by_predicate_stops_at_the_first_match() {
        let mut log = test_log("1", "a");
        append_chars(&mut log, "ABCB");

        log.reduce_where(|operation, _| {
            matches!(operation.operation(), CharStringOperation::Append('B'))
        })
        .unwrap();

        // Cut at the first 'B'; the second one stays in the log.
        assert_eq!(log.baseline().snapshot().as_str(), "AB");
        assert_eq!(log.operations().len(), 2);
        assert_eq!(log.snapshot().as_str(), "ABCB");
        assert_consistent(&log);
    }

    #[test]
    fn equal_histories_reduce_to_equal_hashes() {
        let mut original = test_log("1", "a");
        append_chars(&mut original, "ABC");

        let mut replica = test_log("1", "b");
        replica.insert(original.operations().to_vec()).unwrap();

        let cutoff = original.operations()[1].id();
        original.reduce_until_operation(cutoff).unwrap();
        replica.reduce_until_operation(cutoff).unwrap();

        assert_eq!(original.baseline().hash(), replica.baseline().hash());
        assert_eq!(
            original.baseline().snapshot(),
            replica.baseline().snapshot()
        );
    }

    #[test]
    fn different_cutoffs_produce_different_hashes() {
        let mut log = test_log("1", "a");
        append_chars(&mut log, "AB");
        let mut further = test_log("1", "b");
        further.insert(log.operations().to_vec()).unwrap();

        log.reduce_until_operation(log.operations()[0].id()).unwrap();
        further
            .reduce_until_operation(further.operations()[1].id())
            .unwrap();
        assert_ne!(log.baseline().hash(), further.baseline().hash());
    }

    #[test]
    fn reduce_then_reduce_continues_the_chain() {
        let mut stepwise = test_log("1", "a");
        append_chars(&mut stepwise, "ABC");
        let mut oneshot = test_log("1", "b");
        oneshot.insert(stepwise.operations().to_vec()).unwrap();

        let first = stepwise.operations()[0].id();
        let last = stepwise.operations()[2].id();
        stepwise.reduce_until_operation(first).unwrap();
        stepwise.reduce_until_operation(last).unwrap();

        oneshot.reduce_until_operation(last).unwrap();
        // Two reductions chain to the same hash as one covering reduction.
        assert_eq!(stepwise.baseline().hash(), oneshot.baseline().hash());
    }
}
