use super::OperationLog;
use crate::errors::{MergeNotPossibleSnafu, NonMatchingLogIdsSnafu, Result};
use opsync_data_types::Snapshot;
use snafu::ensure;
use std::{cmp, fmt};

impl<L, A, S> OperationLog<L, A, S>
where
    L: Clone + PartialEq + fmt::Debug,
    A: Ord + Clone,
    S: Snapshot,
{
    /// Merge another replica of the same logical log into this one.
    ///
    /// When both replicas fold onto the same baseline this is a plain
    /// [[OperationLog::insert]] of the peer's operations. When the baselines
    /// differ, one replica has compacted history the other still carries; the
    /// less-compacted side's hash chain is walked (on a working copy) to find
    /// the more-compacted side's baseline. If it is found there, the
    /// histories agree and the merge proceeds; if not, the replicas compacted
    /// along different paths and the merge fails.
    ///
    /// Merging is commutative in effect: after `a.merge(b)` and `b.merge(a)`
    /// both replicas hold identical operation sequences and snapshots.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        ensure!(
            self.log_id == other.log_id,
            NonMatchingLogIdsSnafu {
                local: format!("{:?}", self.log_id),
                remote: format!("{:?}", other.log_id),
            }
        );

        if self.baseline.hash() == other.baseline.hash() {
            return self.insert(other.operations.to_vec());
        }

        tracing::debug!(
            local = %self.baseline.hash(),
            remote = %other.baseline.hash(),
            "aligning divergent baselines"
        );
        match self
            .initial_summary
            .latest_clock()
            .total_cmp(other.initial_summary.latest_clock())
        {
            cmp::Ordering::Greater => {
                // We compacted further. Roll the peer's working copy forward
                // to our baseline; what remains is exactly what we lack.
                let mut working = other.clone();
                working.reduce_until_hash(*self.baseline.hash()).map_err(|_| {
                    MergeNotPossibleSnafu {
                        context: "the remote history does not reach the local baseline",
                    }
                    .build()
                })?;
                self.insert(std::mem::take(&mut working.operations))
            }
            cmp::Ordering::Less => {
                // The peer compacted further. Its baseline must lie on our
                // chain; we keep our own operations and only take its tail.
                let mut probe = self.clone();
                probe.reduce_until_hash(*other.baseline.hash()).map_err(|_| {
                    MergeNotPossibleSnafu {
                        context: "the local history does not reach the remote baseline",
                    }
                    .build()
                })?;
                self.insert(other.operations.to_vec())
            }
            cmp::Ordering::Equal => MergeNotPossibleSnafu {
                context: "baselines diverged at the same clock",
            }
            .fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{TestLog, append_chars, assert_consistent, test_log};
    use crate::LogError;
    use opsync_data_types::text::CharStringOperation;

    /// Convergence in the sense of the log: identical sequences, snapshots,
    /// baselines, and summaries. The replicas' own actor ids and the
    /// tie-break tag of the summary clock may legitimately differ.
    fn assert_converged(left: &TestLog, right: &TestLog) {
        let left_ids: Vec<_> = left.operations().iter().map(|op| op.id()).collect();
        let right_ids: Vec<_> = right.operations().iter().map(|op| op.id()).collect();
        assert_eq!(left_ids, right_ids);

        assert_eq!(left.snapshot(), right.snapshot());
        assert_eq!(left.baseline().hash(), right.baseline().hash());
        assert_eq!(
            left.summary().operation_count(),
            right.summary().operation_count()
        );
        let left_actors: Vec<_> = left.summary().actors().collect();
        let right_actors: Vec<_> = right.summary().actors().collect();
        assert_eq!(left_actors, right_actors);
        assert!(
            left.summary()
                .latest_clock()
                .counters()
                .eq(right.summary().latest_clock().counters())
        );

        assert_consistent(left);
        assert_consistent(right);
    }

    #[test]
    fn merge_requires_matching_log_ids() {
        let mut left = test_log("1", "a");
        let right = test_log("2", "b");
        assert!(matches!(
            left.merge(&right),
            Err(LogError::NonMatchingLogIds { .. })
        ));
    }

    #[test]
    fn merge_combines_concurrent_histories() {
        let mut left = test_log("1", "a");
        let mut right = test_log("1", "b");

        append_chars(&mut left, "ABC");
        append_chars(&mut right, "D");

        right.merge(&left).unwrap();
        assert_eq!(right.snapshot().as_str(), "ABCD");

        left.merge(&right).unwrap();
        assert_converged(&left, &right);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut left = test_log("1", "a");
        let mut right = test_log("1", "b");
        append_chars(&mut left, "AB");
        append_chars(&mut right, "C");

        left.merge(&right).unwrap();
        let ids: Vec<_> = left.operations().iter().map(|op| op.id()).collect();
        let snapshot = left.snapshot().clone();

        // Merging the same peer again changes nothing.
        left.merge(&right).unwrap();
        assert_eq!(
            left.operations().iter().map(|op| op.id()).collect::<Vec<_>>(),
            ids
        );
        assert_eq!(left.snapshot(), &snapshot);

        // Self-merge is a no-op as well.
        let self_copy = left.clone();
        left.merge(&self_copy).unwrap();
        assert_eq!(
            left.operations().iter().map(|op| op.id()).collect::<Vec<_>>(),
            ids
        );
        assert_consistent(&left);
    }

    #[test]
    fn interleaved_appends_and_merges_converge() {
        let mut left = test_log("1", "a");
        let mut right = test_log("1", "b");

        append_chars(&mut left, "ABC");
        append_chars(&mut right, "D");
        right.merge(&left).unwrap();
        left.merge(&right).unwrap();
        assert_eq!(left.snapshot().as_str(), "ABCD");

        append_chars(&mut left, "EF");
        append_chars(&mut right, "GH");
        left.merge(&right).unwrap();
        right.merge(&left).unwrap();
        assert_eq!(left.snapshot().as_str(), "ABCDEFGH");

        append_chars(&mut left, "I");
        append_chars(&mut right, "J");
        left.merge(&right).unwrap();
        right.merge(&left).unwrap();

        assert_eq!(left.snapshot().as_str(), "ABCDEFGHIJ");
        assert_converged(&left, &right);
    }

    #[test]
    fn merge_after_one_side_reduced() {
        let mut reduced = test_log("1", "a");
        append_chars(&mut reduced, "AB");

        let mut peer = test_log("1", "b");
        peer.insert(reduced.operations().to_vec()).unwrap();

        peer.append(CharStringOperation::Append('X'));
        reduced.append(CharStringOperation::Append('C'));

        // Compact 'A' and 'B' away; only 'C' remains explicit.
        let cutoff = reduced.operations()[1].id();
        reduced.reduce_until_operation(cutoff).unwrap();
        assert_eq!(reduced.operations().len(), 1);

        reduced.merge(&peer).unwrap();
        assert_eq!(reduced.snapshot().as_str(), "ABXC");

        peer.merge(&reduced).unwrap();
        assert_eq!(peer.snapshot().as_str(), "ABXC");
        assert_eq!(peer.operations().len(), 4);
        assert_consistent(&reduced);
        assert_consistent(&peer);
    }

    #[test]
    fn replicas_reduced_to_the_same_point_still_merge() {
        let mut left = test_log("1", "a");
        append_chars(&mut left, "AB");
        let mut right = test_log("1", "b");
        right.insert(left.operations().to_vec()).unwrap();

        let cutoff = left.operations()[0].id();
        left.reduce_until_operation(cutoff).unwrap();
        right.reduce_until_operation(cutoff).unwrap();
        assert_eq!(left.baseline().hash(), right.baseline().hash());

        append_chars(&mut left, "C");
        append_chars(&mut right, "D");
        left.merge(&right).unwrap();
        right.merge(&left).unwrap();
        assert_eq!(left.snapshot().as_str(), "ABCD");
        assert_converged(&left, &right);
    }

    #[test]
    fn divergent_compaction_paths_cannot_merge() {
        let mut left = test_log("1", "a");
        append_chars(&mut left, "AB");
        let mut right = test_log("1", "b");
        right.insert(left.operations().to_vec()).unwrap();

        // Each replica appends its own operation and compacts through it:
        // the chains now disagree past the shared prefix.
        append_chars(&mut left, "C");
        append_chars(&mut right, "D");
        let left_cutoff = left.operations()[2].id();
        let right_cutoff = right.operations()[2].id();
        left.reduce_until_operation(left_cutoff).unwrap();
        right.reduce_until_operation(right_cutoff).unwrap();

        assert!(matches!(
            left.merge(&right),
            Err(LogError::MergeNotPossible { .. })
        ));
        assert!(matches!(
            right.merge(&left),
            Err(LogError::MergeNotPossible { .. })
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Step {
            AppendLeft(char),
            AppendRight(char),
            MergeIntoLeft,
            MergeIntoRight,
        }

        fn step_strategy() -> impl Strategy<Value = Step> {
            prop_oneof![
                proptest::char::range('a', 'h').prop_map(Step::AppendLeft),
                proptest::char::range('a', 'h').prop_map(Step::AppendRight),
                Just(Step::MergeIntoLeft),
                Just(Step::MergeIntoRight),
            ]
        }

        proptest! {
            /// However appends and merges interleave, a final mutual merge
            /// always converges both replicas.
            #[test]
            fn random_histories_converge(
                steps in prop::collection::vec(step_strategy(), 0..30),
            ) {
                let mut left = test_log("1", "a");
                let mut right = test_log("1", "b");

                for step in steps {
                    match step {
                        Step::AppendLeft(c) => left.append(CharStringOperation::Append(c)),
                        Step::AppendRight(c) => right.append(CharStringOperation::Append(c)),
                        Step::MergeIntoLeft => left.merge(&right).unwrap(),
                        Step::MergeIntoRight => right.merge(&left).unwrap(),
                    }
                }

                left.merge(&right).unwrap();
                right.merge(&left).unwrap();
                assert_converged(&left, &right);
            }
        }
    }
}
