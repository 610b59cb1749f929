use super::OperationLog;
use crate::errors::{MergeNotPossibleSnafu, Result};
use crate::logged_operation::LoggedOperation;
use opsync_data_types::Snapshot;
use snafu::ensure;
use std::cmp;

impl<L, A, S> OperationLog<L, A, S>
where
    A: Ord + Clone,
    S: Snapshot,
{
    /// Merge a batch of remote operations into the local sequence.
    ///
    /// Duplicates (operations the log already holds) are suppressed; the rest
    /// are placed at their total-order position. If anything was actually new
    /// the derived state is rebuilt from the baseline, so undo history then
    /// covers the merged sequence.
    ///
    /// Fails with [[LogError::MergeNotPossible]](crate::LogError) when the
    /// batch reaches at or below the local baseline clock: that history has
    /// been compacted away here and can no longer be ordered against.
    pub fn insert(&mut self, mut incoming: Vec<LoggedOperation<A, S::Op>>) -> Result<()> {
        if incoming.is_empty() {
            return Ok(());
        }
        incoming.sort_by(|left, right| right.total_cmp(left));

        if let (Some(baseline_clock), Some(earliest)) =
            (self.baseline.clock(), incoming.last())
        {
            ensure!(
                earliest.clock().total_cmp(baseline_clock) == cmp::Ordering::Greater,
                MergeNotPossibleSnafu {
                    context: "incoming operations predate the local baseline",
                }
            );
        }
        if let Some(latest) = incoming.first() {
            self.clock_provider.merge(latest.clock());
        }

        let count_before = self.operations.len();
        let incoming_count = incoming.len();
        if self.operations.is_empty() {
            incoming.reverse();
            self.operations = incoming;
        } else {
            // The incoming batch is walked newest-first while the search
            // cursor only ever moves left: each next operation sorts at or
            // below the previous one's slot, so earlier positions never need
            // to be revisited.
            let mut search_start = self.operations.len() - 1;
            'incoming: for operation in incoming {
                let mut index = search_start;
                loop {
                    if self.operations[index].id() == operation.id() {
                        // Already present; nothing to insert.
                        search_start = index;
                        continue 'incoming;
                    }
                    if self.operations[index].total_cmp(&operation) == cmp::Ordering::Less {
                        self.operations.insert(index + 1, operation);
                        search_start = index;
                        continue 'incoming;
                    }
                    if index == 0 {
                        self.operations.insert(0, operation);
                        search_start = 0;
                        continue 'incoming;
                    }
                    index -= 1;
                }
            }
        }

        let inserted = self.operations.len() - count_before;
        tracing::debug!(
            inserted,
            duplicates = incoming_count - inserted,
            total = self.operations.len(),
            "merged remote operations"
        );
        if inserted == 0 {
            // Everything was a duplicate; derived state is untouched.
            return Ok(());
        }
        self.recompute_from_baseline();
        Ok(())
    }
}
