use opsync_core::clocks::{CausalOrd, CausalOrdering, VectorClock};
use std::{
    cmp, fmt,
    hash::{Hash, Hasher},
};
use uuid::Uuid;

/// An operation at the moment it entered a log: the payload together with the
/// clock it was minted under, its author, and a stable random identifier.
///
/// Once constructed a logged operation never changes; replicas pass copies of
/// it around verbatim.
///
/// Equality and hashing are keyed on the clock alone. Under the single-actor
/// [[ClockProvider]](opsync_core::clocks::ClockProvider) discipline no two
/// distinct operations can ever be minted with equal clocks, so an equal
/// clock means "the same operation seen via a different path", which is
/// exactly the notion duplicate suppression needs.
#[derive(Clone, Debug)]
pub struct LoggedOperation<A, O> {
    id: Uuid,
    actor: A,
    clock: VectorClock<A>,
    operation: O,
}

impl<A, O> LoggedOperation<A, O>
where
    A: Ord + Clone,
{
    /// Wrap a freshly minted operation under the given clock.
    pub fn new(actor: A, clock: VectorClock<A>, operation: O) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            clock,
            operation,
        }
    }

    /// Rebuild a logged operation from its parts, e.g. when loading from
    /// storage. The identifier is kept, not regenerated.
    pub fn from_parts(id: Uuid, actor: A, clock: VectorClock<A>, operation: O) -> Self {
        Self {
            id,
            actor,
            clock,
            operation,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    pub fn clock(&self) -> &VectorClock<A> {
        &self.clock
    }

    pub fn operation(&self) -> &O {
        &self.operation
    }

    /// The log's total order; delegates to the clock.
    pub fn total_cmp(&self, other: &Self) -> cmp::Ordering {
        self.clock.total_cmp(&other.clock)
    }
}

impl<A, O> PartialEq for LoggedOperation<A, O>
where
    A: Ord,
{
    fn eq(&self, other: &Self) -> bool {
        self.clock == other.clock
    }
}
impl<A, O> Eq for LoggedOperation<A, O> where A: Ord {}

impl<A, O> Hash for LoggedOperation<A, O>
where
    A: Ord + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.clock.hash(state);
    }
}

impl<A, O> CausalOrd for LoggedOperation<A, O>
where
    A: Ord,
{
    fn causal_cmp(&self, other: &Self) -> CausalOrdering {
        self.clock.causal_cmp(&other.clock)
    }
}

impl<A, O> fmt::Display for LoggedOperation<A, O>
where
    A: Ord + fmt::Display,
    O: opsync_data_types::Operation,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut id_prefix = self.id.simple().to_string();
        id_prefix.truncate(8);
        match self.operation.description() {
            Some(description) => {
                write!(f, "{id_prefix} {} by {} at {}", description, self.actor, self.clock)
            }
            None => write!(f, "{id_prefix} by {} at {}", self.actor, self.clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsync_core::clocks::{ClockProvider, TimestampStrategy};
    use std::collections::HashSet;

    fn minted(provider: &mut ClockProvider<&'static str>, payload: u32) -> LoggedOperation<&'static str, u32> {
        LoggedOperation::new(*provider.actor(), provider.next(), payload)
    }

    #[test]
    fn equality_is_keyed_on_the_clock_alone() {
        let mut provider = ClockProvider::new("a", TimestampStrategy::MonotonicIncrease);
        let op = minted(&mut provider, 1);

        // Same clock, different id and payload: still "the same" operation.
        let twin = LoggedOperation::from_parts(Uuid::new_v4(), "a", op.clock().clone(), 2u32);
        assert_eq!(op, twin);
        assert_ne!(op.id(), twin.id());

        let mut set = HashSet::new();
        set.insert(op);
        assert!(!set.insert(twin));
    }

    #[test]
    fn provider_discipline_never_mints_equal_clocks() {
        let mut provider = ClockProvider::new("a", TimestampStrategy::Constant);
        let mut seen = HashSet::new();
        for payload in 0..50u32 {
            assert!(seen.insert(minted(&mut provider, payload)));
        }
    }

    #[test]
    fn total_order_follows_the_clocks() {
        let mut provider = ClockProvider::new("a", TimestampStrategy::MonotonicIncrease);
        let first = minted(&mut provider, 1);
        let second = minted(&mut provider, 2);
        assert_eq!(first.total_cmp(&second), cmp::Ordering::Less);
        assert_eq!(first.causal_cmp(&second), CausalOrdering::Before);
    }
}
