use super::{TimestampStrategy, VectorClock};

/// Stateful mint of successive [[VectorClock]] values for a single actor.
///
/// The provider owns the most recent clock it has issued or absorbed, so
/// every clock returned by [[ClockProvider::next]] is strictly greater (in
/// total order) than everything this replica has seen so far. Not shareable
/// between threads by design; every log owns exactly one provider.
#[derive(Clone, Debug)]
pub struct ClockProvider<A> {
    actor: A,
    current: VectorClock<A>,
}

impl<A> ClockProvider<A>
where
    A: Ord + Clone,
{
    /// A provider starting from the all-zero clock.
    pub fn new(actor: A, strategy: TimestampStrategy) -> Self {
        Self {
            current: VectorClock::new(actor.clone(), strategy),
            actor,
        }
    }

    /// A provider that continues from a previously issued clock, e.g. after
    /// loading a log from storage.
    pub fn seeded(actor: A, clock: VectorClock<A>) -> Self {
        Self {
            actor,
            current: clock,
        }
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// The most recent clock issued or absorbed.
    pub fn current(&self) -> &VectorClock<A> {
        &self.current
    }

    /// Tick the clock for this provider's actor and return the new value.
    pub fn next(&mut self) -> VectorClock<A> {
        self.current = self.current.incremented(self.actor.clone());
        self.current.clone()
    }

    /// Absorb a clock observed from a remote replica.
    pub fn merge(&mut self, clock: &VectorClock<A>) {
        self.current = self.current.merged(clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::{CausalOrd, CausalOrdering};
    use maplit::btreemap;
    use std::cmp;

    fn provider(actor: &'static str) -> ClockProvider<&'static str> {
        ClockProvider::new(actor, TimestampStrategy::MonotonicIncrease)
    }

    #[test]
    fn next_is_strictly_increasing() {
        let mut provider = provider("a");
        let mut previous = provider.current().clone();
        for expected in 1..=5u64 {
            let clock = provider.next();
            assert_eq!(clock.counter(&"a"), expected);
            assert_eq!(previous.causal_cmp(&clock), CausalOrdering::Before);
            assert_eq!(previous.total_cmp(&clock), cmp::Ordering::Less);
            previous = clock;
        }
    }

    #[test]
    fn merge_absorbs_remote_progress() {
        let mut local = provider("a");
        local.next();

        let remote = VectorClock::from_parts(
            btreemap! { "a" => 1, "b" => 7 },
            "b",
            100.0,
            TimestampStrategy::MonotonicIncrease,
        );
        local.merge(&remote);
        assert_eq!(local.current().counter(&"b"), 7);

        // The next minted clock dominates everything seen so far.
        let next = local.next();
        assert_eq!(remote.causal_cmp(&next), CausalOrdering::Before);
        assert_eq!(next.counter(&"a"), 2);
    }

    #[test]
    fn seeded_provider_continues_the_chain() {
        let mut first = provider("a");
        first.next();
        let handoff = first.next();

        let mut second = ClockProvider::seeded("a", handoff.clone());
        let next = second.next();
        assert_eq!(handoff.causal_cmp(&next), CausalOrdering::Before);
        assert_eq!(next.counter(&"a"), 3);
    }
}
