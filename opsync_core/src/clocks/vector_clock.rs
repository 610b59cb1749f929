use super::{CausalOrd, CausalOrdering};
use itertools::{EitherOrBoth, Itertools};
use ordered_float::OrderedFloat;
use std::{
    cmp,
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
};

/// Process-global tick source for [[TimestampStrategy::MonotonicIncrease]].
///
/// Shared between all clocks in the process, so ticks from different logs
/// stay mutually ordered.
static MONOTONIC_TICKS: AtomicU64 = AtomicU64::new(0);

/// Chooses how [[VectorClock]] timestamps are sampled on each tick.
///
/// The strategy is fixed when the first clock is created and carried through
/// every clock derived from it. All replicas of the same log must use the
/// same strategy, otherwise their tie-breaking is meaningless.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimestampStrategy {
    /// Always 0. Ties are broken purely on actors and counters.
    Constant,
    /// Wall-clock seconds (with fractional part) at tick time.
    UnixTime,
    /// A process-global counter incremented on each call.
    ///
    /// Deterministic within a process, which makes it the right choice for
    /// tests that assert on exact orderings.
    MonotonicIncrease,
}
impl TimestampStrategy {
    /// Sample the next timestamp value for this strategy.
    pub fn next_timestamp(self) -> f64 {
        match self {
            TimestampStrategy::Constant => 0.0,
            TimestampStrategy::UnixTime => {
                let now = chrono::Utc::now();
                now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
            }
            TimestampStrategy::MonotonicIncrease => {
                MONOTONIC_TICKS.fetch_add(1, AtomicOrdering::Relaxed) as f64
            }
        }
    }
}

/// A vector clock over an open set of actors, with a tie-breaking timestamp.
///
/// Counters for actors that have never ticked are not stored and read as 0.
/// Values are immutable: "mutation" always returns a new clock, so a clock
/// that has been handed out can never change underneath its owner.
///
/// Two clocks are equal when their stored counters, their last ticking actor,
/// and their timestamp all agree. The strategy is configuration, not state,
/// and takes no part in equality or hashing.
///
/// Beyond the causal partial order ([[CausalOrd]]), clocks form a total order
/// via [[VectorClock::total_cmp]]: causally related clocks keep their causal
/// order, concurrent ones are linearized by timestamp, then by the last
/// ticking actor, then by the lexicographic `(actor, counter)` sequence.
/// The result is strict, antisymmetric, and total; it is also transitive as
/// long as timestamps never decrease along causal chains, which the
/// [[ClockProvider]](super::ClockProvider) discipline guarantees.
#[derive(Clone, Debug)]
pub struct VectorClock<A> {
    counters: BTreeMap<A, u64>,
    last_actor: A,
    timestamp: OrderedFloat<f64>,
    strategy: TimestampStrategy,
}

impl<A> VectorClock<A>
where
    A: Ord + Clone,
{
    /// A fresh clock for `actor` with all counters at zero.
    pub fn new(actor: A, strategy: TimestampStrategy) -> Self {
        Self {
            counters: BTreeMap::new(),
            last_actor: actor,
            timestamp: OrderedFloat(0.0),
            strategy,
        }
    }

    /// Rebuild a clock from its parts, e.g. when loading from storage.
    ///
    /// Zero counters are dropped, so reconstructed clocks compare the same
    /// way freshly ticked ones do.
    pub fn from_parts(
        counters: impl IntoIterator<Item = (A, u64)>,
        last_actor: A,
        timestamp: f64,
        strategy: TimestampStrategy,
    ) -> Self {
        Self {
            counters: counters.into_iter().filter(|(_, n)| *n > 0).collect(),
            last_actor,
            timestamp: OrderedFloat(timestamp),
            strategy,
        }
    }

    /// The counter for `actor`; 0 if the actor has never ticked this clock.
    pub fn counter(&self, actor: &A) -> u64 {
        self.counters.get(actor).copied().unwrap_or(0)
    }

    /// All stored `(actor, counter)` entries in actor order.
    pub fn counters(&self) -> impl Iterator<Item = (&A, u64)> {
        self.counters.iter().map(|(actor, n)| (actor, *n))
    }

    /// The actor whose tick produced this clock value.
    pub fn last_actor(&self) -> &A {
        &self.last_actor
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp.into_inner()
    }

    pub fn strategy(&self) -> TimestampStrategy {
        self.strategy
    }

    /// A new clock in which `actor`'s counter is one higher and the timestamp
    /// is freshly sampled from the strategy.
    #[must_use]
    pub fn incremented(&self, actor: A) -> Self {
        let mut counters = self.counters.clone();
        *counters.entry(actor.clone()).or_insert(0) += 1;
        Self {
            counters,
            last_actor: actor,
            timestamp: OrderedFloat(self.strategy.next_timestamp()),
            strategy: self.strategy,
        }
    }

    /// The pointwise maximum of both clocks.
    ///
    /// The timestamp is the strictly greater of the two; on a timestamp tie
    /// the greater last actor is kept, so the merge commutes.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let counters = self
            .counters
            .iter()
            .merge_join_by(other.counters.iter(), |left, right| left.0.cmp(right.0))
            .map(|pair| match pair {
                EitherOrBoth::Left((actor, n)) | EitherOrBoth::Right((actor, n)) => {
                    (actor.clone(), *n)
                }
                EitherOrBoth::Both((actor, own), (_, theirs)) => {
                    (actor.clone(), (*own).max(*theirs))
                }
            })
            .collect();
        let (timestamp, last_actor) = match self.timestamp.cmp(&other.timestamp) {
            cmp::Ordering::Greater => (self.timestamp, self.last_actor.clone()),
            cmp::Ordering::Less => (other.timestamp, other.last_actor.clone()),
            cmp::Ordering::Equal => (
                self.timestamp,
                cmp::max(self.last_actor.clone(), other.last_actor.clone()),
            ),
        };
        Self {
            counters,
            last_actor,
            timestamp,
            strategy: self.strategy,
        }
    }

    /// The deterministic linearization of the causal order.
    ///
    /// See the type-level documentation for the tie-breaking chain.
    pub fn total_cmp(&self, other: &Self) -> cmp::Ordering {
        match self.causal_cmp(other) {
            CausalOrdering::Before => cmp::Ordering::Less,
            CausalOrdering::After => cmp::Ordering::Greater,
            CausalOrdering::Equal | CausalOrdering::Concurrent => self
                .timestamp
                .cmp(&other.timestamp)
                .then_with(|| self.last_actor.cmp(&other.last_actor))
                .then_with(|| self.counters.iter().cmp(other.counters.iter())),
        }
    }
}

impl<A> PartialEq for VectorClock<A>
where
    A: Ord,
{
    fn eq(&self, other: &Self) -> bool {
        self.counters == other.counters
            && self.last_actor == other.last_actor
            && self.timestamp == other.timestamp
    }
}
impl<A> Eq for VectorClock<A> where A: Ord {}

impl<A> Hash for VectorClock<A>
where
    A: Ord + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (actor, n) in &self.counters {
            actor.hash(state);
            n.hash(state);
        }
        self.last_actor.hash(state);
        self.timestamp.hash(state);
    }
}

impl<A> CausalOrd for VectorClock<A>
where
    A: Ord,
{
    fn causal_cmp(&self, other: &Self) -> CausalOrdering {
        let mut observed = ObservedOrderings::none();
        // Stored counters are always positive, so an actor present on only
        // one side makes that side strictly greater there.
        for pair in self
            .counters
            .iter()
            .merge_join_by(other.counters.iter(), |left, right| left.0.cmp(right.0))
        {
            let entry = match pair {
                EitherOrBoth::Left(_) => cmp::Ordering::Greater,
                EitherOrBoth::Right(_) => cmp::Ordering::Less,
                EitherOrBoth::Both((_, own), (_, theirs)) => own.cmp(theirs),
            };
            observed.update(entry);
            if observed.has_less_and_greater() {
                // We can stop checking early in this case.
                return CausalOrdering::Concurrent;
            }
        }
        observed.into_causal_ordering()
    }
}

impl<A> fmt::Display for VectorClock<A>
where
    A: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .counters
            .iter()
            .map(|(actor, n)| format!("{actor}:{n}"))
            .join(", ");
        write!(f, "〈{entries}〉@{}({})", self.timestamp, self.last_actor)
    }
}

/// This is somewhat equivalent to a Set<Ordering> just much more compact.
struct ObservedOrderings {
    has_less: bool,
    has_greater: bool,
}
impl ObservedOrderings {
    const fn none() -> Self {
        Self {
            has_less: false,
            has_greater: false,
        }
    }

    fn update(&mut self, ord: cmp::Ordering) {
        match ord {
            cmp::Ordering::Less => {
                self.has_less = true;
            }
            cmp::Ordering::Equal => (),
            cmp::Ordering::Greater => {
                self.has_greater = true;
            }
        }
    }

    const fn has_less_and_greater(&self) -> bool {
        self.has_less && self.has_greater
    }

    const fn into_causal_ordering(self) -> CausalOrdering {
        match (self.has_less, self.has_greater) {
            (false, false) => CausalOrdering::Equal,
            (true, false) => CausalOrdering::Before,
            (false, true) => CausalOrdering::After,
            (true, true) => CausalOrdering::Concurrent,
        }
    }
}
