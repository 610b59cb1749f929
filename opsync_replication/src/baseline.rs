use opsync_core::clocks::VectorClock;
use opsync_data_types::Snapshot;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Content address of the history folded into a [[Baseline]].
///
/// The chain starts at [[ChainHash::ZERO]] for an untouched log and is
/// extended with the identifier of every operation folded away, in fold
/// order. Two replicas that compact the same operations in the same order
/// therefore end up with the same hash, which is how they recognize a shared
/// compaction point without exchanging the compacted history itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainHash([u8; 32]);

impl ChainHash {
    /// The hash of an empty history.
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The next link: `SHA256(self ‖ id)`, with the identifier contributing
    /// its 16 bytes in big-endian field order.
    #[must_use]
    pub fn chained(&self, id: Uuid) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(id.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(input: &str) -> Option<Self> {
        let bytes = hex::decode(input).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first few bytes are plenty to tell hashes apart in test output.
        write!(f, "ChainHash({}…)", &self.to_hex()[..8])
    }
}

/// The anchor state a log folds its operations onto.
///
/// A fresh log starts from the empty snapshot, the zero hash, and no clock.
/// Compaction replaces all three: the snapshot with the fold of the
/// compacted prefix, the hash with the chain over that prefix, and the clock
/// with the clock of the last compacted operation. Every operation remaining
/// in the log is strictly newer than that clock.
#[derive(Clone, Debug)]
pub struct Baseline<S, A> {
    snapshot: S,
    hash: ChainHash,
    clock: Option<VectorClock<A>>,
}

impl<S, A> PartialEq for Baseline<S, A>
where
    S: PartialEq,
    A: Ord,
{
    fn eq(&self, other: &Self) -> bool {
        self.snapshot == other.snapshot && self.hash == other.hash && self.clock == other.clock
    }
}

impl<S, A> Baseline<S, A>
where
    S: Snapshot,
{
    /// The baseline of a log with no compacted history.
    pub fn initial() -> Self {
        Self {
            snapshot: S::empty(),
            hash: ChainHash::ZERO,
            clock: None,
        }
    }

    pub fn from_parts(snapshot: S, hash: ChainHash, clock: Option<VectorClock<A>>) -> Self {
        Self {
            snapshot,
            hash,
            clock,
        }
    }

    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    pub fn hash(&self) -> &ChainHash {
        &self.hash
    }

    /// The clock of the newest operation folded into this baseline, if any
    /// ever was.
    pub fn clock(&self) -> Option<&VectorClock<A>> {
        self.clock.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_is_all_zero_bytes() {
        assert_eq!(ChainHash::ZERO.as_bytes(), &[0u8; 32]);
        assert_eq!(ChainHash::ZERO.to_hex(), "0".repeat(64));
    }

    #[test]
    fn chaining_is_deterministic_and_order_sensitive() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let once = ChainHash::ZERO.chained(first).chained(second);
        let again = ChainHash::ZERO.chained(first).chained(second);
        assert_eq!(once, again);

        let swapped = ChainHash::ZERO.chained(second).chained(first);
        assert_ne!(once, swapped);
    }

    #[test]
    fn hex_roundtrip() {
        let hash = ChainHash::ZERO.chained(Uuid::new_v4());
        assert_eq!(ChainHash::from_hex(&hash.to_hex()), Some(hash));

        assert_eq!(ChainHash::from_hex("zz"), None);
        assert_eq!(ChainHash::from_hex("abcd"), None); // Too short.
    }
}
