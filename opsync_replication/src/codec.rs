//! The self-describing byte form of a log.
//!
//! The container is JSON: the log identifier, the baseline (user-serialized
//! snapshot bytes, hash chain, clock), the summary *as of the baseline*, and
//! the operation sequence in ascending total order. The live snapshot,
//! summary, and undo history are deliberately not stored; they are replayed
//! on load, which keeps containers compact and makes double-counting on
//! merge round-trips impossible.
//!
//! User payloads (snapshot and operations) pass through their own serde
//! serialization and are carried as base64 strings; the baseline hash is
//! carried as hex. A missing hash decodes as the zero hash and a missing
//! clock as "never compacted", so containers written by older replicas stay
//! readable.

use crate::baseline::{Baseline, ChainHash};
use crate::errors::{CorruptLogSnafu, DecodeSnafu, EncodeSnafu, Result};
use crate::log::OperationLog;
use crate::logged_operation::LoggedOperation;
use crate::summary::{AppliedOperation, ApplyKind, Summary};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use opsync_core::clocks::{TimestampStrategy, VectorClock};
use opsync_data_types::Snapshot;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(
    serialize = "L: Serialize, A: Serialize",
    deserialize = "L: Deserialize<'de>, A: Deserialize<'de>"
))]
struct LogContainer<L, A> {
    log_id: L,
    /// Base64 of the user-serialized baseline snapshot.
    base_snapshot: String,
    /// Hex; absent means the zero hash (nothing ever compacted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    initial_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    initial_clock: Option<WireClock<A>>,
    /// The summary as of the baseline, not the live one.
    summary: WireSummary<A>,
    /// Ascending in total order; enforced on decode.
    operations: Vec<WireOperation<A>>,
}

#[derive(Serialize, Deserialize)]
struct WireOperation<A> {
    uuid: Uuid,
    actor: A,
    clock: WireClock<A>,
    /// Base64 of the user-serialized operation.
    operation: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireClock<A> {
    counters: Vec<WireCounter<A>>,
    last_actor: A,
    timestamp: f64,
    strategy: WireTimestampStrategy,
}

#[derive(Serialize, Deserialize)]
struct WireCounter<A> {
    actor: A,
    count: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
enum WireTimestampStrategy {
    Constant,
    UnixTime,
    MonotonicIncrease,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSummary<A> {
    actors: Vec<A>,
    latest_clock: WireClock<A>,
    operation_count: u64,
    operation_infos: Vec<WireAppliedOperation<A>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAppliedOperation<A> {
    id: Uuid,
    index: u64,
    actor: A,
    apply_type: WireApplyKind,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", content = "reason", rename_all = "camelCase")]
enum WireApplyKind {
    Full,
    Partial(String),
    Skipped(String),
}

impl From<TimestampStrategy> for WireTimestampStrategy {
    fn from(value: TimestampStrategy) -> Self {
        match value {
            TimestampStrategy::Constant => WireTimestampStrategy::Constant,
            TimestampStrategy::UnixTime => WireTimestampStrategy::UnixTime,
            TimestampStrategy::MonotonicIncrease => WireTimestampStrategy::MonotonicIncrease,
        }
    }
}
impl From<WireTimestampStrategy> for TimestampStrategy {
    fn from(value: WireTimestampStrategy) -> Self {
        match value {
            WireTimestampStrategy::Constant => TimestampStrategy::Constant,
            WireTimestampStrategy::UnixTime => TimestampStrategy::UnixTime,
            WireTimestampStrategy::MonotonicIncrease => TimestampStrategy::MonotonicIncrease,
        }
    }
}

fn clock_to_wire<A>(clock: &VectorClock<A>) -> WireClock<A>
where
    A: Ord + Clone,
{
    WireClock {
        counters: clock
            .counters()
            .map(|(actor, count)| WireCounter {
                actor: actor.clone(),
                count,
            })
            .collect(),
        last_actor: clock.last_actor().clone(),
        timestamp: clock.timestamp(),
        strategy: clock.strategy().into(),
    }
}

fn clock_from_wire<A>(wire: WireClock<A>) -> VectorClock<A>
where
    A: Ord + Clone,
{
    VectorClock::from_parts(
        wire.counters.into_iter().map(|entry| (entry.actor, entry.count)),
        wire.last_actor,
        wire.timestamp,
        wire.strategy.into(),
    )
}

fn apply_kind_to_wire(kind: &ApplyKind) -> WireApplyKind {
    match kind {
        ApplyKind::Full => WireApplyKind::Full,
        ApplyKind::Partial { reason } => WireApplyKind::Partial(reason.clone()),
        ApplyKind::Skipped { reason } => WireApplyKind::Skipped(reason.clone()),
    }
}
fn apply_kind_from_wire(wire: WireApplyKind) -> ApplyKind {
    match wire {
        WireApplyKind::Full => ApplyKind::Full,
        WireApplyKind::Partial(reason) => ApplyKind::Partial { reason },
        WireApplyKind::Skipped(reason) => ApplyKind::Skipped { reason },
    }
}

fn summary_to_wire<A>(summary: &Summary<A>) -> WireSummary<A>
where
    A: Ord + Clone,
{
    WireSummary {
        actors: summary.actors().cloned().collect(),
        latest_clock: clock_to_wire(summary.latest_clock()),
        operation_count: summary.operation_count(),
        operation_infos: summary
            .operation_infos()
            .iter()
            .map(|info| WireAppliedOperation {
                id: info.id,
                index: info.index,
                actor: info.actor.clone(),
                apply_type: apply_kind_to_wire(&info.kind),
            })
            .collect(),
    }
}

fn summary_from_wire<A>(wire: WireSummary<A>) -> Summary<A>
where
    A: Ord + Clone,
{
    let operation_infos = wire
        .operation_infos
        .into_iter()
        .map(|info| AppliedOperation {
            id: info.id,
            index: info.index,
            actor: info.actor,
            kind: apply_kind_from_wire(info.apply_type),
        })
        .collect();
    Summary::from_parts(
        wire.actors,
        clock_from_wire(wire.latest_clock),
        wire.operation_count,
        operation_infos,
    )
}

fn decode_base64(field: &'static str, input: &str) -> Result<Vec<u8>> {
    BASE64.decode(input).map_err(|_| {
        CorruptLogSnafu {
            context: format!("invalid base64 in {field}"),
        }
        .build()
    })
}

impl<L, A, S> OperationLog<L, A, S>
where
    L: Clone + Serialize,
    A: Ord + Clone + Serialize,
    S: Snapshot,
{
    /// Encode this log into its stable byte form.
    ///
    /// Only fails when a user-supplied snapshot or operation serializer does.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let base_snapshot_bytes =
            serde_json::to_vec(self.baseline().snapshot()).context(EncodeSnafu)?;
        let hash = *self.baseline().hash();

        let operations = self
            .operations()
            .iter()
            .map(|operation| -> Result<_> {
                let payload =
                    serde_json::to_vec(operation.operation()).context(EncodeSnafu)?;
                Ok(WireOperation {
                    uuid: operation.id(),
                    actor: operation.actor().clone(),
                    clock: clock_to_wire(operation.clock()),
                    operation: BASE64.encode(payload),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let container = LogContainer {
            log_id: self.log_id().clone(),
            base_snapshot: BASE64.encode(base_snapshot_bytes),
            initial_sha256: (hash != ChainHash::ZERO).then(|| hash.to_hex()),
            initial_clock: self.baseline().clock().map(clock_to_wire),
            summary: summary_to_wire(self.initial_summary()),
            operations,
        };
        serde_json::to_vec(&container).context(EncodeSnafu)
    }
}

impl<L, A, S> OperationLog<L, A, S>
where
    L: DeserializeOwned,
    A: Ord + Clone + DeserializeOwned,
    S: Snapshot,
{
    /// Decode a log from bytes produced by [[OperationLog::serialize]],
    /// taking over as `actor`.
    ///
    /// The operation sequence must already be ascending in total order;
    /// containers violating that are rejected as corrupt rather than
    /// repaired. The live snapshot, summary, and undo history are rebuilt by
    /// replaying the operations over the baseline, and the clock provider
    /// resumes from the newest clock in the container.
    pub fn from_bytes(actor: A, bytes: &[u8]) -> Result<Self> {
        let container: LogContainer<L, A> =
            serde_json::from_slice(bytes).context(DecodeSnafu)?;

        let hash = match &container.initial_sha256 {
            None => ChainHash::ZERO,
            Some(hex) => ChainHash::from_hex(hex).ok_or_else(|| {
                CorruptLogSnafu {
                    context: "invalid baseline hash",
                }
                .build()
            })?,
        };
        let snapshot_bytes = decode_base64("baseSnapshot", &container.base_snapshot)?;
        let snapshot: S = serde_json::from_slice(&snapshot_bytes).context(DecodeSnafu)?;
        let baseline = Baseline::from_parts(snapshot, hash, container.initial_clock.map(clock_from_wire));

        let operations = container
            .operations
            .into_iter()
            .map(|wire| -> Result<_> {
                let payload = decode_base64("operation", &wire.operation)?;
                let operation: S::Op =
                    serde_json::from_slice(&payload).context(DecodeSnafu)?;
                Ok(LoggedOperation::from_parts(
                    wire.uuid,
                    wire.actor,
                    clock_from_wire(wire.clock),
                    operation,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_container_parts(
            container.log_id,
            actor,
            baseline,
            summary_from_wire(container.summary),
            operations,
        )
    }
}
