use snafu::{Location, Snafu};

/// Errors surfaced by [[OperationLog]](crate::OperationLog) mutations and the
/// byte codec.
///
/// Every mutating operation fails atomically: when one of these is returned,
/// the log is exactly as it was before the call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LogError {
    /// Merging was attempted across two different logical logs.
    #[snafu(display("Cannot merge logs with different identifiers ({local} vs. {remote}) at {location}"))]
    NonMatchingLogIds {
        local: String,
        remote: String,
        #[snafu(implicit)]
        location: Location,
    },
    /// The incoming operations cannot be reconciled with the local log,
    /// typically because their history has already been compacted away here.
    #[snafu(display("Cannot merge: {context} at {location}"))]
    MergeNotPossible {
        context: String,
        #[snafu(implicit)]
        location: Location,
    },
    /// No operation satisfied the reduction cutoff.
    #[snafu(display("No operation satisfied the reduction cutoff at {location}"))]
    ReduceNotPossible {
        #[snafu(implicit)]
        location: Location,
    },
    /// The container bytes decoded, but violate the log's invariants.
    #[snafu(display("Rejected corrupt log container ({context}) at {location}"))]
    CorruptLog {
        context: String,
        #[snafu(implicit)]
        location: Location,
    },
    /// The container bytes could not be decoded at all.
    #[snafu(display("Failed to decode log container at {location}: {source}"))]
    Decode {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
    /// The log could not be encoded; this only happens when a user-supplied
    /// snapshot or operation serializer fails.
    #[snafu(display("Failed to encode log container at {location}: {source}"))]
    Encode {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T, E = LogError> = std::result::Result<T, E>;
