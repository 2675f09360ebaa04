use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A broadcast error.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum Error {
    /// Only the proposer can provide input.
    #[error("Instance cannot propose")]
    InstanceCannotPropose,
    /// The proposer already provided input.
    #[error("Multiple inputs received")]
    MultipleInputs,
    /// Our own input exceeds the configured payload size limit.
    #[error("Payload of {size} bytes exceeds the limit of {limit}")]
    PayloadTooLarge {
        /// The size of the input.
        size: usize,
        /// The configured limit.
        limit: usize,
    },
}

/// A broadcast result.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Represents each reason why a broadcast message could be faulty.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FaultKind {
    /// `Broadcast` received a `Propose` from a node other than the proposer.
    ReceivedProposeFromNonProposer,
    /// `Broadcast` received more than one `Propose` from the proposer.
    MultipleProposes,
    /// `Broadcast` received more than one `Echo` from the same sender.
    MultipleEchos,
    /// `Broadcast` received more than one `Ready` from the same sender.
    MultipleReadys,
    /// `Broadcast` received a value larger than the configured limit.
    PayloadTooLarge,
}
