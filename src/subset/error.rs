use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binary_agreement;
use crate::broadcast;
use crate::router::RouteError;

/// A subset error.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum Error {
    /// The `Broadcast` instance failed to handle an input or message.
    #[error("Error handling Broadcast input/message: {0}")]
    HandleBroadcast(broadcast::Error),
    /// The `BinaryAgreement` instance failed to handle an input or message.
    #[error("Error handling BinaryAgreement input/message: {0}")]
    HandleAgreement(binary_agreement::Error),
    /// A child instance could not be addressed.
    #[error("Error routing to a child instance: {0}")]
    Route(#[from] RouteError),
}

/// A subset result.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Faults reported by the child instances, or about the proposer index of a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FaultKind {
    /// `Subset` received a faulty Broadcast message.
    BroadcastFault(broadcast::FaultKind),
    /// `Subset` received a faulty Binary Agreement message.
    BaFault(binary_agreement::FaultKind),
    /// The message was about a proposer index that doesn't exist.
    UnknownProposer,
}
