//! Test network errors

use std::fmt::{self, Debug, Display};

use bft_agreement::{DecodeError, DistAlgorithm, Fault, NetworkInfoError};

use super::NetMessage;

/// Network crank error.
///
/// Errors resulting from processing a single message ("cranking").
pub enum CrankError<D>
where
    D: DistAlgorithm,
{
    /// The algorithm run by the node produced a `DistAlgorithm::Error` while processing input.
    HandleInput(D::Error),
    /// The algorithm run by the node produced a `DistAlgorithm::Error` while processing input to
    /// all nodes.
    HandleInputAll(D::Error),
    /// The algorithm run by the node produced a `DistAlgorithm::Error` while processing a message.
    HandleMessage {
        /// Network message that triggered the error.
        msg: NetMessage<D>,
        /// The algorithm's error.
        err: D::Error,
    },
    /// The receiving node could not decode the wire encoding of a message.
    Decode {
        /// The message that failed to survive encoding.
        msg: NetMessage<D>,
        /// The decoding error.
        err: DecodeError,
    },
    /// As spotted during cranking, a node unexpectly disappeared from the list of nodes. Note that
    /// this is likely a bug in the network framework code.
    NodeDisappearedInCrank(D::NodeId),
    /// As spotted during message dispatch, a node unexpectly disappeared from the list of
    /// nodes. Note that this is likely a bug in the network framework code.
    NodeDisappearedInDispatch(D::NodeId),
    /// The configured maximum number of cranks has been reached or exceeded.
    CrankLimitExceeded(usize),
    /// The configured maximum number of messages has been reached or exceeded.
    MessageLimitExceeded(usize),
    /// The message queue ran empty before all correct nodes terminated.
    QueueEmpty,
    /// A `Fault` was blamed on a correct node.
    Fault(Fault<D::NodeId, D::FaultKind>),
    /// The network information of a node could not be created.
    InitialNetworkInfo(NetworkInfoError),
    /// A message was injected on behalf of a correct node.
    InjectedForCorrectNode(D::NodeId),
}

// Note: Deriving `Debug` automatically does not work due to the wrongly required trait bound of
//       `D: DistAlgorithm` implementing the respective trait. For this reason, `Debug` and
//       `Display` are implemented manually.
//
//       More details at <https://github.com/rust-lang/rust/issues/26925>.
impl<D> Display for CrankError<D>
where
    D: DistAlgorithm,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrankError::HandleInput(err) => {
                write!(f, "The algorithm could not process input: {:?}", err)
            }
            CrankError::HandleInputAll(err) => write!(
                f,
                "The algorithm could not process input to all nodes: {:?}",
                err
            ),
            CrankError::HandleMessage { msg, err } => write!(
                f,
                "The algorithm could not process network message {:?}. Error: {:?}",
                msg, err
            ),
            CrankError::Decode { msg, err } => write!(
                f,
                "Network message {:?} could not be decoded: {}",
                msg, err
            ),
            CrankError::NodeDisappearedInCrank(id) => write!(
                f,
                "Node {:?} disappeared or never existed, while it was cranked.",
                id
            ),
            CrankError::NodeDisappearedInDispatch(id) => write!(
                f,
                "Node {:?} disappeared or never existed, while it still had incoming messages.",
                id
            ),
            CrankError::CrankLimitExceeded(max) => {
                write!(f, "Maximum number of cranks exceeded: {}", max)
            }
            CrankError::MessageLimitExceeded(max) => {
                write!(f, "Maximum number of messages exceeded: {}", max)
            }
            CrankError::QueueEmpty => {
                write!(f, "No messages left, but not all correct nodes terminated.")
            }
            CrankError::Fault(fault) => {
                write!(f, "Node {:?} is faulty: {:?}.", fault.node_id, fault.kind)
            }
            CrankError::InitialNetworkInfo(err) => {
                write!(f, "Invalid initial network information: {}.", err)
            }
            CrankError::InjectedForCorrectNode(id) => {
                write!(f, "Node {:?} is correct, only its algorithm sends messages.", id)
            }
        }
    }
}

impl<D> Debug for CrankError<D>
where
    D: DistAlgorithm,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrankError::HandleInput(err) => {
                f.debug_struct("HandleInput").field("err", err).finish()
            }
            CrankError::HandleInputAll(err) => {
                f.debug_struct("HandleInputAll").field("err", err).finish()
            }
            CrankError::HandleMessage { msg, err } => f
                .debug_struct("HandleMessage")
                .field("msg", msg)
                .field("err", err)
                .finish(),
            CrankError::Decode { msg, err } => f
                .debug_struct("Decode")
                .field("msg", msg)
                .field("err", err)
                .finish(),
            CrankError::NodeDisappearedInCrank(id) => {
                f.debug_tuple("NodeDisappearedInCrank").field(id).finish()
            }
            CrankError::NodeDisappearedInDispatch(id) => f
                .debug_tuple("NodeDisappearedInDispatch")
                .field(id)
                .finish(),
            CrankError::CrankLimitExceeded(max) => {
                f.debug_tuple("CrankLimitExceeded").field(max).finish()
            }
            CrankError::MessageLimitExceeded(max) => {
                f.debug_tuple("MessageLimitExceeded").field(max).finish()
            }
            CrankError::QueueEmpty => f.write_str("QueueEmpty"),
            CrankError::Fault(fault) => f.debug_tuple("Fault").field(fault).finish(),
            CrankError::InitialNetworkInfo(err) => {
                f.debug_tuple("InitialNetworkInfo").field(err).finish()
            }
            CrankError::InjectedForCorrectNode(id) => {
                f.debug_tuple("InjectedForCorrectNode").field(id).finish()
            }
        }
    }
}

impl<D> std::error::Error for CrankError<D> where D: DistAlgorithm {}
