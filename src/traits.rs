//! Common supertraits for distributed algorithms.

use std::fmt::Debug;
use std::hash::Hash;
use std::iter::once;

use crate::fault_log::{Fault, FaultLog};
use crate::wire::{DecodeError, WireMessage};
use crate::TargetedMessage;

/// A peer node's unique identifier.
pub trait NodeIdT: Eq + Ord + Clone + Debug + Hash + Send + Sync {}
impl<N> NodeIdT for N where N: Eq + Ord + Clone + Debug + Hash + Send + Sync {}

/// A kind of fault that can be blamed on a peer.
pub trait FaultT: Clone + Debug + PartialEq + Send + Sync {}
impl<F> FaultT for F where F: Clone + Debug + PartialEq + Send + Sync {}

/// Messages.
pub trait Message: Debug + Clone + Send + Sync + WireMessage {}
impl<M> Message for M where M: Debug + Clone + Send + Sync + WireMessage {}

/// Single algorithm step outcome.
///
/// Each time input (typically in the form of user input or incoming network messages) is provided
/// to an instance of an algorithm, a `Step` is produced, potentially containing a fault log and
/// network messages. Outputs are not part of the step: they are queried with
/// `DistAlgorithm::output` afterwards.
///
/// Any `Step` **must always be used** by the client application; at the very least the resulting
/// messages must be queued.
///
/// ## Handling unused Steps
///
/// In the (rare) case of a `Step` not being of any interest at all, instead of discarding it
/// through `let _ = ...` or similar constructs, the implicit assumption should explicitly be
/// checked instead:
///
/// ```ignore
/// assert!(aba.handle_input(true).expect("input failed").messages.len() == 1,
///         "the first input sends exactly one vote");
/// ```
///
/// If an edge case occurs and outgoing messages are generated as a result, the `assert!` will
/// catch it, instead of potentially stalling the algorithm.
#[must_use = "The algorithm step result must be used."]
#[derive(Debug)]
pub struct Step<M, N, F> {
    /// A list of nodes that are not following consensus, together with information about the
    /// detected misbehavior.
    pub fault_log: FaultLog<N, F>,
    /// A list of messages that must be sent to other nodes. Each entry contains a message and a
    /// destination.
    pub messages: Vec<TargetedMessage<M, N>>,
}

/// The `Step` type of a given algorithm.
pub type DaStep<D> = Step<
    <D as DistAlgorithm>::Message,
    <D as DistAlgorithm>::NodeId,
    <D as DistAlgorithm>::FaultKind,
>;

impl<M, N, F> Default for Step<M, N, F> {
    fn default() -> Self {
        Step {
            fault_log: FaultLog::default(),
            messages: Vec::default(),
        }
    }
}

impl<M, N, F> Step<M, N, F> {
    /// Creates a new `Step` from the given collections.
    pub fn new(fault_log: FaultLog<N, F>, messages: Vec<TargetedMessage<M, N>>) -> Self {
        Step {
            fault_log,
            messages,
        }
    }

    /// Converts `self` into a step of another type, given conversion methods for faults and
    /// messages.
    pub fn map<M2, F2, FF, FM>(self, f_fault: FF, f_msg: FM) -> Step<M2, N, F2>
    where
        FF: Fn(F) -> F2,
        FM: Fn(M) -> M2,
    {
        Step {
            fault_log: self.fault_log.map(f_fault),
            messages: self.messages.into_iter().map(|tm| tm.map(&f_msg)).collect(),
        }
    }

    /// Extends `self` with `other`s messages and fault logs, converting them with the given
    /// functions. This is used by parent algorithms to wrap the steps of their children.
    pub fn extend_with<M2, F2, FF, FM>(&mut self, other: Step<M2, N, F2>, f_fault: FF, f_msg: FM)
    where
        FF: Fn(F2) -> F,
        FM: Fn(M2) -> M,
    {
        self.fault_log.extend(other.fault_log.map(f_fault));
        let msgs = other.messages.into_iter().map(|tm| tm.map(&f_msg));
        self.messages.extend(msgs);
    }

    /// Adds the fault logs and messages of `other` to `self`.
    pub fn extend(&mut self, other: Self) {
        self.fault_log.extend(other.fault_log);
        self.messages.extend(other.messages);
    }

    /// Extends this step with `other` and returns the result.
    pub fn join(mut self, other: Self) -> Self {
        self.extend(other);
        self
    }

    /// Returns `true` if there are no messages or faults.
    pub fn is_empty(&self) -> bool {
        self.fault_log.is_empty() && self.messages.is_empty()
    }
}

impl<M, N, F> From<FaultLog<N, F>> for Step<M, N, F> {
    fn from(fault_log: FaultLog<N, F>) -> Self {
        Step {
            fault_log,
            ..Step::default()
        }
    }
}

impl<M, N, F> From<Fault<N, F>> for Step<M, N, F> {
    fn from(fault: Fault<N, F>) -> Self {
        Step {
            fault_log: fault.into(),
            ..Step::default()
        }
    }
}

impl<M, N, F> From<TargetedMessage<M, N>> for Step<M, N, F> {
    fn from(msg: TargetedMessage<M, N>) -> Self {
        Step {
            messages: once(msg).collect(),
            ..Step::default()
        }
    }
}

/// A distributed algorithm that defines a message flow.
///
/// An instance is driven by exactly one thread at a time: every call runs to completion and
/// returns all messages that must be sent as a result.
pub trait DistAlgorithm: Send + Sync {
    /// Unique node identifier.
    type NodeId: NodeIdT;
    /// The input provided by the user.
    type Input;
    /// The output type. Once present, it only ever changes to signal termination.
    type Output: Clone;
    /// The messages that need to be exchanged between the instances in the participating nodes.
    type Message: Message;
    /// The errors that can occur during execution.
    type Error: std::error::Error + Send + Sync;
    /// The kinds of misbehavior that can be blamed on peers.
    type FaultKind: FaultT;

    /// Handles an input provided by the user. Only the first input has an effect.
    fn handle_input(&mut self, input: Self::Input) -> Result<DaStep<Self>, Self::Error>
    where
        Self: Sized;

    /// Handles a message received from node `sender_id`.
    fn handle_message(
        &mut self,
        sender_id: &Self::NodeId,
        message: Self::Message,
    ) -> Result<DaStep<Self>, Self::Error>
    where
        Self: Sized;

    /// Returns the current output, or `None` if nothing has been decided yet.
    fn output(&self) -> Option<Self::Output>;

    /// Returns `true` if execution has completed and this instance can be dropped.
    fn terminated(&self) -> bool;

    /// Returns this node's own ID.
    fn our_id(&self) -> &Self::NodeId;

    /// Returns a human-readable summary of the instance's state, for logging.
    fn status(&self) -> String;

    /// Reconstructs a message from its wire encoding.
    fn unmarshal_message(&self, bytes: &[u8]) -> Result<Self::Message, DecodeError> {
        Self::Message::from_bytes(bytes)
    }
}
