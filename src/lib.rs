//! # Asynchronous Byzantine agreement
//!
//! Implementations of the agreement protocols at the core of the
//! [Honey Badger of BFT Protocols](https://eprint.iacr.org/2016/199.pdf): binary agreement,
//! common subset and the common coin they rely on.
//!
//!
//! ## Consensus
//!
//! A consensus algorithm is a protocol that helps a number of nodes agree on some data value.
//! Byzantine fault tolerant systems can tolerate a number of faulty nodes _f_ (broken, or even
//! controlled by an attacker), as long as the total number of nodes _N_ is greater than _3 f_.
//! Asynchronous protocols do not make assumptions about timing: Even if an adversary controls
//! network scheduling and can delay message delivery, consensus will still be reached as long as
//! all messages are _eventually_ delivered.
//!
//!
//! ## Usage
//!
//! The crate only implements the abstract protocols, it is the application's responsibility to
//! sign and send the messages. The application is required to call `handle_message` for
//! every correctly signed message from a peer. Methods return a [Step](struct.Step.html) data
//! structure, which contains messages that need to be sent and fault logs indicating misbehaving
//! peers. The current output of an instance is available through `DistAlgorithm::output`.
//!
//! Every message type has a compact byte encoding (see [`WireMessage`](wire/trait.WireMessage.html)),
//! and `DistAlgorithm::unmarshal_message` turns received bytes back into a message.
//!
//! The network must contain a number of nodes that are known to each other by some unique
//! identifiers (IDs), which is a generic type argument to the algorithms. All nodes must list the
//! IDs in the same order: child instances are addressed by a node's index.
//!
//!
//! ## Algorithms
//!
//! [**Subset**](subset/index.html)
//!
//! Each node inputs one item. The output is a set of at least _N - f_ nodes' IDs, together with
//! their items, and will be the same in every correct node.
//!
//! [**Broadcast**](broadcast/index.html)
//!
//! One node, the _proposer_, inputs an item, and every node receives that item as an output. Even
//! if the proposer is faulty it is guaranteed that either none of the correct nodes output
//! anything, or all of them have the same output.
//!
//! This is used in Subset to send each node's proposal to the other nodes.
//!
//! [**Binary Agreement**](binary_agreement/index.html)
//!
//! Each node inputs a binary value: `true` or `false`. As output, either all correct nodes receive
//! `true` or all correct nodes receive `false`. The output is guaranteed to be a value that was
//! input by at least one _correct_ node.
//!
//! This is used in Subset to decide whether each node's proposal should be included in the subset
//! or not.
//!
//! [**Common Coin**](common_coin/index.html)
//!
//! Each node inputs `()` to broadcast a signature share. Once enough nodes have input, all nodes
//! receive the same pseudorandom bit, derived from the combined threshold signature. The outcome
//! cannot be known by the adversary before at least one correct node has provided input.
//!
//! This is used in Binary Agreement to break ties in each round.
//!
//! ## Serialization
//!
//! All message and output types also implement serde's `Serialize` and `Deserialize`, so they can
//! be included as part of other serializable types.

// We put algorithm structs in `src/algorithm/algorithm.rs`.
#![allow(clippy::module_inception)]
#![warn(missing_docs)]

pub extern crate threshold_crypto as crypto;

mod fault_log;
mod messaging;
mod network_info;
mod params;
mod traits;

pub mod binary_agreement;
pub mod broadcast;
pub mod common_coin;
pub mod router;
pub mod subset;
pub mod util;
pub mod wire;

pub use crate::fault_log::{Fault, FaultLog};
pub use crate::messaging::{Target, TargetedMessage};
pub use crate::network_info::{NetworkInfo, NetworkInfoError, MAX_NODES};
pub use crate::params::Params;
pub use crate::router::{RouteError, Router};
pub use crate::traits::{DaStep, DistAlgorithm, FaultT, Message, NodeIdT, Step};
pub use crate::wire::{DecodeError, WireMessage};
