//! # Reliable broadcast
//!
//! The reliable broadcast protocol assumes a network of _N_ nodes that send signed messages to
//! each other, with at most _f_ of them faulty, where _3 f < N_. One of the nodes is the
//! "proposer" who wants to broadcast a value to all other nodes. The protocol guarantees that
//! either all correct nodes output the same value, or none of them output anything. If the
//! proposer is correct, all correct nodes output its value.
//!
//! ## How it works
//!
//! This is Bracha's broadcast, without erasure coding: every message carries the full value.
//!
//! * The proposer multicasts `Propose(v)`.
//! * On the proposer's `Propose(v)`, every node multicasts `Echo(v)`.
//! * Once a node has received more than _(N + f) / 2_ `Echo`s with the same value, it multicasts
//!   `Ready(v)`. Any two such quorums intersect in a correct node, so no two correct nodes send
//!   `Ready`s for different values.
//! * Once a node has received _f + 1_ `Ready(v)`, at least one of them is from a correct node, so
//!   it multicasts `Ready(v)` itself if it hasn't already.
//! * Once a node has received _2 f + 1_ `Ready(v)`, it outputs `v`. At least _f + 1_ of those are
//!   from correct nodes, so every other correct node will send `Ready(v)` and output, too.
//!
//! Values are compared by their SHA3-256 digest.
//!
//! An optional predicate gates the `Echo`: a node only echoes a proposed value it accepts. The
//! predicate must be monotonic. Once it holds for a value, it has to keep holding for it.

mod broadcast;
mod error;
mod message;

pub use self::broadcast::{accept_all, Broadcast, Step, ValuePredicate};
pub use self::error::{Error, FaultKind, Result};
pub use self::message::Message;

use tiny_keccak::{Hasher, Sha3};

/// A SHA3-256 digest of a broadcast value.
pub type Digest = [u8; 32];

/// Returns the SHA3-256 digest of `value`.
pub fn digest(value: &[u8]) -> Digest {
    let mut sha3 = Sha3::v256();
    sha3.update(value);
    let mut output = [0u8; 32];
    sha3.finalize(&mut output);
    output
}
