//! # Binary Agreement
//!
//! The Binary Agreement protocol allows each node to input one binary (`bool`) value, and will
//! output a binary value. The output is guaranteed to have been input by at least one correct
//! node, and all correct nodes will have the same output.
//!
//! ## How it works
//!
//! The algorithm proceeds in _rounds_, and the number of rounds it takes until it terminates is
//! unbounded in theory but has a finite expected value. Each node keeps track of an _estimate_
//! value `e`, which is initialized to the node's own input.
//!
//! All messages are annotated with the round they belong to, but we omit that here for brevity.
//!
//! * At the beginning of each round, we multicast `BVal(e)`. It translates to: "I know that `e` is
//!   a viable output." At the same time we provide input to this round's common coin.
//!
//! * Once we receive `BVal(v)` with the same value from _f + 1_ different nodes, we know that
//!   at least one of them must be correct. So we know that `v` is a viable output. If we haven't
//!   done so already we multicast `BVal(v)`. (Even if we already multicast `BVal(!v)`).
//!
//! * Once we receive `BVal(v)` from _2 f + 1_ nodes, `v` is added to the set `bin_values`.
//!   For the _first_ value `v` in `bin_values`, we multicast `Aux(v)`.
//!
//! * Once we have received _N - f_ `Aux` messages with values in `bin_values`, we define the set
//!   `vals` of _candidate values_: the values in `bin_values` that we have received in an `Aux`.
//!   Since `bin_values` can still grow, this condition is re-checked on every `BVal` and `Aux`.
//!
//! * Once we know both `vals` and the coin value `s`:
//!
//!   * If there is only a single candidate value `b`, we set our estimate `e = b`. If `s == b`,
//!     we _decide_ `b`.
//!
//!   * If both values are candidates, we set `e = s`.
//!
//!   In either case we proceed to the next round, even after deciding: other nodes may still need
//!   our votes.
//!
//! ## Termination
//!
//! On our first decision we multicast `Done(r)` with the round `r` of that decision. We stop once
//! more than _f_ nodes, possibly including ourselves, announced a first decision in a round
//! before the round of our most recent decision.
//!
//! Votes for future rounds are buffered and replayed when we get there; votes for past rounds are
//! dropped. Each round's coin is a separate instance of a `CommonCoin`, created by a factory.

mod aux_vals;
mod bin_values;
mod binary_agreement;
mod bool_multimap;
pub mod bool_set;
mod decision_inputs;
mod done;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common_coin;
use crate::router::{Envelope, RouteError};
use crate::wire::{self, DecodeError, WireMessage};

pub use self::binary_agreement::{BinaryAgreement, CoinFactory, Step};

/// A Binary Agreement round number.
pub type Round = u16;

/// A Binary Agreement error.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum Error {
    /// Creating the common coin for a round failed.
    #[error("Error creating the common coin: {0}")]
    CreateCoin(common_coin::Error),
    /// The common coin failed to handle our input.
    #[error("Error invoking the common coin: {0}")]
    InvokeCoin(common_coin::Error),
    /// The common coin failed to handle a message.
    #[error("Error handling a common coin message: {0}")]
    HandleCoin(common_coin::Error),
    /// A coin message was for a round too far in the future.
    #[error("Error routing a coin message: {0}")]
    Route(#[from] RouteError),
    /// The round counter overflowed.
    #[error("Round number overflow")]
    RoundOverflow,
}

/// A Binary Agreement result.
pub type Result<T> = ::std::result::Result<T, Error>;

/// A Binary Agreement fault
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FaultKind {
    /// The sender sent the same `BVal` twice in one round.
    DuplicateBVal,
    /// The sender sent the same `Aux` twice in one round.
    DuplicateAux,
    /// The sender sent `Aux` votes for both values in one round. Only the first one counts.
    ConflictingAux,
    /// The sender sent more than one `Done`.
    DuplicateDone,
    /// The round's common coin reported a fault.
    Coin(common_coin::FaultKind),
}

/// The decided value, and whether the instance has terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// The agreed bit. Never changes once set.
    pub value: bool,
    /// Whether the instance has stopped and can be dropped.
    pub terminated: bool,
}

/// The kind of a vote within one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VoteKind {
    /// "The value is a viable output."
    BVal,
    /// "The value received _2 f + 1_ `BVal`s."
    Aux,
}

/// A `BVal` or `Aux` vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vote {
    /// The round the vote belongs to.
    pub round: Round,
    /// Whether this is a `BVal` or an `Aux`.
    pub kind: VoteKind,
    /// The value voted for.
    pub value: bool,
}

/// Messages sent during Binary Agreement. `M` is the common coin's message type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message<M> {
    /// A `BVal` or `Aux` vote.
    Vote(Vote),
    /// The sender decided for the first time, in the given round.
    Done {
        /// The round of the sender's first decision.
        round: Round,
    },
    /// A message for the given round's common coin.
    Coin {
        /// The coin's round.
        round: Round,
        /// The coin message.
        message: M,
    },
}

const TAG_VOTE: u8 = 0x01;
const TAG_DONE: u8 = 0x02;
const TAG_WRAPPED: u8 = 0x03;

const VOTE_BVAL: u8 = 0;
const VOTE_AUX: u8 = 1;

/// The subsystem tag of the common coin instances.
const SUBSYSTEM_COIN: u8 = 0;

impl<M: WireMessage> WireMessage for Message<M> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Message::Vote(vote) => {
                wire::put_u8(buf, TAG_VOTE);
                wire::put_u16(buf, vote.round);
                let kind = match vote.kind {
                    VoteKind::BVal => VOTE_BVAL,
                    VoteKind::Aux => VOTE_AUX,
                };
                wire::put_u8(buf, kind);
                wire::put_bool(buf, vote.value);
            }
            Message::Done { round } => {
                wire::put_u8(buf, TAG_DONE);
                wire::put_u16(buf, *round);
            }
            Message::Coin { round, message } => {
                Envelope::new(SUBSYSTEM_COIN, *round).encode(TAG_WRAPPED, buf);
                message.encode(buf);
            }
        }
    }

    fn decode(data: &mut &[u8]) -> ::std::result::Result<Self, DecodeError> {
        match wire::get_u8(data)? {
            TAG_VOTE => {
                let round = wire::get_u16(data)?;
                let kind = match wire::get_u8(data)? {
                    VOTE_BVAL => VoteKind::BVal,
                    VOTE_AUX => VoteKind::Aux,
                    kind => return Err(DecodeError::UnknownKind(kind)),
                };
                let value = wire::get_bool(data)?;
                Ok(Message::Vote(Vote { round, kind, value }))
            }
            TAG_DONE => Ok(Message::Done {
                round: wire::get_u16(data)?,
            }),
            TAG_WRAPPED => {
                let envelope = Envelope::decode(data)?;
                if envelope.subsystem != SUBSYSTEM_COIN {
                    return Err(DecodeError::UnknownSubsystem(envelope.subsystem));
                }
                let message = M::decode(data)?;
                Ok(Message::Coin {
                    round: envelope.index,
                    message,
                })
            }
            tag => Err(DecodeError::UnknownTag(tag)),
        }
    }
}
