//! # Common Coin
//!
//! A common coin produces one shared, unpredictable bit. Every node inputs `()`, and once enough
//! nodes have done so, every correct node outputs the same `bool`. Nobody, including a coalition of
//! up to _f_ faulty nodes, can predict the value before at least one correct node has provided its
//! input.
//!
//! ## How it works
//!
//! The bit is derived from a threshold signature of a session id. A unique signature scheme is
//! used: for each public key and message there is exactly one valid signature, no matter which
//! shares it was combined from. On input, each node signs the session id with its secret key
//! share and multicasts the share. Once _t_ shares are collected, they are combined into the full
//! signature, which is verified against the master public key. Its lowest bit is the coin.
//!
//! A share from a faulty node can make the combination fail. In that case every share is checked
//! individually, the invalid ones are reported and excluded, and combination is retried whenever
//! another share arrives.
//!
//! The `SemiCoin` wrapper fixes the coin for four out of every five rounds, and only flips the real
//! coin in the fifth. That makes tie-break rounds reproducible in tests.

mod blssig;
mod semi;

use std::fmt;

use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binary_agreement::Round;
use crate::crypto::{SignatureShare, SIG_SIZE};
use crate::wire::{self, DecodeError, WireMessage};
use crate::DistAlgorithm;

pub use self::blssig::BlsCoin;
pub use self::semi::SemiCoin;

/// A common coin error.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum Error {
    /// More shares are required than there are nodes: the coin could never be flipped.
    #[error("Coin needs {required} shares but there are only {num_nodes} nodes")]
    ThresholdTooHigh {
        /// The number of shares needed to flip the coin.
        required: usize,
        /// The total number of nodes.
        num_nodes: usize,
    },
    /// The session id could not be serialized.
    #[error("Failed to serialize the coin nonce: {0}")]
    NonceSerialization(String),
}

/// A common coin result.
pub type Result<T> = ::std::result::Result<T, Error>;

/// A coin fault
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FaultKind {
    /// The sender's share does not verify against its public key share.
    InvalidShare,
    /// The sender sent more than one share.
    DuplicateShare,
}

/// A common coin message: the sender's signature share of the session id.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message(pub(crate) SignatureShare);

impl Message {
    /// Returns the signature share.
    pub fn share(&self) -> &SignatureShare {
        &self.0
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Share({:0.10})", HexFmt(&self.0.to_bytes()[..]))
    }
}

const TAG_SHARE: u8 = 0x01;

impl WireMessage for Message {
    fn encode(&self, buf: &mut Vec<u8>) {
        wire::put_u8(buf, TAG_SHARE);
        wire::put_bytes_u16(buf, &self.0.to_bytes()[..]);
    }

    fn decode(data: &mut &[u8]) -> std::result::Result<Self, DecodeError> {
        wire::expect_tag(data, TAG_SHARE)?;
        let bytes = wire::get_bytes_u16(data)?;
        if bytes.len() != SIG_SIZE {
            return Err(DecodeError::InvalidShare);
        }
        let mut array = [0u8; SIG_SIZE];
        array.copy_from_slice(bytes);
        let share = SignatureShare::from_bytes(&array).map_err(|_| DecodeError::InvalidShare)?;
        Ok(Message(share))
    }
}

/// An algorithm that flips a common coin: it takes no input but a trigger, and outputs a `bool`.
pub trait CommonCoin<N>:
    DistAlgorithm<NodeId = N, Input = (), Output = bool, Error = Error, FaultKind = FaultKind>
{
}

impl<N, C> CommonCoin<N> for C where
    C: DistAlgorithm<NodeId = N, Input = (), Output = bool, Error = Error, FaultKind = FaultKind>
{
}

/// The data signed by a coin: unique to one protocol session, one proposer and one round.
#[derive(Clone, Debug, Serialize)]
pub struct CoinNonce<'a> {
    session_id: &'a [u8],
    proposer_idx: u16,
    round: Round,
}

impl<'a> CoinNonce<'a> {
    /// Creates the nonce for the coin of the given session, proposer and round.
    pub fn new(session_id: &'a [u8], proposer_idx: u16, round: Round) -> Self {
        CoinNonce {
            session_id,
            proposer_idx,
            round,
        }
    }

    /// Returns the byte string to be signed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|err| Error::NonceSerialization(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::*;
    use crate::crypto::SecretKeySet;

    #[test]
    fn share_wire_layout() {
        let mut rng = XorShiftRng::from_seed([7; 16]);
        let sk_set = SecretKeySet::random(1, &mut rng);
        let share = sk_set.secret_key_share(0).sign(b"nonce");
        let bytes = Message(share.clone()).to_bytes();
        assert_eq!(bytes.len(), 3 + SIG_SIZE);
        assert_eq!(&bytes[..3], &[0x01, 0x00, SIG_SIZE as u8]);
        assert_eq!(Message::from_bytes(&bytes), Ok(Message(share)));
    }

    #[test]
    fn share_with_wrong_length_is_rejected() {
        assert_eq!(
            Message::from_bytes(&[0x01, 0x00, 0x02, 0xaa, 0xbb]),
            Err(DecodeError::InvalidShare)
        );
        assert_eq!(
            Message::from_bytes(&[0x02, 0x00, 0x00]),
            Err(DecodeError::UnknownTag(0x02))
        );
    }

    #[test]
    fn nonces_differ_by_round() {
        let a = CoinNonce::new(b"session", 1, 4).to_bytes().expect("nonce");
        let b = CoinNonce::new(b"session", 1, 5).to_bytes().expect("nonce");
        assert_ne!(a, b);
    }
}
