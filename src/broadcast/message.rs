use std::fmt::{self, Debug};

use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

use crate::wire::{self, DecodeError, WireMessage};

/// The three kinds of message sent during the reliable broadcast. Each carries the full value.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Message {
    /// The value, sent by the proposer.
    Propose(Vec<u8>),
    /// A copy of the value received from the proposer, multicast by every node.
    Echo(Vec<u8>),
    /// Indicates that the sender knows that every correct node will eventually output the value.
    Ready(Vec<u8>),
}

const TAG_BROADCAST: u8 = 0x01;

const KIND_PROPOSE: u8 = 0;
const KIND_ECHO: u8 = 1;
const KIND_READY: u8 = 2;

impl Message {
    /// Returns the value carried by the message.
    pub fn value(&self) -> &[u8] {
        match self {
            Message::Propose(value) | Message::Echo(value) | Message::Ready(value) => value,
        }
    }
}

impl Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Message::Propose(ref v) => write!(f, "Propose({:0.10})", HexFmt(v)),
            Message::Echo(ref v) => write!(f, "Echo({:0.10})", HexFmt(v)),
            Message::Ready(ref v) => write!(f, "Ready({:0.10})", HexFmt(v)),
        }
    }
}

impl WireMessage for Message {
    fn encode(&self, buf: &mut Vec<u8>) {
        let kind = match self {
            Message::Propose(_) => KIND_PROPOSE,
            Message::Echo(_) => KIND_ECHO,
            Message::Ready(_) => KIND_READY,
        };
        wire::put_u8(buf, TAG_BROADCAST);
        wire::put_u8(buf, kind);
        wire::put_bytes_u32(buf, self.value());
    }

    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        wire::expect_tag(data, TAG_BROADCAST)?;
        let kind = wire::get_u8(data)?;
        if kind > KIND_READY {
            return Err(DecodeError::UnknownKind(kind));
        }
        let value = wire::get_bytes_u32(data)?.to_vec();
        Ok(match kind {
            KIND_PROPOSE => Message::Propose(value),
            KIND_ECHO => Message::Echo(value),
            _ => Message::Ready(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout() {
        let msg = Message::Echo(vec![0xaa, 0xbb]);
        let bytes = msg.to_bytes();
        assert_eq!(bytes, vec![0x01, 0x01, 0x00, 0x00, 0x00, 0x02, 0xaa, 0xbb]);
        assert_eq!(Message::from_bytes(&bytes), Ok(msg));
        assert_eq!(format!("{:?}", Message::Ready(vec![1, 2])), "Ready(0102)");
    }

    #[test]
    fn rejects_bad_kind_and_short_value() {
        assert_eq!(
            Message::from_bytes(&[0x01, 0x03, 0, 0, 0, 0]),
            Err(DecodeError::UnknownKind(3))
        );
        assert_eq!(
            Message::from_bytes(&[0x01, 0x00, 0xff, 0xff, 0xff, 0xff, 0x00]),
            Err(DecodeError::Truncated)
        );
        assert_eq!(
            Message::from_bytes(&[0x02, 0x00]),
            Err(DecodeError::UnknownTag(0x02))
        );
    }
}
