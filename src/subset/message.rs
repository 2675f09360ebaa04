use serde::{Deserialize, Serialize};

use crate::binary_agreement;
use crate::broadcast;
use crate::router::Envelope;
use crate::wire::{DecodeError, WireMessage};

/// Message from Subset to remote nodes. `M` is the common coin's message type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message<M> {
    /// The index of the proposer whose contribution this message is about.
    pub proposer_idx: u16,
    /// The wrapped broadcast or agreement message.
    pub content: MessageContent<M>,
}

/// A message about a particular proposer's contribution.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum MessageContent<M> {
    /// A wrapped message for the broadcast instance, to deliver the proposed value.
    Broadcast(broadcast::Message),
    /// A wrapped message for the agreement instance, to decide on whether to accept the value.
    Agreement(binary_agreement::Message<M>),
}

impl<M> MessageContent<M> {
    /// Returns a `Message` with this content and the specified proposer index.
    pub(super) fn with(self, proposer_idx: u16) -> Message<M> {
        Message {
            proposer_idx,
            content: self,
        }
    }
}

const TAG_WRAPPED: u8 = 0x01;

const SUBSYSTEM_BROADCAST: u8 = 0;
const SUBSYSTEM_AGREEMENT: u8 = 1;

impl<M: WireMessage> WireMessage for Message<M> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self.content {
            MessageContent::Broadcast(ref msg) => {
                Envelope::new(SUBSYSTEM_BROADCAST, self.proposer_idx).encode(TAG_WRAPPED, buf);
                msg.encode(buf);
            }
            MessageContent::Agreement(ref msg) => {
                Envelope::new(SUBSYSTEM_AGREEMENT, self.proposer_idx).encode(TAG_WRAPPED, buf);
                msg.encode(buf);
            }
        }
    }

    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        crate::wire::expect_tag(data, TAG_WRAPPED)?;
        let envelope = Envelope::decode(data)?;
        let content = match envelope.subsystem {
            SUBSYSTEM_BROADCAST => MessageContent::Broadcast(broadcast::Message::decode(data)?),
            SUBSYSTEM_AGREEMENT => {
                MessageContent::Agreement(binary_agreement::Message::decode(data)?)
            }
            subsystem => return Err(DecodeError::UnknownSubsystem(subsystem)),
        };
        Ok(content.with(envelope.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_coin;

    type AcsMessage = Message<common_coin::Message>;

    #[test]
    fn wrapped_agreement_message() {
        let msg: AcsMessage =
            MessageContent::Agreement(binary_agreement::Message::Done { round: 1 }).with(3);
        let bytes = msg.to_bytes();
        assert_eq!(bytes, vec![0x01, 0x01, 0x00, 0x03, 0x02, 0x00, 0x01]);
        assert_eq!(AcsMessage::from_bytes(&bytes), Ok(msg));
    }

    #[test]
    fn wrapped_broadcast_message() {
        let msg: AcsMessage = MessageContent::Broadcast(broadcast::Message::Propose(vec![9])).with(0);
        let bytes = msg.to_bytes();
        assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0, 0, 0, 1, 9]);
        assert_eq!(AcsMessage::from_bytes(&bytes), Ok(msg));
    }

    #[test]
    fn rejects_unknown_subsystem() {
        assert_eq!(
            AcsMessage::from_bytes(&[0x01, 0x02, 0x00, 0x00, 0x01]),
            Err(DecodeError::UnknownSubsystem(2))
        );
        assert_eq!(
            AcsMessage::from_bytes(&[0x01, 0x01, 0x00]),
            Err(DecodeError::Truncated)
        );
    }
}
