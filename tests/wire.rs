//! Decoding arbitrary bytes must fail gracefully, and every successfully decoded message must
//! encode back to the same bytes.

use proptest::collection::vec;
use proptest::prelude::{any, ProptestConfig};
use proptest::{prop_assert_eq, proptest};

use bft_agreement::{binary_agreement, broadcast, common_coin, subset, WireMessage};

type AbaMessage = binary_agreement::Message<common_coin::Message>;
type AcsMessage = subset::Message<common_coin::Message>;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 1000, .. ProptestConfig::default()
    })]

    #[test]
    fn broadcast_decoding_is_total(bytes in vec(any::<u8>(), 0..64)) {
        if let Ok(msg) = broadcast::Message::from_bytes(&bytes) {
            prop_assert_eq!(msg.to_bytes(), bytes);
        }
    }

    #[test]
    fn agreement_decoding_is_total(bytes in vec(any::<u8>(), 0..64)) {
        if let Ok(msg) = AbaMessage::from_bytes(&bytes) {
            prop_assert_eq!(msg.to_bytes(), bytes);
        }
    }

    #[test]
    fn subset_decoding_is_total(bytes in vec(any::<u8>(), 0..64)) {
        if let Ok(msg) = AcsMessage::from_bytes(&bytes) {
            prop_assert_eq!(msg.to_bytes(), bytes);
        }
    }

    #[test]
    fn coin_decoding_is_total(bytes in vec(any::<u8>(), 0..128)) {
        let _ = common_coin::Message::from_bytes(&bytes);
    }

    #[test]
    fn truncated_votes_are_rejected(round in any::<u16>(), len in 0usize..5) {
        let vote = AbaMessage::Vote(binary_agreement::Vote {
            round,
            kind: binary_agreement::VoteKind::BVal,
            value: true,
        });
        let bytes = vote.to_bytes();
        prop_assert_eq!(
            AbaMessage::from_bytes(&bytes[..len]),
            Err(bft_agreement::DecodeError::Truncated)
        );
    }
}
