use log::debug;

use super::{CommonCoin, Error, FaultKind, Result};
use crate::binary_agreement::Round;
use crate::{DaStep, DistAlgorithm, NodeIdT, Step};

/// A coin whose value is fixed in most rounds.
///
/// In rounds `0` and `1` modulo 5 the value is `true`, in `2` and `3` it is `false`. Only in rounds
/// `4` modulo 5 the real coin `C` is flipped.
#[derive(Debug)]
pub enum SemiCoin<N, C> {
    /// The value is predetermined by the round number.
    Fixed {
        /// Our own ID.
        our_id: N,
        /// The coin value.
        value: bool,
    },
    /// The value comes from a real coin.
    Real(C),
}

impl<N: NodeIdT, C: CommonCoin<N>> SemiCoin<N, C> {
    /// Creates the coin for `round`. The real coin is only constructed if this round needs it.
    pub fn new<F>(our_id: N, round: Round, real_coin: F) -> Result<Self>
    where
        F: FnOnce() -> Result<C>,
    {
        let coin = match round % 5 {
            0 | 1 => SemiCoin::Fixed {
                our_id,
                value: true,
            },
            2 | 3 => SemiCoin::Fixed {
                our_id,
                value: false,
            },
            _ => SemiCoin::Real(real_coin()?),
        };
        Ok(coin)
    }

    /// Returns `true` if the value is predetermined by the round number.
    pub fn is_fixed(&self) -> bool {
        match self {
            SemiCoin::Fixed { .. } => true,
            SemiCoin::Real(_) => false,
        }
    }
}

impl<N: NodeIdT, C: CommonCoin<N>> DistAlgorithm for SemiCoin<N, C> {
    type NodeId = N;
    type Input = ();
    type Output = bool;
    type Message = C::Message;
    type Error = Error;
    type FaultKind = FaultKind;

    fn handle_input(&mut self, input: ()) -> Result<DaStep<Self>> {
        match self {
            SemiCoin::Fixed { .. } => Ok(Step::default()),
            SemiCoin::Real(coin) => coin.handle_input(input),
        }
    }

    fn handle_message(&mut self, sender_id: &N, message: C::Message) -> Result<DaStep<Self>> {
        match self {
            SemiCoin::Fixed { our_id, .. } => {
                debug!("{:?} fixed coin ignores message from {:?}", our_id, sender_id);
                Ok(Step::default())
            }
            SemiCoin::Real(coin) => coin.handle_message(sender_id, message),
        }
    }

    fn output(&self) -> Option<bool> {
        match self {
            SemiCoin::Fixed { value, .. } => Some(*value),
            SemiCoin::Real(coin) => coin.output(),
        }
    }

    fn terminated(&self) -> bool {
        match self {
            SemiCoin::Fixed { .. } => true,
            SemiCoin::Real(coin) => coin.terminated(),
        }
    }

    fn our_id(&self) -> &N {
        match self {
            SemiCoin::Fixed { our_id, .. } => our_id,
            SemiCoin::Real(coin) => coin.our_id(),
        }
    }

    fn status(&self) -> String {
        match self {
            SemiCoin::Fixed { value, .. } => format!("{{CC:semi, fixed={}}}", value),
            SemiCoin::Real(coin) => coin.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::*;
    use crate::common_coin::BlsCoin;
    use crate::crypto::SecretKeySet;
    use crate::NetworkInfo;

    #[test]
    fn schedule_repeats_every_five_rounds() {
        let mut rng = XorShiftRng::from_seed([1; 16]);
        let sk_set = SecretKeySet::random(0, &mut rng);
        let netinfo = Arc::new(NetworkInfo::new(0usize, vec![0], 0).expect("netinfo"));
        let mut fixed = Vec::new();
        for round in 0..10 {
            let real = || {
                BlsCoin::new(
                    netinfo.clone(),
                    sk_set.public_keys(),
                    sk_set.secret_key_share(0),
                    vec![round as u8],
                )
            };
            let coin = SemiCoin::new(0, round, real).expect("coin");
            fixed.push(coin.is_fixed());
            match round % 5 {
                0 | 1 => assert_eq!(coin.output(), Some(true)),
                2 | 3 => assert_eq!(coin.output(), Some(false)),
                _ => assert_eq!(coin.output(), None),
            }
        }
        let expected = [true, true, true, true, false];
        assert_eq!(fixed, [&expected[..], &expected[..]].concat());
    }
}
