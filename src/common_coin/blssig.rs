use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::{fmt, result};

use derivative::Derivative;
use hex_fmt::HexFmt;
use log::{debug, info, warn};

use super::{Error, FaultKind, Message, Result};
use crate::crypto::{PublicKeySet, SecretKeyShare, Signature, SignatureShare, SIG_SIZE};
use crate::fault_log::FaultLog;
use crate::{util, DistAlgorithm, NetworkInfo, NodeIdT, Target};

/// A `BlsCoin` step.
pub type Step<N> = crate::Step<Message, N, FaultKind>;

/// A common coin backed by BLS threshold signatures.
///
/// On input, broadcasts our signature share of the session id. Once `pk_set.threshold() + 1`
/// shares are collected, combines them into the unique signature and outputs its lowest bit.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct BlsCoin<N> {
    netinfo: Arc<NetworkInfo<N>>,
    /// The public key set for threshold signatures.
    pk_set: PublicKeySet,
    /// Our secret key share.
    #[derivative(Debug = "ignore")]
    sk_share: SecretKeyShare,
    /// The data to be signed. Must be unique per coin flip.
    #[derivative(Debug(format_with = "util::fmt_hex"))]
    session_id: Vec<u8>,
    /// All received signature shares, including our own.
    received_shares: BTreeMap<N, SignatureShare>,
    /// Senders whose shares failed verification. Their shares are not combined.
    invalid_senders: BTreeSet<N>,
    /// Whether we already sent our share.
    had_input: bool,
    /// The coin value, once known.
    output: Option<bool>,
}

impl<N: NodeIdT> DistAlgorithm for BlsCoin<N> {
    type NodeId = N;
    type Input = ();
    type Output = bool;
    type Message = Message;
    type Error = Error;
    type FaultKind = FaultKind;

    /// Sends our signature share if not yet sent.
    fn handle_input(&mut self, _input: ()) -> Result<Step<N>> {
        Ok(self.sign())
    }

    /// Receives a share from a remote node.
    fn handle_message(&mut self, sender_id: &N, message: Message) -> Result<Step<N>> {
        Ok(self.handle_share(sender_id, message))
    }

    fn output(&self) -> Option<bool> {
        self.output
    }

    fn terminated(&self) -> bool {
        self.output.is_some()
    }

    fn our_id(&self) -> &N {
        self.netinfo.our_id()
    }

    fn status(&self) -> String {
        format!(
            "{{CC:blssig, shares={}/{}, input={}, out={:?}}}",
            self.valid_share_count(),
            self.required_shares(),
            self.had_input,
            self.output
        )
    }
}

impl<N: NodeIdT> BlsCoin<N> {
    /// Creates a new coin that signs `session_id`.
    ///
    /// All nodes must use the same session id for the same coin flip, and a different one for
    /// every other flip, or the coin values become predictable.
    pub fn new(
        netinfo: Arc<NetworkInfo<N>>,
        pk_set: PublicKeySet,
        sk_share: SecretKeyShare,
        session_id: Vec<u8>,
    ) -> Result<Self> {
        let required = pk_set.threshold() + 1;
        if required > netinfo.num_nodes() {
            return Err(Error::ThresholdTooHigh {
                required,
                num_nodes: netinfo.num_nodes(),
            });
        }
        Ok(BlsCoin {
            netinfo,
            pk_set,
            sk_share,
            session_id,
            received_shares: BTreeMap::new(),
            invalid_senders: BTreeSet::new(),
            had_input: false,
            output: None,
        })
    }

    /// Signs the session id and multicasts the share, then tries to combine the collected shares.
    fn sign(&mut self) -> Step<N> {
        if self.had_input {
            return Step::default();
        }
        self.had_input = true;
        let share = self.sk_share.sign(&self.session_id);
        let mut step = Step::default();
        if self.netinfo.num_nodes() > 1 {
            step.messages.push(Target::All.message(Message(share.clone())));
        }
        let our_id = self.our_id().clone();
        self.received_shares.insert(our_id, share);
        step.extend(self.try_output());
        step
    }

    /// Handles an incoming share.
    fn handle_share(&mut self, sender_id: &N, message: Message) -> Step<N> {
        if !self.netinfo.is_node(sender_id) {
            debug!("{} dropping share from unknown node {:?}", self, sender_id);
            return Step::default();
        }
        if self.output.is_some() || sender_id == self.our_id() {
            return Step::default();
        }
        if self.received_shares.contains_key(sender_id) {
            return FaultLog::init(sender_id.clone(), FaultKind::DuplicateShare).into();
        }
        self.received_shares.insert(sender_id.clone(), message.0);
        self.try_output()
    }

    fn required_shares(&self) -> usize {
        self.pk_set.threshold() + 1
    }

    fn valid_share_count(&self) -> usize {
        self.received_shares.len() - self.invalid_senders.len()
    }

    /// Combines the shares once there are enough, and outputs the coin if the result verifies.
    ///
    /// If it doesn't, every share is verified on its own. Invalid ones are reported and left out
    /// of all further attempts.
    fn try_output(&mut self) -> Step<N> {
        let mut step = Step::default();
        if !self.had_input || self.output.is_some() {
            return step;
        }
        while self.valid_share_count() >= self.required_shares() {
            if let Some(sig) = self.combine_and_verify_sig() {
                let value = coin_value(&sig);
                info!("{} output {}", self, value);
                self.output = Some(value);
                return step;
            }
            let invalid = self.find_invalid_shares();
            if invalid.is_empty() {
                // The combination failed although every share verifies on its own. No new
                // information will come from retrying with the same shares.
                warn!("{} could not combine valid shares", self);
                return step;
            }
            for id in invalid {
                warn!("{} invalid signature share from {:?}", self, id);
                step.fault_log.append(id.clone(), FaultKind::InvalidShare);
                self.invalid_senders.insert(id);
            }
        }
        debug!(
            "{} has {} of {} shares",
            self,
            self.valid_share_count(),
            self.required_shares()
        );
        step
    }

    /// Combines all shares from senders not known to be faulty, and returns the signature if it
    /// is valid.
    fn combine_and_verify_sig(&self) -> Option<Signature> {
        let netinfo = &self.netinfo;
        let invalid = &self.invalid_senders;
        let shares = self
            .received_shares
            .iter()
            .filter(|(id, _)| !invalid.contains(*id))
            .filter_map(|(id, share)| netinfo.node_index(id).map(|idx| (idx, share)));
        let sig = self.pk_set.combine_signatures(shares).ok()?;
        if self.pk_set.public_key().verify(&sig, &self.session_id) {
            Some(sig)
        } else {
            None
        }
    }

    /// Returns the senders of shares that don't verify against their public key share.
    fn find_invalid_shares(&self) -> Vec<N> {
        self.received_shares
            .iter()
            .filter(|(id, _)| !self.invalid_senders.contains(*id))
            .filter(|(id, share)| match self.netinfo.node_index(id) {
                Some(idx) => !self
                    .pk_set
                    .public_key_share(idx)
                    .verify(share, &self.session_id),
                None => true,
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl<N: NodeIdT> fmt::Display for BlsCoin<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{:?} BlsCoin({:0.10})", self.our_id(), HexFmt(&self.session_id))
    }
}

/// The coin value: the lowest bit of the signature's encoding.
fn coin_value(sig: &Signature) -> bool {
    sig.to_bytes()[SIG_SIZE - 1] & 1 == 1
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::*;
    use crate::crypto::SecretKeySet;

    #[test]
    fn single_node_coin_needs_no_messages() {
        let mut rng = XorShiftRng::from_seed([3; 16]);
        let sk_set = SecretKeySet::random(0, &mut rng);
        let netinfo = Arc::new(NetworkInfo::new(0usize, vec![0], 0).expect("netinfo"));
        let session_id = b"single".to_vec();
        let mut coin = BlsCoin::new(
            netinfo,
            sk_set.public_keys(),
            sk_set.secret_key_share(0),
            session_id.clone(),
        )
        .expect("coin");
        assert_eq!(coin.output(), None);
        let step = coin.handle_input(()).expect("input");
        assert!(step.is_empty());
        let share = sk_set.secret_key_share(0).sign(&session_id);
        let sig = sk_set
            .public_keys()
            .combine_signatures(vec![(0usize, &share)])
            .expect("combine");
        assert_eq!(coin.output(), Some(coin_value(&sig)));
        assert!(coin.terminated());
    }

    #[test]
    fn invalid_share_is_reported_and_skipped() {
        let mut rng = XorShiftRng::from_seed([5; 16]);
        let sk_set = SecretKeySet::random(1, &mut rng);
        let pk_set = sk_set.public_keys();
        let expected_pk_set = pk_set.clone();
        let netinfo = Arc::new(NetworkInfo::new(0usize, 0..4, 1).expect("netinfo"));
        let session_id = b"session".to_vec();
        let mut coin = BlsCoin::new(
            netinfo,
            pk_set,
            sk_set.secret_key_share(0),
            session_id.clone(),
        )
        .expect("coin");
        let step = coin.handle_input(()).expect("input");
        assert_eq!(step.messages.len(), 1);

        // Node 1 signs the wrong data.
        let bad_share = sk_set.secret_key_share(1).sign(b"something else");
        let step = coin.handle_message(&1, Message(bad_share)).expect("message");
        assert_eq!(coin.output(), None);
        assert_eq!(step.fault_log.len(), 1);
        assert_eq!(step.fault_log.0[0].node_id, 1);
        assert_eq!(step.fault_log.0[0].kind, FaultKind::InvalidShare);

        let good_share = sk_set.secret_key_share(2).sign(&session_id);
        let step = coin.handle_message(&2, Message(good_share.clone())).expect("message");
        assert!(step.fault_log.is_empty());
        let own_share = sk_set.secret_key_share(0).sign(&session_id);
        let sig = expected_pk_set
            .combine_signatures(vec![(0usize, &own_share), (2, &good_share)])
            .expect("combine");
        assert!(expected_pk_set.public_key().verify(&sig, &session_id));
        assert_eq!(coin.output(), Some(coin_value(&sig)));
    }

    #[test]
    fn rejects_unreachable_threshold() {
        let mut rng = XorShiftRng::from_seed([9; 16]);
        let sk_set = SecretKeySet::random(3, &mut rng);
        let netinfo = Arc::new(NetworkInfo::new(0usize, 0..3, 0).expect("netinfo"));
        let result = BlsCoin::new(
            netinfo,
            sk_set.public_keys(),
            sk_set.secret_key_share(0),
            vec![],
        );
        assert_eq!(
            result.map(|_| ()),
            Err(Error::ThresholdTooHigh {
                required: 4,
                num_nodes: 3
            })
        );
    }
}
