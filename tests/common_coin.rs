#![deny(unused_must_use)]
//! Tests of the common coin.
//!
//! All correct nodes must output the same value, and it must be the lowest bit of the master key's
//! signature of the nonce, no matter which shares arrived first.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use log::info;
use proptest::prelude::ProptestConfig;
use proptest::proptest;
use rand::SeedableRng;

use bft_agreement::common_coin::{BlsCoin, CoinNonce};
use bft_agreement::crypto::{PublicKeySet, SecretKeyShare, SIG_SIZE};
use bft_agreement::{util, DistAlgorithm};
use bft_agreement_testing::proptest::{gen_rng, gen_seed, NetworkDimension, TestRng, TestRngSeed};
use bft_agreement_testing::{
    Adversary, NetBuilder, NewNodeInfo, NodeOrderAdversary, ReorderingAdversary,
};

type NodeId = u16;

/// The keys handed out to the nodes of one network.
#[derive(Default)]
struct Keys {
    pk_set: Option<PublicKeySet>,
    shares: BTreeMap<usize, SecretKeyShare>,
}

impl Keys {
    /// Returns the value of the coin, computed from the master signature.
    fn expected_coin(&self, nonce: &[u8]) -> bool {
        let pk_set = self.pk_set.as_ref().expect("no keys recorded");
        let sig_shares: BTreeMap<usize, _> = self
            .shares
            .iter()
            .map(|(idx, sk_share)| (*idx, sk_share.sign(nonce)))
            .collect();
        let sig = pk_set
            .combine_signatures(sig_shares.iter().map(|(idx, share)| (*idx, share)))
            .expect("combining all shares");
        assert!(pk_set.public_key().verify(&sig, nonce));
        sig.to_bytes()[SIG_SIZE - 1] & 1 == 1
    }
}

/// Flips one coin in a network with silent faulty nodes.
fn flip_coin<A, F>(
    size: usize,
    num_faulty: usize,
    threshold: usize,
    new_adversary: &F,
    round: u16,
    rng: &mut TestRng,
) where
    A: Adversary<BlsCoin<NodeId>>,
    F: Fn() -> A,
{
    let nonce = CoinNonce::new(b"coin test", 0, round)
        .to_bytes()
        .expect("nonce");
    let keys = Rc::new(RefCell::new(Keys::default()));
    let node_keys = keys.clone();
    let node_nonce = nonce.clone();
    let mut net = NetBuilder::new(0..size as u16)
        .num_faulty(num_faulty)
        .threshold(threshold)
        .message_limit(size * size)
        .adversary(new_adversary())
        .using(move |node_info: NewNodeInfo<BlsCoin<NodeId>>| {
            let idx = node_info.id as usize;
            let mut keys = node_keys.borrow_mut();
            keys.pk_set = Some(node_info.public_key_set.clone());
            keys.shares.insert(idx, node_info.secret_key_share.clone());
            BlsCoin::new(
                Arc::new(node_info.netinfo),
                node_info.public_key_set,
                node_info.secret_key_share,
                node_nonce.clone(),
            )
            .expect("Failed to create a BlsCoin instance.")
        })
        .build(rng)
        .expect("Could not construct test network.");

    let _ = net.broadcast_input(&()).expect("input failed");
    while !net.correct_nodes_terminated() {
        let _ = net.crank_expect(rng);
    }

    let expected = keys.borrow().expected_coin(&nonce);
    for node in net.correct_nodes() {
        assert_eq!(node.algorithm().output(), Some(expected));
    }
}

fn test_common_coin_different_sizes<A, F>(new_adversary: F, seed: TestRngSeed)
where
    A: Adversary<BlsCoin<NodeId>>,
    F: Fn() -> A,
{
    // This returns an error in all but the first test.
    let _ = env_logger::try_init();

    let mut rng = TestRng::from_seed(seed);
    for &size in &[1, 2, 3, 4, 7, 10] {
        let num_faulty = util::max_faulty(size);
        info!(
            "Network size: {} good nodes, {} faulty nodes",
            size - num_faulty,
            num_faulty
        );
        for round in 0..4 {
            flip_coin(size, num_faulty, num_faulty, &new_adversary, round, &mut rng);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 5, .. ProptestConfig::default()
    })]

    #[test]
    fn common_coin_first_delivery_first(seed in gen_seed()) {
        test_common_coin_different_sizes(NodeOrderAdversary::new, seed)
    }

    #[test]
    fn common_coin_random_delivery(seed in gen_seed()) {
        test_common_coin_different_sizes(ReorderingAdversary::new, seed)
    }

    #[test]
    fn common_coin_any_dimension(dimension in NetworkDimension::range(1, 12), rng in gen_rng()) {
        let mut rng = rng;
        let faulty = dimension.faulty();
        flip_coin(dimension.size(), faulty, faulty, &ReorderingAdversary::new, 0, &mut rng)
    }
}

/// Three nodes recover the same coin whether one share suffices or all three are needed.
#[test]
fn three_nodes_low_and_high_threshold() {
    let _ = env_logger::try_init();
    let mut rng = TestRng::from_seed([1; 16]);
    for &threshold in &[0, 2] {
        for round in 0..3 {
            flip_coin(3, 0, threshold, &ReorderingAdversary::new, round, &mut rng);
        }
    }
}

/// Both coin values must occur over a range of nonces.
#[test]
fn coin_is_not_constant() {
    let _ = env_logger::try_init();
    let mut rng = TestRng::from_seed([2; 16]);
    let mut keys = Keys::default();
    let sk_set = bft_agreement::crypto::SecretKeySet::random(1, &mut rng);
    keys.pk_set = Some(sk_set.public_keys());
    for idx in 0..2 {
        keys.shares.insert(idx, sk_set.secret_key_share(idx));
    }
    let values: Vec<bool> = (0..32u16)
        .map(|round| {
            let nonce = CoinNonce::new(b"coin test", 0, round)
                .to_bytes()
                .expect("nonce");
            keys.expected_coin(&nonce)
        })
        .collect();
    assert!(values.contains(&true));
    assert!(values.contains(&false));
}
