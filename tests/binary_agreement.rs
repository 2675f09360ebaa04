#![deny(unused_must_use)]
//! Tests of the Binary Agreement protocol
//!
//! Only one proposer instance is tested. Each of the nodes in the simulated network run only one
//! instance of Binary Agreement. This way we only test correctness of the protocol and not message
//! dispatch between multiple proposers.
//!
//! There are three properties that are tested:
//!
//! - Agreement: If any correct node outputs the bit `b`, then every correct node outputs `b`.
//!
//! - Termination: If all correct nodes receive input, then every correct node outputs a bit.
//!
//! - Validity: If any correct node outputs `b`, then at least one correct node received `b` as
//! input.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::info;
use proptest::prelude::ProptestConfig;
use proptest::proptest;
use rand::SeedableRng;

use bft_agreement::binary_agreement::{BinaryAgreement, CoinFactory, Message, Vote, VoteKind};
use bft_agreement::common_coin::{BlsCoin, CoinNonce, SemiCoin};
use bft_agreement::DistAlgorithm;
use bft_agreement_testing::proptest::{gen_seed, NetworkDimension, TestRng, TestRngSeed};
use bft_agreement_testing::util::randomly;
use bft_agreement_testing::{
    Adversary, NetBuilder, NewNodeInfo, NodeOrderAdversary, ReorderingAdversary, VirtualNet,
};

type NodeId = usize;
type Coin = SemiCoin<NodeId, BlsCoin<NodeId>>;
type Algo = BinaryAgreement<NodeId, Coin>;

/// Creates a node whose coins sign a nonce derived from the round.
fn new_binary_agreement(node_info: NewNodeInfo<Algo>) -> Algo {
    let netinfo = Arc::new(node_info.netinfo);
    let coin_netinfo = netinfo.clone();
    let our_id = node_info.id;
    let pk_set = node_info.public_key_set;
    let sk_share = node_info.secret_key_share;
    let coin_factory: CoinFactory<Coin> = Arc::new(move |round| {
        SemiCoin::new(our_id, round, || {
            let nonce = CoinNonce::new(b"binary agreement", 0, round).to_bytes()?;
            BlsCoin::new(
                coin_netinfo.clone(),
                pk_set.clone(),
                sk_share.clone(),
                nonce,
            )
        })
    });
    BinaryAgreement::new(netinfo, coin_factory)
}

/// Inputs `input` into every correct node, or a random bit for each if it is `None`, and runs the
/// network until all correct nodes terminated. Checks agreement and validity.
fn run_binary_agreement<A>(mut net: VirtualNet<Algo, A>, input: Option<bool>, rng: &mut TestRng)
where
    A: Adversary<Algo>,
{
    let ids: Vec<NodeId> = net.correct_nodes().map(|node| *node.id()).collect();
    let mut inputs = BTreeSet::new();
    for id in ids {
        let value = input.unwrap_or_else(|| randomly(0.5, rng));
        inputs.insert(value);
        let _ = net.send_input(id, value).expect("input failed");
    }

    net.crank_until_terminated(rng)
        .expect("network stopped before all correct nodes terminated");

    let mut expected = None;
    for node in net.correct_nodes() {
        let decision = node.algorithm().output().expect("terminated without a decision");
        assert!(decision.terminated);
        assert!(
            inputs.contains(&decision.value),
            "decided a value that no correct node proposed"
        );
        match expected {
            None => expected = Some(decision.value),
            Some(value) => assert_eq!(value, decision.value, "correct nodes disagree"),
        }
    }
}

fn test_binary_agreement(dimension: NetworkDimension, input: Option<bool>, seed: TestRngSeed) {
    let mut rng = TestRng::from_seed(seed);
    let size = dimension.size();
    info!(
        "Test start: {} good nodes and {} faulty nodes, input: {:?}",
        size - dimension.faulty(),
        dimension.faulty(),
        input
    );
    let net = NetBuilder::new(0..size)
        .num_faulty(dimension.faulty())
        .message_limit(10_000 * size)
        .adversary(ReorderingAdversary::new())
        .using(new_binary_agreement)
        .build(&mut rng)
        .expect("Could not construct test network.");
    run_binary_agreement(net, input, &mut rng);
    info!("Test success: {:?}, input: {:?}", dimension, input);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 20, .. ProptestConfig::default()
    })]

    #[test]
    fn agreement_on_random_input(dimension in NetworkDimension::range(1, 10), seed in gen_seed()) {
        let _ = env_logger::try_init();
        test_binary_agreement(dimension, None, seed)
    }

    #[test]
    fn agreement_on_unanimous_input(
        dimension in NetworkDimension::range(1, 10),
        input in proptest::bool::ANY,
        seed in gen_seed()
    ) {
        let _ = env_logger::try_init();
        test_binary_agreement(dimension, Some(input), seed)
    }
}

/// Runs the largest tolerable number of faulty nodes for each small size, with messages delivered
/// in node order.
#[test]
fn binary_agreement_in_node_order() {
    let _ = env_logger::try_init();
    let mut rng = TestRng::from_seed([3; 16]);
    for size in 1..8 {
        for &input in &[None, Some(false), Some(true)] {
            let net = NetBuilder::new(0..size)
                .num_faulty((size - 1) / 3)
                .message_limit(10_000 * size)
                .adversary(NodeOrderAdversary::new())
                .using(new_binary_agreement)
                .build(&mut rng)
                .expect("Could not construct test network.");
            run_binary_agreement(net, input, &mut rng);
        }
    }
}

fn run_scenario(
    size: usize,
    num_faulty: usize,
    num_silent: usize,
    input: Option<bool>,
    seed: TestRngSeed,
) {
    let _ = env_logger::try_init();
    let mut rng = TestRng::from_seed(seed);
    let net = NetBuilder::new(0..size)
        .num_faulty(num_faulty)
        .silent(num_silent)
        .message_limit(10_000 * size)
        .adversary(ReorderingAdversary::new())
        .using(new_binary_agreement)
        .build(&mut rng)
        .expect("Could not construct test network.");
    run_binary_agreement(net, input, &mut rng);
}

/// All four nodes are live, but each one only waits for three of them.
#[test]
fn four_nodes_all_live_all_true() {
    run_scenario(4, 1, 0, Some(true), [10; 16]);
}

#[test]
fn four_nodes_one_silent_random_input() {
    run_scenario(4, 1, 1, None, [11; 16]);
}

#[test]
fn ten_nodes_three_silent_random_input() {
    run_scenario(10, 3, 3, None, [12; 16]);
}

/// The faulty node votes `BVal` for both values in every round, and sends each correct node an
/// `Aux` for one value followed by an `Aux` for the other, alternating the order between nodes.
#[test]
fn four_nodes_one_equivocating() {
    let _ = env_logger::try_init();
    let mut rng = TestRng::from_seed([13; 16]);
    let mut net = NetBuilder::new(0..4)
        .num_faulty(1)
        .message_limit(40_000)
        .adversary(ReorderingAdversary::new())
        .using(new_binary_agreement)
        .build(&mut rng)
        .expect("Could not construct test network.");
    let faulty: Vec<NodeId> = net.faulty_nodes().map(|node| *node.id()).collect();
    let correct: Vec<NodeId> = net.correct_nodes().map(|node| *node.id()).collect();
    assert_eq!(faulty, vec![0]);
    for &from in &faulty {
        for round in 0..10 {
            for (i, &to) in correct.iter().enumerate() {
                let first = i % 2 == 0;
                let votes = [
                    (VoteKind::BVal, first),
                    (VoteKind::BVal, !first),
                    (VoteKind::Aux, first),
                    (VoteKind::Aux, !first),
                ];
                for &(kind, value) in &votes {
                    let vote = Message::Vote(Vote { round, kind, value });
                    net.inject_message(from, vote, to)
                        .expect("the faulty node can send anything");
                }
            }
        }
    }
    assert!(net.inject_message(1, Message::Done { round: 0 }, 2).is_err());
    run_binary_agreement(net, None, &mut rng);
}
