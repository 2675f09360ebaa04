use std::collections::VecDeque;
use std::sync::Arc;
use std::{fmt, result};

use derivative::Derivative;
use log::{debug, info, warn};

use super::aux_vals::AuxVals;
use super::bin_values::BinValues;
use super::decision_inputs::DecisionInputs;
use super::done::DoneTally;
use super::{Decision, Error, FaultKind, Message, Result, Round, Vote, VoteKind};
use crate::common_coin::{self, CommonCoin};
use crate::fault_log::Fault;
use crate::router::Router;
use crate::{DaStep, DistAlgorithm, NetworkInfo, NodeIdT, Params, Target};

/// A Binary Agreement step.
pub type Step<N, C> = DaStep<BinaryAgreement<N, C>>;

/// Creates the common coin for a round.
pub type CoinFactory<C> = Arc<dyn Fn(Round) -> common_coin::Result<C> + Send + Sync>;

/// Binary Agreement instance
#[derive(Derivative)]
#[derivative(Debug(bound = "N: fmt::Debug, C: fmt::Debug"))]
pub struct BinaryAgreement<N, C> {
    /// Shared network information.
    netinfo: Arc<NetworkInfo<N>>,
    /// Tuning parameters.
    params: Params,
    /// Creates each round's coin.
    #[derivative(Debug = "ignore")]
    coin_factory: CoinFactory<C>,
    /// The current round.
    round: Round,
    /// The estimate of the decision value in the current round. `None` until we have input.
    estimated: Option<bool>,
    /// This round's `BVal` votes and `bin_values`.
    bin_values: BinValues<N>,
    /// This round's `Aux` votes and justified values.
    aux_vals: AuxVals<N>,
    /// This round's coin value and justified values, once known.
    decision_inputs: DecisionInputs,
    /// The coin instances, by round.
    coins: Router<C>,
    /// The first decision round of each node that announced one.
    done: DoneTally<N>,
    /// The decided value. Never changes once set.
    decision: Option<bool>,
    /// Whether we stopped.
    terminated: bool,
    /// Votes for rounds we haven't reached yet, in order of arrival.
    postponed: VecDeque<(N, Vote)>,
    /// Votes to handle before returning: our own, and postponed ones that became current.
    pending: VecDeque<(N, Vote)>,
    /// The estimate for the next round, once the current round is finished.
    next_estimate: Option<bool>,
}

impl<N: NodeIdT, C: CommonCoin<N>> DistAlgorithm for BinaryAgreement<N, C> {
    type NodeId = N;
    type Input = bool;
    type Output = Decision;
    type Message = Message<C::Message>;
    type Error = Error;
    type FaultKind = FaultKind;

    fn handle_input(&mut self, input: bool) -> Result<Step<N, C>> {
        self.propose(input)
    }

    fn handle_message(
        &mut self,
        sender_id: &N,
        message: Message<C::Message>,
    ) -> Result<Step<N, C>> {
        self.handle_message(sender_id, message)
    }

    fn output(&self) -> Option<Decision> {
        self.decision.map(|value| Decision {
            value,
            terminated: self.terminated,
        })
    }

    fn terminated(&self) -> bool {
        self.terminated
    }

    fn our_id(&self) -> &N {
        self.netinfo.our_id()
    }

    fn status(&self) -> String {
        let out = match self.output() {
            Some(decision) => format!("{}/{}", decision.value, decision.terminated),
            None => "-".to_string(),
        };
        let aux_vals = match self.aux_vals.output() {
            Some(vals) => vals.to_string(),
            None => format!("{}?", self.aux_vals.received_count()),
        };
        format!(
            "{{ABA:Mostefaoui, R={}, binVals={}, auxVals={}, decisionInputs={}, done={}, out={}}}",
            self.round,
            self.bin_values.values(),
            aux_vals,
            self.decision_inputs,
            self.done,
            out
        )
    }
}

impl<N: NodeIdT, C: CommonCoin<N>> BinaryAgreement<N, C> {
    /// Creates a new Binary Agreement instance with default parameters.
    pub fn new(netinfo: Arc<NetworkInfo<N>>, coin_factory: CoinFactory<C>) -> Self {
        Self::with_params(netinfo, coin_factory, Params::default())
    }

    /// Creates a new Binary Agreement instance.
    ///
    /// `coin_factory` is called with each round number to create that round's coin. All nodes'
    /// coins for the same round must sign the same data.
    pub fn with_params(
        netinfo: Arc<NetworkInfo<N>>,
        coin_factory: CoinFactory<C>,
        params: Params,
    ) -> Self {
        BinaryAgreement {
            netinfo,
            params,
            coin_factory,
            round: 0,
            estimated: None,
            bin_values: BinValues::default(),
            aux_vals: AuxVals::default(),
            decision_inputs: DecisionInputs::default(),
            coins: Router::new(),
            done: DoneTally::default(),
            decision: None,
            terminated: false,
            postponed: VecDeque::new(),
            pending: VecDeque::new(),
            next_estimate: None,
        }
    }

    /// Returns `true` if input has not been provided yet.
    pub fn accepts_input(&self) -> bool {
        self.estimated.is_none() && !self.terminated
    }

    /// Returns the current round.
    pub fn round(&self) -> Round {
        self.round
    }

    /// Sets the input value and starts the first round. Later inputs are ignored.
    pub fn propose(&mut self, input: bool) -> Result<Step<N, C>> {
        if !self.accepts_input() {
            return Ok(Step::<N, C>::default());
        }
        debug!("{} input {}", self, input);
        let mut step = self.enter_round(input)?;
        step.extend(self.process_pending()?);
        Ok(step)
    }

    /// Handles a message received from `sender_id`.
    ///
    /// This must be called with every message we receive from another node.
    pub fn handle_message(
        &mut self,
        sender_id: &N,
        message: Message<C::Message>,
    ) -> Result<Step<N, C>> {
        if !self.netinfo.is_node(sender_id) {
            debug!("{} dropping message from unknown node {:?}", self, sender_id);
            return Ok(Step::<N, C>::default());
        }
        if self.terminated {
            return Ok(Step::<N, C>::default());
        }
        let mut step = match message {
            Message::Vote(vote) => self.handle_vote(sender_id, vote)?,
            Message::Done { round } => self.handle_done(sender_id, round),
            Message::Coin { round, message } => self.handle_coin(sender_id, round, message)?,
        };
        step.extend(self.process_pending()?);
        Ok(step)
    }

    /// Handles queued votes and starts new rounds until there is nothing left to do.
    fn process_pending(&mut self) -> Result<Step<N, C>> {
        let mut step = Step::<N, C>::default();
        while !self.terminated {
            if let Some((sender_id, vote)) = self.pending.pop_front() {
                step.extend(self.handle_vote(&sender_id, vote)?);
            } else if let Some(estimate) = self.next_estimate.take() {
                let round = self.round.checked_add(1).ok_or(Error::RoundOverflow)?;
                self.round = round;
                step.extend(self.enter_round(estimate)?);
            } else {
                break;
            }
        }
        Ok(step)
    }

    /// Resets the round state, sends our `BVal`, invokes the coin and queues the postponed votes
    /// for this round.
    fn enter_round(&mut self, estimate: bool) -> Result<Step<N, C>> {
        self.estimated = Some(estimate);
        self.bin_values = BinValues::default();
        self.aux_vals = AuxVals::default();
        self.decision_inputs = DecisionInputs::default();
        debug!("{} started round {} with estimate {}", self, self.round, estimate);

        let round = self.round;
        let (current, later): (VecDeque<_>, VecDeque<_>) = self
            .postponed
            .drain(..)
            .filter(|(_, vote)| vote.round >= round)
            .partition(|(_, vote)| vote.round == round);
        self.postponed = later;
        self.pending.extend(current);

        let mut step = self.send_bval(estimate);
        step.extend(self.invoke_coin()?);
        Ok(step)
    }

    /// Handles a `BVal` or `Aux`, or postpones it if it is for a later round.
    fn handle_vote(&mut self, sender_id: &N, vote: Vote) -> Result<Step<N, C>> {
        if self.estimated.is_none() || vote.round > self.round {
            self.postponed.push_back((sender_id.clone(), vote));
            return Ok(Step::<N, C>::default());
        }
        if vote.round < self.round {
            debug!("{} dropping obsolete {:?} from {:?}", self, vote, sender_id);
            return Ok(Step::<N, C>::default());
        }
        match vote.kind {
            VoteKind::BVal => self.handle_bval(sender_id, vote.value),
            VoteKind::Aux => self.handle_aux(sender_id, vote.value),
        }
    }

    /// Handles a `BVal(b)` message.
    ///
    /// Upon receiving _f + 1_ `BVal(b)`, multicasts `BVal(b)`. Upon receiving _2 f + 1_ `BVal(b)`,
    /// updates `bin_values`. When `bin_values` gets its first entry, multicasts `Aux(b)`.
    fn handle_bval(&mut self, sender_id: &N, b: bool) -> Result<Step<N, C>> {
        let num_faulty = self.netinfo.num_faulty();
        let update = match self.bin_values.insert(sender_id, b, num_faulty) {
            None => return Ok(Fault::new(sender_id.clone(), FaultKind::DuplicateBVal).into()),
            Some(update) => update,
        };
        let mut step = Step::<N, C>::default();
        if update.amplify {
            step.extend(self.send_bval(b));
        }
        if update.confirmed {
            if self.aux_vals.mark_sent() {
                step.extend(self.send_vote(VoteKind::Aux, b));
            }
            step.extend(self.try_aux_vals());
        }
        Ok(step)
    }

    /// Handles an `Aux(b)` message.
    fn handle_aux(&mut self, sender_id: &N, b: bool) -> Result<Step<N, C>> {
        if let Err(fault_kind) = self.aux_vals.insert(sender_id, b) {
            warn!("{} {:?} from {:?}: Aux({})", self, fault_kind, sender_id, b);
            return Ok(Fault::new(sender_id.clone(), fault_kind).into());
        }
        Ok(self.try_aux_vals())
    }

    /// Handles a `Done(round)` message, and terminates if that was the missing record.
    fn handle_done(&mut self, sender_id: &N, round: Round) -> Step<N, C> {
        if !self.done.insert(sender_id, round) {
            return Fault::new(sender_id.clone(), FaultKind::DuplicateDone).into();
        }
        self.try_terminate();
        Step::<N, C>::default()
    }

    /// Forwards a message to the given round's coin, creating the coin if necessary.
    fn handle_coin(
        &mut self,
        sender_id: &N,
        round: Round,
        message: C::Message,
    ) -> Result<Step<N, C>> {
        let limit = self.round.saturating_add(self.params.max_future_rounds) as usize;
        let factory = &self.coin_factory;
        let coin = match self.coins.instance(round as usize, limit, || {
            factory(round).map_err(Error::CreateCoin)
        }) {
            Ok(coin) => coin,
            Err(Error::Route(err)) => {
                warn!(
                    "{:?} dropping coin message from {:?}: {}",
                    self.netinfo.our_id(),
                    sender_id,
                    err
                );
                return Ok(Step::<N, C>::default());
            }
            Err(err) => return Err(err),
        };
        let coin_step = coin
            .handle_message(sender_id, message)
            .map_err(Error::HandleCoin)?;
        let mut step = Self::wrap_coin_step(round, coin_step);
        if round == self.round {
            step.extend(self.try_coin_output());
        }
        Ok(step)
    }

    /// Provides input to the current round's coin.
    fn invoke_coin(&mut self) -> Result<Step<N, C>> {
        let round = self.round;
        let limit = round as usize;
        let factory = &self.coin_factory;
        let coin = self
            .coins
            .instance(limit, limit, || factory(round).map_err(Error::CreateCoin))?;
        let coin_step = coin.handle_input(()).map_err(Error::InvokeCoin)?;
        let mut step = Self::wrap_coin_step(round, coin_step);
        step.extend(self.try_coin_output());
        Ok(step)
    }

    fn wrap_coin_step(round: Round, coin_step: DaStep<C>) -> Step<N, C> {
        let mut step = Step::<N, C>::default();
        step.extend_with(coin_step, FaultKind::Coin, |message| Message::Coin {
            round,
            message,
        });
        step
    }

    /// Takes the current round's coin value if it is known, and proceeds if `vals` is known, too.
    fn try_coin_output(&mut self) -> Step<N, C> {
        if self.decision_inputs.has_coin() {
            return Step::<N, C>::default();
        }
        let value = match self.coins.get(self.round as usize).and_then(|coin| coin.output()) {
            None => return Step::<N, C>::default(),
            Some(value) => value,
        };
        debug!("{} coin for round {}: {}", self, self.round, value);
        self.decision_inputs.set_coin(value);
        self.try_decide()
    }

    /// Checks whether `vals` can be computed, and proceeds if the coin value is known, too.
    fn try_aux_vals(&mut self) -> Step<N, C> {
        let bin_values = self.bin_values.values();
        let num_correct = self.netinfo.num_correct();
        if let Some(vals) = self.aux_vals.try_compute(bin_values, num_correct) {
            debug!("{} round {} vals {}", self, self.round, vals);
            self.decision_inputs.set_aux_vals(vals);
            return self.try_decide();
        }
        Step::<N, C>::default()
    }

    /// Once both the coin and `vals` are known, decides if possible and schedules the next round.
    ///
    /// With two values in `vals`, the next round's estimate is the coin value. With a single value
    /// `b`, it is `b`, and if the coin agrees, `b` is decided.
    fn try_decide(&mut self) -> Step<N, C> {
        let (vals, coin) = match self.decision_inputs.take() {
            None => return Step::<N, C>::default(),
            Some(inputs) => inputs,
        };
        let mut step = Step::<N, C>::default();
        let next_estimate = match vals.definite() {
            Some(b) => {
                if b == coin {
                    step.extend(self.decide(b));
                }
                b
            }
            None => coin,
        };
        if !self.terminated {
            self.next_estimate = Some(next_estimate);
        }
        step
    }

    /// Records a decision in the current round. Only the first one sets the value.
    ///
    /// Our first decision is announced with a `Done` message.
    fn decide(&mut self, b: bool) -> Step<N, C> {
        if self.decision.is_none() {
            info!("{} decided {} in round {}", self, b, self.round);
            self.decision = Some(b);
        }
        let our_id = self.netinfo.our_id().clone();
        let mut step = Step::<N, C>::default();
        if self.done.insert_own(&our_id, self.round) {
            let done = Message::Done { round: self.round };
            step.messages.push(Target::All.message(done));
        }
        self.try_terminate();
        step
    }

    /// Stops the instance if enough nodes decided before our latest decision.
    fn try_terminate(&mut self) {
        if self.terminated || self.decision.is_none() {
            return;
        }
        if !self.done.can_terminate(self.netinfo.num_faulty()) {
            return;
        }
        info!("{} terminated in round {}", self, self.round);
        self.terminated = true;
        self.coins.clear();
        self.postponed.clear();
        self.pending.clear();
        self.next_estimate = None;
    }

    /// Multicasts `BVal(b)` unless we already did so in this round.
    fn send_bval(&mut self, b: bool) -> Step<N, C> {
        if !self.bin_values.mark_sent(b) {
            return Step::<N, C>::default();
        }
        self.send_vote(VoteKind::BVal, b)
    }

    /// Multicasts a vote, and queues it to be handled by ourselves.
    fn send_vote(&mut self, kind: VoteKind, value: bool) -> Step<N, C> {
        let vote = Vote {
            round: self.round,
            kind,
            value,
        };
        let our_id = self.netinfo.our_id().clone();
        self.pending.push_back((our_id, vote));
        Target::All.message(Message::Vote(vote)).into()
    }
}

impl<N: NodeIdT, C> fmt::Display for BinaryAgreement<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{:?} BA", self.netinfo.our_id())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::*;
    use crate::common_coin::{BlsCoin, CoinNonce, SemiCoin};
    use crate::crypto::SecretKeySet;

    type TestCoin = SemiCoin<usize, BlsCoin<usize>>;

    fn new_aba(our_id: usize, num_nodes: usize) -> BinaryAgreement<usize, TestCoin> {
        let num_faulty = (num_nodes - 1) / 3;
        let netinfo = Arc::new(NetworkInfo::new(our_id, 0..num_nodes, num_faulty).expect("netinfo"));
        let sk_set = SecretKeySet::random(num_faulty, &mut XorShiftRng::from_seed([9; 16]));
        let coin_netinfo = netinfo.clone();
        let factory: CoinFactory<TestCoin> = Arc::new(move |round| {
            SemiCoin::new(our_id, round, || {
                let nonce = CoinNonce::new(b"aba-test", 0, round).to_bytes()?;
                BlsCoin::new(
                    coin_netinfo.clone(),
                    sk_set.public_keys(),
                    sk_set.secret_key_share(our_id),
                    nonce,
                )
            })
        });
        BinaryAgreement::new(netinfo, factory)
    }

    fn bval(round: Round, value: bool) -> Message<crate::common_coin::Message> {
        Message::Vote(Vote {
            round,
            kind: VoteKind::BVal,
            value,
        })
    }

    fn aux(round: Round, value: bool) -> Message<crate::common_coin::Message> {
        Message::Vote(Vote {
            round,
            kind: VoteKind::Aux,
            value,
        })
    }

    #[test]
    fn single_node_decides_its_input() {
        let mut aba = new_aba(0, 1);
        let step = aba.handle_input(false).expect("input");
        // The coin is `true` in rounds 0 and 1, so `false` is first decided in round 2, and again
        // in round 3, which terminates.
        let done_count = step
            .messages
            .iter()
            .filter(|msg| match msg.message {
                Message::Done { .. } => true,
                _ => false,
            })
            .count();
        assert_eq!(done_count, 1);
        assert_eq!(
            aba.output(),
            Some(Decision {
                value: false,
                terminated: true
            })
        );
        assert_eq!(aba.round(), 3);
    }

    #[test]
    fn only_the_first_input_counts() {
        let mut aba = new_aba(0, 4);
        assert!(aba.accepts_input());
        let step = aba.handle_input(true).expect("input");
        assert_eq!(step.messages.len(), 1);
        assert!(!aba.accepts_input());
        let step = aba.handle_input(false).expect("input");
        assert!(step.is_empty());
        assert_eq!(aba.output(), None);
    }

    #[test]
    fn duplicate_bval_is_a_fault() {
        let mut aba = new_aba(0, 4);
        aba.handle_input(true).expect("input");
        let step = aba.handle_message(&1, bval(0, true)).expect("message");
        assert!(step.fault_log.is_empty());
        let step = aba.handle_message(&1, bval(0, true)).expect("message");
        assert_eq!(step.fault_log.len(), 1);
        assert_eq!(step.fault_log.0[0].kind, FaultKind::DuplicateBVal);
    }

    #[test]
    fn amplifies_after_f_plus_one_bvals() {
        let mut aba = new_aba(0, 4);
        aba.handle_input(true).expect("input");
        let step = aba.handle_message(&1, bval(0, false)).expect("message");
        assert!(step.messages.is_empty());
        let step = aba.handle_message(&2, bval(0, false)).expect("message");
        assert_eq!(step.messages[0], Target::All.message(bval(0, false)));
        // Our own vote is the third one, so `false` enters `bin_values` and we send `Aux(false)`.
        let aux = Message::Vote(Vote {
            round: 0,
            kind: VoteKind::Aux,
            value: false,
        });
        assert_eq!(step.messages[1..], [Target::All.message(aux)]);
    }

    #[test]
    fn early_votes_are_replayed_after_input() {
        let mut aba = new_aba(0, 4);
        for id in 1..3 {
            let step = aba.handle_message(&id, bval(0, false)).expect("message");
            assert!(step.is_empty());
        }
        // Our input is `true`, but the two postponed votes make us vote for `false`, too.
        let step = aba.handle_input(true).expect("input");
        assert!(step.messages.contains(&Target::All.message(bval(0, false))));
    }

    #[test]
    fn ignores_unknown_senders_and_postpones_future_rounds() {
        let mut aba = new_aba(0, 4);
        aba.handle_input(true).expect("input");
        let step = aba.handle_message(&7, bval(0, false)).expect("message");
        assert!(step.is_empty());
        let step = aba.handle_message(&1, bval(500, false)).expect("message");
        assert!(step.is_empty());
        assert!(aba.status().starts_with("{ABA:Mostefaoui, R=0,"));
    }

    #[test]
    fn conflicting_aux_counts_once() {
        let mut aba = new_aba(0, 4);
        aba.handle_input(true).expect("input");
        // `true` and `false` both enter `bin_values`. We send `Aux(true)`.
        for &(id, value) in &[(1, true), (2, true), (1, false), (2, false), (3, false)] {
            let step = aba.handle_message(&id, bval(0, value)).expect("bval");
            assert!(step.fault_log.is_empty());
        }
        let step = aba.handle_message(&3, aux(0, true)).expect("aux");
        assert!(step.fault_log.is_empty());
        let step = aba.handle_message(&3, aux(0, false)).expect("aux");
        assert_eq!(step.fault_log.len(), 1);
        assert_eq!(step.fault_log.0[0].node_id, 3);
        assert_eq!(step.fault_log.0[0].kind, FaultKind::ConflictingAux);
        // Only two senders voted, so `vals` is still unknown.
        assert_eq!(aba.round(), 0);
        assert!(aba.status().contains("auxVals=2?"));

        let step = aba.handle_message(&1, aux(0, false)).expect("aux");
        assert!(step.fault_log.is_empty());
        assert_eq!(aba.round(), 1);
    }

    #[test]
    fn lagging_node_replays_votes_from_far_ahead() {
        let mut aba = new_aba(0, 4);
        aba.handle_input(true).expect("input");
        let sk_set = SecretKeySet::random(1, &mut XorShiftRng::from_seed([9; 16]));
        // Rounds 4 and 9 flip the real coin, which needs one share besides ours.
        for &round in &[4, 9] {
            let nonce = CoinNonce::new(b"aba-test", 0, round)
                .to_bytes()
                .expect("nonce");
            let share = sk_set.secret_key_share(1usize).sign(&nonce);
            let message = crate::common_coin::Message(share);
            let step = aba
                .handle_message(&1, Message::Coin { round, message })
                .expect("coin");
            assert!(step.fault_log.is_empty());
        }
        // Rounds 11 and 12 are more than `max_future_rounds` ahead when their votes arrive.
        for round in (0..13).rev() {
            for id in 1..3 {
                let step = aba.handle_message(&id, bval(round, true)).expect("bval");
                assert!(step.fault_log.is_empty());
                let step = aba.handle_message(&id, aux(round, true)).expect("aux");
                assert!(step.fault_log.is_empty());
            }
        }
        assert_eq!(aba.round(), 13);
        assert_eq!(
            aba.output(),
            Some(Decision {
                value: true,
                terminated: false
            })
        );
    }
}
