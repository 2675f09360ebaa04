use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::sync::Arc;
use std::{fmt, result};

use derivative::Derivative;
use hex_fmt::HexFmt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::proposal_state::ProposalState;
use super::{Error, FaultKind, Message, MessageContent, Result};
use crate::binary_agreement::{self, BinaryAgreement, CoinFactory, Round};
use crate::broadcast::{self, Broadcast, ValuePredicate};
use crate::common_coin::{self, CommonCoin};
use crate::fault_log::Fault;
use crate::router::{RouteError, Router};
use crate::{util, DistAlgorithm, NetworkInfo, NodeIdT, Params};

/// A `Subset` step.
pub type Step<N, C> = crate::DaStep<Subset<N, C>>;

/// Creates the common coin for a proposer's Binary Agreement instance and a round.
pub type SubsetCoinFactory<N, C> =
    Arc<dyn Fn(&N, Round) -> common_coin::Result<C> + Send + Sync>;

/// The agreed set of contributions.
#[derive(Derivative, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Debug(bound = "N: fmt::Debug"))]
#[serde(bound(
    serialize = "N: Serialize + Ord",
    deserialize = "N: Deserialize<'de> + Ord"
))]
pub struct SubsetOutput<N> {
    /// The accepted contributions, by proposer.
    #[derivative(Debug(format_with = "util::fmt_hex_map"))]
    pub values: BTreeMap<N, Vec<u8>>,
    /// Whether all Binary Agreement instances have terminated. Only this flag ever changes once
    /// the output is available.
    pub terminated: bool,
}

/// Subset algorithm instance
#[derive(Derivative)]
#[derivative(Debug(bound = "N: fmt::Debug, C: fmt::Debug"))]
pub struct Subset<N, C> {
    /// Shared network information.
    pub(super) netinfo: Arc<NetworkInfo<N>>,
    /// Tuning parameters passed to the child instances.
    pub(super) params: Params,
    /// Creates the coins of the agreement instances.
    #[derivative(Debug = "ignore")]
    pub(super) coin_factory: SubsetCoinFactory<N, C>,
    /// Gates the `Echo` in every `Broadcast` instance.
    #[derivative(Debug = "ignore")]
    pub(super) predicate: ValuePredicate,
    /// The `Broadcast` instances, by proposer index.
    pub(super) broadcasts: Router<Broadcast<N>>,
    /// The `BinaryAgreement` instances, by proposer index.
    pub(super) agreements: Router<BinaryAgreement<N, C>>,
    /// The progress of each proposer's contribution, by proposer index.
    pub(super) proposal_states: Vec<ProposalState>,
    /// Whether we already proposed a value.
    pub(super) has_input: bool,
    /// The accepted contributions, once all of them are known.
    pub(super) values: Option<BTreeMap<N, Vec<u8>>>,
    /// Whether all agreement instances have terminated.
    pub(super) terminated: bool,
}

impl<N: NodeIdT + 'static, C: CommonCoin<N> + 'static> DistAlgorithm for Subset<N, C> {
    type NodeId = N;
    type Input = Vec<u8>;
    type Output = SubsetOutput<N>;
    type Message = Message<C::Message>;
    type Error = Error;
    type FaultKind = FaultKind;

    fn handle_input(&mut self, input: Self::Input) -> Result<Step<N, C>> {
        self.propose(input)
    }

    fn handle_message(
        &mut self,
        sender_id: &N,
        message: Message<C::Message>,
    ) -> Result<Step<N, C>> {
        self.handle_message(sender_id, message)
    }

    fn output(&self) -> Option<SubsetOutput<N>> {
        self.values.as_ref().map(|values| SubsetOutput {
            values: values.clone(),
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
        let out_vals = self.values.as_ref().map_or(0, BTreeMap::len);
        let rbc_out = self.proposal_states.iter().filter(|s| s.received()).count();
        let aba_out = self.proposal_states.iter().filter(|s| s.decided()).count();
        format!(
            "{{ACS, |outVals|={}, outTerm={}, n={}, f={}, |rbcOut|={}, |abaOut|={}}}",
            out_vals,
            self.terminated,
            self.netinfo.num_nodes(),
            self.netinfo.num_faulty(),
            rbc_out,
            aba_out
        )
    }
}

impl<N: NodeIdT + 'static, C: CommonCoin<N> + 'static> Subset<N, C> {
    /// Proposes a value for the subset.
    ///
    /// Only the first proposal counts. Later ones are ignored.
    pub fn propose(&mut self, value: Vec<u8>) -> Result<Step<N, C>> {
        if self.has_input {
            debug!("{} ignoring a second proposal", self);
            return Ok(Step::<N, C>::default());
        }
        self.has_input = true;
        debug!("{} proposing {:0.10}", self, HexFmt(&value));
        let our_index = self.netinfo.our_index();
        let step = self.broadcast_step(our_index, |bc| bc.broadcast(value))?;
        Ok(step.join(self.try_output()?))
    }

    /// Handles a message received from `sender_id`.
    ///
    /// This must be called with every message we receive from another node.
    pub fn handle_message(
        &mut self,
        sender_id: &N,
        msg: Message<C::Message>,
    ) -> Result<Step<N, C>> {
        if !self.netinfo.is_node(sender_id) {
            debug!("{} dropping message from unknown node {:?}", self, sender_id);
            return Ok(Step::<N, C>::default());
        }
        let index = msg.proposer_idx as usize;
        if index >= self.netinfo.num_nodes() {
            warn!(
                "{} message about unknown proposer #{} from {:?}",
                self, index, sender_id
            );
            return Ok(Fault::new(sender_id.clone(), FaultKind::UnknownProposer).into());
        }
        let step = match msg.content {
            MessageContent::Broadcast(bc_msg) => {
                self.broadcast_step(index, |bc| Ok(bc.handle_message(sender_id, bc_msg)))?
            }
            MessageContent::Agreement(ba_msg) => {
                self.agreement_step(index, |ba| ba.handle_message(sender_id, ba_msg))?
            }
        };
        Ok(step.join(self.try_output()?))
    }

    /// Applies `f` to the proposer's `Broadcast` instance. If that delivers the value, votes "yes"
    /// on the proposer's `BinaryAgreement` instance.
    fn broadcast_step<F>(&mut self, index: usize, f: F) -> Result<Step<N, C>>
    where
        F: FnOnce(&mut Broadcast<N>) -> broadcast::Result<broadcast::Step<N>>,
    {
        let limit = self.netinfo.num_nodes() - 1;
        let proposer_id = self.proposer_id(index)?;
        let netinfo = &self.netinfo;
        let params = self.params;
        let predicate = &self.predicate;
        let bc = self.broadcasts.instance(index, limit, || {
            let bc = Broadcast::with_params(netinfo.clone(), proposer_id, params);
            Ok::<_, Error>(bc.with_predicate(predicate.clone()))
        })?;
        let bc_step = f(bc).map_err(Error::HandleBroadcast)?;
        let output = bc.output();
        let mut step = Step::<N, C>::default();
        let proposer_idx = Self::proposer_idx(index)?;
        step.extend_with(bc_step, FaultKind::BroadcastFault, |msg| {
            MessageContent::Broadcast(msg).with(proposer_idx)
        });
        if let Some(value) = output {
            if self.proposal_states[index].set_value(value) {
                step.extend(self.vote(index, true)?);
            }
        }
        Ok(step)
    }

    /// Applies `f` to the proposer's `BinaryAgreement` instance and records its output.
    fn agreement_step<F>(&mut self, index: usize, f: F) -> Result<Step<N, C>>
    where
        F: FnOnce(
            &mut BinaryAgreement<N, C>,
        ) -> binary_agreement::Result<binary_agreement::Step<N, C>>,
    {
        let limit = self.netinfo.num_nodes() - 1;
        let proposer_id = self.proposer_id(index)?;
        let netinfo = &self.netinfo;
        let params = self.params;
        let coin_factory = &self.coin_factory;
        let ba = self.agreements.instance(index, limit, || {
            let factory = coin_factory.clone();
            let ba_coin_factory: CoinFactory<C> =
                Arc::new(move |round| factory(&proposer_id, round));
            Ok::<_, Error>(BinaryAgreement::with_params(
                netinfo.clone(),
                ba_coin_factory,
                params,
            ))
        })?;
        let ba_step = f(ba).map_err(Error::HandleAgreement)?;
        let output = ba.output();
        let mut step = Step::<N, C>::default();
        let proposer_idx = Self::proposer_idx(index)?;
        step.extend_with(ba_step, FaultKind::BaFault, |msg| {
            MessageContent::Agreement(msg).with(proposer_idx)
        });
        if let Some(decision) = output {
            self.proposal_states[index].set_decision(decision);
        }
        Ok(step)
    }

    /// Provides input to the proposer's `BinaryAgreement` instance, unless we already did.
    fn vote(&mut self, index: usize, accept: bool) -> Result<Step<N, C>> {
        if !self.proposal_states[index].mark_voted() {
            return Ok(Step::<N, C>::default());
        }
        debug!("{} voting {} for proposer #{}", self, accept, index);
        self.agreement_step(index, |ba| ba.propose(accept))
    }

    /// Returns the proposer index as it goes on the wire.
    fn proposer_idx(index: usize) -> Result<u16> {
        u16::try_from(index).map_err(|_| {
            let limit = usize::from(u16::MAX);
            RouteError::IndexOutOfRange { index, limit }.into()
        })
    }

    fn proposer_id(&self, index: usize) -> Result<N> {
        let limit = self.netinfo.num_nodes() - 1;
        self.netinfo
            .node_id(index)
            .cloned()
            .ok_or_else(|| RouteError::IndexOutOfRange { index, limit }.into())
    }

    /// Returns the number of Binary Agreement instances that have decided "yes".
    fn count_accepted(&self) -> usize {
        self.proposal_states.iter().filter(|s| s.accepted()).count()
    }

    /// Checks the voting and termination conditions: If enough proposals have been accepted, votes
    /// "no" for the remaining ones. If all proposals have been decided and all accepted values are
    /// known, outputs the set.
    fn try_output(&mut self) -> Result<Step<N, C>> {
        let mut step = Step::<N, C>::default();
        if self.count_accepted() >= self.netinfo.num_correct() {
            for index in 0..self.proposal_states.len() {
                step.extend(self.vote(index, false)?);
            }
        }
        if self.values.is_none() && self.proposal_states.iter().all(ProposalState::complete) {
            let values: BTreeMap<N, Vec<u8>> = self
                .netinfo
                .all_ids()
                .zip(&self.proposal_states)
                .filter(|(_, state)| state.accepted())
                .filter_map(|(id, state)| state.value().map(|value| (id.clone(), value.clone())))
                .collect();
            info!("{} output {} contributions", self, values.len());
            self.values = Some(values);
        }
        if !self.terminated
            && self.values.is_some()
            && self
                .proposal_states
                .iter()
                .all(ProposalState::agreement_terminated)
        {
            info!("{} terminated", self);
            self.terminated = true;
        }
        Ok(step)
    }
}

impl<N: NodeIdT, C> fmt::Display for Subset<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{:?} Subset", self.netinfo.our_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_coin::BlsCoin;

    type TestSubset = Subset<usize, BlsCoin<usize>>;

    #[test]
    fn output_serializes_with_ordered_keys() {
        let output = SubsetOutput {
            values: vec![(2usize, vec![1, 2]), (0, vec![])].into_iter().collect(),
            terminated: true,
        };
        let bytes = bincode::serialize(&output).expect("serialize");
        let decoded: SubsetOutput<usize> = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(decoded, output);
        assert!(format!("{:?}", output).contains("0102"));
    }

    #[test]
    fn proposer_index_must_fit_on_the_wire() {
        assert_eq!(TestSubset::proposer_idx(65535), Ok(u16::MAX));
        assert_eq!(
            TestSubset::proposer_idx(65536),
            Err(Error::Route(RouteError::IndexOutOfRange {
                index: 65536,
                limit: 65535
            }))
        );
    }
}
