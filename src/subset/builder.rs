use std::collections::BTreeMap;
use std::sync::Arc;

use super::proposal_state::ProposalState;
use super::{Subset, SubsetCoinFactory};
use crate::broadcast::{self, ValuePredicate};
use crate::common_coin::CommonCoin;
use crate::router::Router;
use crate::{NetworkInfo, NodeIdT, Params};

/// A Subset builder, to configure the parameters and create new instances of `Subset`.
pub struct SubsetBuilder<N, C> {
    /// Shared network data.
    netinfo: Arc<NetworkInfo<N>>,
    /// Creates the coins of the agreement instances.
    coin_factory: SubsetCoinFactory<N, C>,
    /// Parameters passed to the child instances.
    params: Params,
    /// The predicate every proposed value must satisfy before we echo it.
    predicate: ValuePredicate,
}

impl<N: NodeIdT + 'static, C: CommonCoin<N> + 'static> SubsetBuilder<N, C> {
    /// Returns a new `SubsetBuilder` configured to use the node IDs specified by `netinfo`.
    ///
    /// `coin_factory` is called with a proposer's ID and a round number to create the coin for
    /// that round of the proposer's `BinaryAgreement` instance. Every proposer and round needs a
    /// different coin, so the coin's nonce should include both.
    pub fn new(netinfo: Arc<NetworkInfo<N>>, coin_factory: SubsetCoinFactory<N, C>) -> Self {
        SubsetBuilder {
            netinfo,
            coin_factory,
            params: Params::default(),
            predicate: broadcast::accept_all(),
        }
    }

    /// Sets the parameters for the child instances.
    pub fn params(&mut self, params: Params) -> &mut Self {
        self.params = params;
        self
    }

    /// Sets the predicate a proposed value must satisfy before we echo it in its `Broadcast`. By
    /// default every value is accepted.
    ///
    /// A value that fails the predicate on too many correct nodes is never delivered, so its
    /// proposer is left out of the subset.
    pub fn predicate<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Creates a new `Subset` instance.
    pub fn build(&self) -> Subset<N, C> {
        Subset {
            netinfo: self.netinfo.clone(),
            params: self.params,
            coin_factory: self.coin_factory.clone(),
            predicate: self.predicate.clone(),
            broadcasts: Router::new(),
            agreements: Router::new(),
            proposal_states: vec![ProposalState::default(); self.netinfo.num_nodes()],
            has_input: false,
            values: None::<BTreeMap<N, Vec<u8>>>,
            terminated: false,
        }
    }
}
