//! A test network.
//!
//! Test networks simulate a real networking that includes an adversary as well as the plumbing to
//! pass messages back and forth between nodes.
//!
//! Networks are "cranked" to move things forward; each crank of a network causes one message to be
//! delivered to a node. Every message is encoded to bytes and decoded by the receiving instance
//! before it is handled, so the wire format is exercised on every delivery.
//!
//! Faulty nodes don't run their algorithm: they receive no input, and messages addressed to them
//! are dropped. They stay silent unless the test speaks for them with
//! `VirtualNet::inject_message`. Any fault reported against a correct node aborts the crank with
//! an error.

#![warn(missing_docs)]

#[macro_use]
pub mod util;
pub mod adversary;
pub mod err;
pub mod proptest;

use std::collections::{BTreeMap, VecDeque};
use std::{fmt, mem};

use bft_agreement::crypto::{PublicKeySet, SecretKeySet, SecretKeyShare};
use bft_agreement::{DaStep, DistAlgorithm, NetworkInfo, Target, TargetedMessage, WireMessage};
use log::{debug, trace};
use rand::Rng;

pub use self::adversary::{Adversary, NodeOrderAdversary, NullAdversary, ReorderingAdversary};
pub use self::err::CrankError;

/// A node in the test network.
pub struct Node<D: DistAlgorithm> {
    /// The algorithm instance.
    algorithm: D,
    /// Whether the node is faulty, i.e. its algorithm doesn't run.
    is_faulty: bool,
}

impl<D: DistAlgorithm> fmt::Debug for Node<D>
where
    D: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("algorithm", &self.algorithm)
            .field("is_faulty", &self.is_faulty)
            .finish()
    }
}

impl<D: DistAlgorithm> Node<D> {
    /// Creates a new node.
    #[inline]
    fn new(algorithm: D, is_faulty: bool) -> Self {
        Node {
            algorithm,
            is_faulty,
        }
    }

    /// Returns a reference to the contained algorithm instance.
    #[inline]
    pub fn algorithm(&self) -> &D {
        &self.algorithm
    }

    /// Checks whether the node is faulty.
    #[inline]
    pub fn is_faulty(&self) -> bool {
        self.is_faulty
    }

    /// Returns the node's ID.
    #[inline]
    pub fn id(&self) -> &D::NodeId {
        self.algorithm.our_id()
    }
}

/// A message in transit: sender, recipient and the message itself.
// Note: We do not use `TargetedMessage` here, since multicasts are expanded into one message per
//       recipient before they are queued.
#[derive(Clone, Debug)]
pub struct NetworkMessage<M, N> {
    from: N,
    to: N,
    payload: M,
}

impl<M, N> NetworkMessage<M, N> {
    /// Creates a new network message.
    #[inline]
    pub fn new(from: N, payload: M, to: N) -> NetworkMessage<M, N> {
        NetworkMessage { from, to, payload }
    }

    /// Returns the destination of the message.
    #[inline]
    pub fn to(&self) -> &N {
        &self.to
    }
}

/// Mapping from node IDs to actual node instances.
pub type NodeMap<D> = BTreeMap<<D as DistAlgorithm>::NodeId, Node<D>>;

/// A network message for the algorithm `D`.
pub type NetMessage<D> =
    NetworkMessage<<D as DistAlgorithm>::Message, <D as DistAlgorithm>::NodeId>;

/// Expands a step's messages into one network message per recipient.
///
/// `Target::All` addresses every node except the sender.
fn expand_messages<'a, D, I>(
    nodes: &'a NodeMap<D>,
    sender: &D::NodeId,
    messages: I,
    dest: &mut VecDeque<NetMessage<D>>,
) where
    D: DistAlgorithm + 'a,
    I: Iterator<Item = &'a TargetedMessage<D::Message, D::NodeId>>,
{
    for tmsg in messages {
        match &tmsg.target {
            Target::Node(to) => {
                dest.push_back(NetworkMessage::new(
                    sender.clone(),
                    tmsg.message.clone(),
                    to.clone(),
                ));
            }
            Target::All => {
                for to in nodes.keys().filter(|to| *to != sender) {
                    dest.push_back(NetworkMessage::new(
                        sender.clone(),
                        tmsg.message.clone(),
                        to.clone(),
                    ));
                }
            }
        }
    }
}

/// The information handed to the constructor of each node's algorithm instance.
pub struct NewNodeInfo<D: DistAlgorithm> {
    /// The node's ID.
    pub id: D::NodeId,
    /// The network information for this node.
    pub netinfo: NetworkInfo<D::NodeId>,
    /// The node's secret key share of the generated key set.
    pub secret_key_share: SecretKeyShare,
    /// The public key set matching all nodes' secret key shares.
    pub public_key_set: PublicKeySet,
    /// Whether the node is faulty.
    pub is_faulty: bool,
}

/// A node constructor.
type Constructor<D> = Box<dyn Fn(NewNodeInfo<D>) -> D>;

/// A builder for virtual networks.
pub struct NetBuilder<D: DistAlgorithm, I, A> {
    /// The IDs of all nodes, in order.
    node_ids: I,
    /// The number _f_ of faulty nodes the algorithms must tolerate.
    num_faulty: usize,
    /// The number of nodes that are actually faulty, if different from `num_faulty`. These are
    /// the first IDs.
    silent: Option<usize>,
    /// The threshold of the generated key set, if different from `num_faulty`.
    threshold: Option<usize>,
    /// The maximum number of cranks.
    crank_limit: Option<usize>,
    /// The maximum number of messages.
    message_limit: Option<usize>,
    /// The adversary.
    adversary: Option<A>,
    /// The node constructor.
    cons: Option<Constructor<D>>,
}

impl<D: DistAlgorithm, I, A> fmt::Debug for NetBuilder<D, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NetBuilder")
            .field("num_faulty", &self.num_faulty)
            .field("silent", &self.silent)
            .field("threshold", &self.threshold)
            .field("crank_limit", &self.crank_limit)
            .field("message_limit", &self.message_limit)
            .field("adversary", &self.adversary.is_some())
            .field("cons", &self.cons.is_some())
            .finish()
    }
}

impl<D, I> NetBuilder<D, I, NullAdversary>
where
    D: DistAlgorithm,
    I: IntoIterator<Item = D::NodeId>,
{
    /// Creates a new network builder with the given node IDs, no faulty nodes, no limits and a
    /// `NullAdversary`.
    #[inline]
    pub fn new(node_ids: I) -> Self {
        NetBuilder {
            node_ids,
            num_faulty: 0,
            silent: None,
            threshold: None,
            crank_limit: None,
            message_limit: None,
            adversary: None,
            cons: None,
        }
    }
}

impl<D, I, A> NetBuilder<D, I, A>
where
    D: DistAlgorithm,
    I: IntoIterator<Item = D::NodeId>,
    A: Adversary<D>,
{
    /// Sets the adversary.
    #[inline]
    pub fn adversary<B: Adversary<D>>(self, adversary: B) -> NetBuilder<D, I, B> {
        NetBuilder {
            node_ids: self.node_ids,
            num_faulty: self.num_faulty,
            silent: self.silent,
            threshold: self.threshold,
            crank_limit: self.crank_limit,
            message_limit: self.message_limit,
            adversary: Some(adversary),
            cons: self.cons,
        }
    }

    /// Sets the number _f_ of faulty nodes every node's `NetworkInfo` is configured with. Unless
    /// `silent` says otherwise, the first `num_faulty` nodes are faulty.
    #[inline]
    pub fn num_faulty(mut self, num_faulty: usize) -> Self {
        self.num_faulty = num_faulty;
        self
    }

    /// Sets how many nodes are actually faulty, independently of _f_. With `silent(0)` every
    /// node is correct, even though the algorithms still tolerate `num_faulty` faulty ones.
    #[inline]
    pub fn silent(mut self, silent: usize) -> Self {
        self.silent = Some(silent);
        self
    }

    /// Sets the threshold of the generated key set: `threshold + 1` signature shares are needed
    /// to sign. Defaults to the number of faulty nodes.
    #[inline]
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Sets the crank limit.
    #[inline]
    pub fn crank_limit(mut self, crank_limit: usize) -> Self {
        self.crank_limit = Some(crank_limit);
        self
    }

    /// Sets the message limit: the maximum number of messages queued over the whole run.
    #[inline]
    pub fn message_limit(mut self, message_limit: usize) -> Self {
        self.message_limit = Some(message_limit);
        self
    }

    /// Sets the node constructor.
    #[inline]
    pub fn using<F>(mut self, cons: F) -> Self
    where
        F: Fn(NewNodeInfo<D>) -> D + 'static,
    {
        self.cons = Some(Box::new(cons));
        self
    }

    /// Generates the threshold keys and constructs the network.
    ///
    /// # Panics
    ///
    /// Panics if no constructor was set.
    pub fn build<R: Rng>(self, rng: &mut R) -> Result<VirtualNet<D, A>, CrankError<D>> {
        let cons = self
            .cons
            .expect("cannot build network without a constructor for nodes");
        let node_ids: Vec<D::NodeId> = self.node_ids.into_iter().collect();
        let num_faulty = self.num_faulty;
        let num_silent = self.silent.unwrap_or(num_faulty);
        let sk_set = SecretKeySet::random(self.threshold.unwrap_or(num_faulty), rng);
        let pk_set = sk_set.public_keys();

        let mut nodes = BTreeMap::new();
        for (idx, id) in node_ids.iter().enumerate() {
            let netinfo = NetworkInfo::new(id.clone(), node_ids.iter().cloned(), num_faulty)
                .map_err(CrankError::InitialNetworkInfo)?;
            let is_faulty = idx < num_silent;
            let algorithm = cons(NewNodeInfo {
                id: id.clone(),
                netinfo,
                secret_key_share: sk_set.secret_key_share(idx),
                public_key_set: pk_set.clone(),
                is_faulty,
            });
            nodes.insert(id.clone(), Node::new(algorithm, is_faulty));
        }

        Ok(VirtualNet {
            nodes,
            messages: VecDeque::new(),
            adversary: self.adversary,
            crank_count: 0,
            crank_limit: self.crank_limit,
            message_count: 0,
            message_limit: self.message_limit,
        })
    }
}

/// A virtual network of algorithm instances.
pub struct VirtualNet<D: DistAlgorithm, A> {
    /// Maps node IDs to actual node instances.
    nodes: NodeMap<D>,
    /// A collection of all network messages queued up for delivery.
    messages: VecDeque<NetMessage<D>>,
    /// The adversary that controls the delivery order. `None` means FIFO.
    adversary: Option<A>,
    /// The number of cranks so far.
    crank_count: usize,
    /// The maximum number of cranks.
    crank_limit: Option<usize>,
    /// The number of messages queued so far.
    message_count: usize,
    /// The maximum number of messages.
    message_limit: Option<usize>,
}

impl<D: DistAlgorithm, A> fmt::Debug for VirtualNet<D, A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VirtualNet")
            .field("nodes", &self.nodes.len())
            .field("messages", &self.messages.len())
            .field("crank_count", &self.crank_count)
            .field("message_count", &self.message_count)
            .finish()
    }
}

impl<D, A> VirtualNet<D, A>
where
    D: DistAlgorithm,
    A: Adversary<D>,
{
    /// Returns an iterator over all nodes.
    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = &Node<D>> {
        self.nodes.values()
    }

    /// Returns an iterator over all faulty nodes.
    #[inline]
    pub fn faulty_nodes(&self) -> impl Iterator<Item = &Node<D>> {
        self.nodes().filter(|n| n.is_faulty())
    }

    /// Returns an iterator over all correct nodes.
    #[inline]
    pub fn correct_nodes(&self) -> impl Iterator<Item = &Node<D>> {
        self.nodes().filter(|n| !n.is_faulty())
    }

    /// Returns the number of queued messages.
    #[inline]
    pub fn messages_len(&self) -> usize {
        self.messages.len()
    }

    /// Moves the message at `idx` to the front of the queue.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[inline]
    pub fn move_to_front(&mut self, idx: usize) {
        let msg = self
            .messages
            .remove(idx)
            .expect("message index out of bounds");
        self.messages.push_front(msg);
    }

    /// Sorts the queue with a stable sort by the given key.
    pub fn sort_messages_by_key<K, F>(&mut self, f: F)
    where
        K: Ord,
        F: FnMut(&NetMessage<D>) -> K,
    {
        let mut msgs: Vec<_> = mem::replace(&mut self.messages, VecDeque::new()).into();
        msgs.sort_by_key(f);
        self.messages = msgs.into();
    }

    /// Returns `true` if all correct nodes have terminated.
    pub fn correct_nodes_terminated(&self) -> bool {
        self.correct_nodes().all(|node| node.algorithm().terminated())
    }

    /// Queues a message on behalf of a faulty node. It is delivered like any other message, so the
    /// test decides what a Byzantine node says, and to whom.
    ///
    /// Fails if the sender is not a faulty node.
    pub fn inject_message(
        &mut self,
        from: D::NodeId,
        payload: D::Message,
        to: D::NodeId,
    ) -> Result<(), CrankError<D>> {
        let is_faulty = self.nodes.get(&from).map_or(false, Node::is_faulty);
        if !is_faulty {
            return Err(CrankError::InjectedForCorrectNode(from));
        }
        self.messages.push_back(NetworkMessage::new(from, payload, to));
        self.message_count += 1;
        self.check_message_limit()
    }

    fn check_message_limit(&self) -> Result<(), CrankError<D>> {
        match self.message_limit {
            Some(limit) if self.message_count > limit => {
                Err(CrankError::MessageLimitExceeded(limit))
            }
            _ => Ok(()),
        }
    }

    /// Checks the step's faults, and queues its messages.
    fn process_step(&mut self, sender: &D::NodeId, step: &DaStep<D>) -> Result<(), CrankError<D>> {
        for fault in step.fault_log.iter() {
            let is_correct = self
                .nodes
                .get(&fault.node_id)
                .map_or(false, |node| !node.is_faulty());
            if is_correct {
                return Err(CrankError::Fault(fault.clone()));
            }
        }
        let before = self.messages.len();
        expand_messages(&self.nodes, sender, step.messages.iter(), &mut self.messages);
        self.message_count += self.messages.len() - before;
        self.check_message_limit()
    }

    /// Sends input to a single node and queues the resulting messages.
    pub fn send_input(
        &mut self,
        id: D::NodeId,
        input: D::Input,
    ) -> Result<DaStep<D>, CrankError<D>> {
        let step = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| CrankError::NodeDisappearedInCrank(id.clone()))?
            .algorithm
            .handle_input(input)
            .map_err(CrankError::HandleInput)?;
        self.process_step(&id, &step)?;
        Ok(step)
    }

    /// Sends the same input to every correct node.
    pub fn broadcast_input(
        &mut self,
        input: &D::Input,
    ) -> Result<Vec<(D::NodeId, DaStep<D>)>, CrankError<D>>
    where
        D::Input: Clone,
    {
        let ids: Vec<D::NodeId> = self.correct_nodes().map(|node| node.id().clone()).collect();
        let mut steps = Vec::new();
        for id in ids {
            let step = self
                .nodes
                .get_mut(&id)
                .ok_or_else(|| CrankError::NodeDisappearedInCrank(id.clone()))?
                .algorithm
                .handle_input(input.clone())
                .map_err(CrankError::HandleInputAll)?;
            self.process_step(&id, &step)?;
            steps.push((id, step));
        }
        Ok(steps)
    }

    /// Encodes and decodes the message, and lets the recipient handle it.
    fn dispatch_message(&mut self, msg: NetMessage<D>) -> Result<DaStep<D>, CrankError<D>> {
        let node = self
            .nodes
            .get_mut(&msg.to)
            .ok_or_else(|| CrankError::NodeDisappearedInDispatch(msg.to.clone()))?;
        let bytes = msg.payload.to_bytes();
        let payload = match node.algorithm.unmarshal_message(&bytes) {
            Ok(payload) => payload,
            Err(err) => return Err(CrankError::Decode { msg, err }),
        };
        match node.algorithm.handle_message(&msg.from, payload) {
            Ok(step) => Ok(step),
            Err(err) => Err(CrankError::HandleMessage { msg, err }),
        }
    }

    /// Delivers one message, chosen by the adversary.
    ///
    /// Returns `None` if there are no more messages.
    pub fn crank<R: Rng>(
        &mut self,
        rng: &mut R,
    ) -> Option<Result<(D::NodeId, DaStep<D>), CrankError<D>>> {
        if let Some(limit) = self.crank_limit {
            if self.crank_count >= limit {
                return Some(Err(CrankError::CrankLimitExceeded(limit)));
            }
        }

        // Swap the adversary out, to get around ownership restrictions.
        let mut adv = self.adversary.take();
        if let Some(ref mut adversary) = adv {
            adversary.pre_crank(self, rng);
        }
        self.adversary = adv;

        let msg = self.messages.pop_front()?;
        self.crank_count += 1;
        trace!("[{:?}] -> [{:?}]: {:?}", msg.from, msg.to, msg.payload);
        let receiver = msg.to.clone();

        let is_faulty = try_some!(self
            .nodes
            .get(&receiver)
            .ok_or_else(|| CrankError::NodeDisappearedInCrank(receiver.clone())))
        .is_faulty();
        if is_faulty {
            // Faulty nodes are silent.
            return Some(Ok((receiver, DaStep::<D>::default())));
        }

        let step = try_some!(self.dispatch_message(msg));
        try_some!(self.process_step(&receiver, &step));
        if let Some(node) = self.nodes.get(&receiver) {
            debug!("{:?}: {}", receiver, node.algorithm().status());
        }
        Some(Ok((receiver, step)))
    }

    /// Delivers one message, panicking on any error.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty or cranking failed.
    pub fn crank_expect<R: Rng>(&mut self, rng: &mut R) -> (D::NodeId, DaStep<D>) {
        self.crank(rng)
            .expect("crank: network queue empty")
            .expect("crank: error processing network message")
    }

    /// Cranks until all correct nodes have terminated.
    ///
    /// Fails if a crank fails, or if the queue runs empty first.
    pub fn crank_until_terminated<R: Rng>(&mut self, rng: &mut R) -> Result<(), CrankError<D>> {
        while !self.correct_nodes_terminated() {
            match self.crank(rng) {
                Some(result) => {
                    result?;
                }
                None => return Err(CrankError::QueueEmpty),
            }
        }
        Ok(())
    }
}
