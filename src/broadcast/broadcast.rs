use std::collections::BTreeMap;
use std::sync::Arc;
use std::{fmt, result};

use derivative::Derivative;
use hex_fmt::HexFmt;
use log::{debug, info, warn};

use super::{digest, Digest, Error, FaultKind, Message, Result};
use crate::fault_log::Fault;
use crate::{DistAlgorithm, NetworkInfo, NodeIdT, Params, Target};

/// Decides whether a proposed value may be echoed.
pub type ValuePredicate = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Returns a predicate that accepts every value.
pub fn accept_all() -> ValuePredicate {
    Arc::new(|_: &[u8]| true)
}

/// Broadcast algorithm instance.
#[derive(Derivative)]
#[derivative(Debug(bound = "N: fmt::Debug"))]
pub struct Broadcast<N> {
    /// Shared network data.
    netinfo: Arc<NetworkInfo<N>>,
    /// The ID of the sending node.
    proposer_id: N,
    /// The largest value we accept.
    max_payload_size: usize,
    /// We only echo proposed values that satisfy this.
    #[derivative(Debug = "ignore")]
    predicate: ValuePredicate,
    /// If we are the proposer: whether we have already sent the `Propose` message.
    value_sent: bool,
    /// Whether we have already received the proposer's `Propose`.
    propose_received: bool,
    /// Whether we have already multicast `Echo`.
    echo_sent: bool,
    /// Whether we have already multicast `Ready`.
    ready_sent: bool,
    /// The delivered value.
    output: Option<Vec<u8>>,
    /// The digests we have received via `Echo` messages, by sender ID.
    echos: BTreeMap<N, Digest>,
    /// The digests we have received via `Ready` messages, by sender ID.
    readys: BTreeMap<N, Digest>,
    /// The values we received, by digest.
    values: BTreeMap<Digest, Vec<u8>>,
}

/// A `Broadcast` step.
pub type Step<N> = crate::DaStep<Broadcast<N>>;

impl<N: NodeIdT> DistAlgorithm for Broadcast<N> {
    type NodeId = N;
    type Input = Vec<u8>;
    type Output = Self::Input;
    type Message = Message;
    type Error = Error;
    type FaultKind = FaultKind;

    fn handle_input(&mut self, input: Self::Input) -> Result<Step<N>> {
        self.broadcast(input)
    }

    fn handle_message(&mut self, sender_id: &Self::NodeId, message: Message) -> Result<Step<N>> {
        Ok(self.handle_message(sender_id, message))
    }

    fn output(&self) -> Option<Vec<u8>> {
        self.output.clone()
    }

    fn terminated(&self) -> bool {
        self.output.is_some()
    }

    fn our_id(&self) -> &N {
        self.netinfo.our_id()
    }

    fn status(&self) -> String {
        let output = match self.output {
            Some(ref value) => format!("{:0.10}", HexFmt(value)),
            None => "-".to_string(),
        };
        format!(
            "{{RBC:Bracha, n={}, f={}, output={}, echoSent={}, |echo|={}, readySent={}, |ready|={}}}",
            self.netinfo.num_nodes(),
            self.netinfo.num_faulty(),
            output,
            self.echo_sent,
            self.echos.len(),
            self.ready_sent,
            self.readys.len()
        )
    }
}

impl<N: NodeIdT> Broadcast<N> {
    /// Creates a new broadcast instance to be used by node `our_id` which expects a value proposal
    /// from node `proposer_id`.
    pub fn new(netinfo: Arc<NetworkInfo<N>>, proposer_id: N) -> Self {
        Self::with_params(netinfo, proposer_id, Params::default())
    }

    /// Creates a new broadcast instance with the given payload size limit.
    pub fn with_params(netinfo: Arc<NetworkInfo<N>>, proposer_id: N, params: Params) -> Self {
        Broadcast {
            netinfo,
            proposer_id,
            max_payload_size: params.max_payload_size,
            predicate: accept_all(),
            value_sent: false,
            propose_received: false,
            echo_sent: false,
            ready_sent: false,
            output: None,
            echos: BTreeMap::new(),
            readys: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    /// Sets the predicate a proposed value must satisfy before we echo it.
    pub fn with_predicate(mut self, predicate: ValuePredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Initiates the broadcast. This must only be called in the proposer node.
    pub fn broadcast(&mut self, input: Vec<u8>) -> Result<Step<N>> {
        if *self.our_id() != self.proposer_id {
            return Err(Error::InstanceCannotPropose);
        }
        if self.value_sent {
            return Err(Error::MultipleInputs);
        }
        if input.len() > self.max_payload_size {
            return Err(Error::PayloadTooLarge {
                size: input.len(),
                limit: self.max_payload_size,
            });
        }
        self.value_sent = true;
        let step: Step<_> = Target::All.message(Message::Propose(input.clone())).into();
        let our_id = &self.our_id().clone();
        Ok(step.join(self.handle_propose(our_id, input)))
    }

    /// Handles a message received from `sender_id`.
    ///
    /// This must be called with every message we receive from another node.
    pub fn handle_message(&mut self, sender_id: &N, message: Message) -> Step<N> {
        if !self.netinfo.is_node(sender_id) {
            debug!("{} dropping message from unknown node {:?}", self, sender_id);
            return Step::default();
        }
        if message.value().len() > self.max_payload_size {
            warn!(
                "{} received a value of {} bytes from {:?}",
                self,
                message.value().len(),
                sender_id
            );
            return Fault::new(sender_id.clone(), FaultKind::PayloadTooLarge).into();
        }
        match message {
            Message::Propose(value) => self.handle_propose(sender_id, value),
            Message::Echo(value) => self.handle_echo(sender_id, value),
            Message::Ready(value) => self.handle_ready(sender_id, value),
        }
    }

    /// Handles the proposer's value: multicasts it in an `Echo` if the predicate accepts it.
    fn handle_propose(&mut self, sender_id: &N, value: Vec<u8>) -> Step<N> {
        if *sender_id != self.proposer_id {
            let fault_kind = FaultKind::ReceivedProposeFromNonProposer;
            return Fault::new(sender_id.clone(), fault_kind).into();
        }
        if self.propose_received {
            return Fault::new(sender_id.clone(), FaultKind::MultipleProposes).into();
        }
        self.propose_received = true;
        if self.echo_sent {
            return Step::default();
        }
        if !(self.predicate)(&value) {
            warn!("{} rejected the proposed value {:0.10}", self, HexFmt(&value));
            return Step::default();
        }
        self.send_echo(value)
    }

    /// Handles a received `Echo` message.
    fn handle_echo(&mut self, sender_id: &N, value: Vec<u8>) -> Step<N> {
        if self.echos.contains_key(sender_id) {
            return Fault::new(sender_id.clone(), FaultKind::MultipleEchos).into();
        }
        let hash = self.store_value(value);
        self.echos.insert(sender_id.clone(), hash);

        // Upon receiving more than `(N + f) / 2` `Echo`s with this digest, multicast `Ready`.
        let threshold = (self.netinfo.num_nodes() + self.netinfo.num_faulty()) / 2;
        if self.ready_sent || self.count_echos(&hash) <= threshold {
            return Step::default();
        }
        self.send_ready(&hash)
    }

    /// Handles a received `Ready` message.
    fn handle_ready(&mut self, sender_id: &N, value: Vec<u8>) -> Step<N> {
        if self.readys.contains_key(sender_id) {
            return Fault::new(sender_id.clone(), FaultKind::MultipleReadys).into();
        }
        let hash = self.store_value(value);
        self.readys.insert(sender_id.clone(), hash);

        let mut step = Step::default();
        // Upon receiving f + 1 matching `Ready`s, if `Ready` has not yet been sent, multicast it.
        if self.count_readys(&hash) > self.netinfo.num_faulty() && !self.ready_sent {
            step.extend(self.send_ready(&hash));
        }
        self.compute_output(&hash);
        step
    }

    /// Sends an `Echo` message and handles it.
    fn send_echo(&mut self, value: Vec<u8>) -> Step<N> {
        self.echo_sent = true;
        let step: Step<_> = Target::All.message(Message::Echo(value.clone())).into();
        let our_id = &self.our_id().clone();
        step.join(self.handle_echo(our_id, value))
    }

    /// Sends a `Ready` message and handles it.
    fn send_ready(&mut self, hash: &Digest) -> Step<N> {
        let value = match self.values.get(hash) {
            Some(value) => value.clone(),
            None => return Step::default(),
        };
        self.ready_sent = true;
        let step: Step<_> = Target::All.message(Message::Ready(value.clone())).into();
        let our_id = &self.our_id().clone();
        step.join(self.handle_ready(our_id, value))
    }

    /// Outputs the value once more than `2 f` `Ready`s with its digest have been received.
    fn compute_output(&mut self, hash: &Digest) {
        if self.output.is_some() || self.count_readys(hash) <= 2 * self.netinfo.num_faulty() {
            return;
        }
        if let Some(value) = self.values.get(hash) {
            info!("{} output {:0.10}", self, HexFmt(value));
            self.output = Some(value.clone());
        }
    }

    /// Remembers `value` and returns its digest.
    fn store_value(&mut self, value: Vec<u8>) -> Digest {
        let hash = digest(&value);
        self.values.entry(hash).or_insert(value);
        hash
    }

    /// Returns the number of nodes that have sent us an `Echo` message with this digest.
    fn count_echos(&self, hash: &Digest) -> usize {
        self.echos.values().filter(|h| *h == hash).count()
    }

    /// Returns the number of nodes that have sent us a `Ready` message with this digest.
    fn count_readys(&self, hash: &Digest) -> usize {
        self.readys.values().filter(|h| *h == hash).count()
    }
}

impl<N: NodeIdT> fmt::Display for Broadcast<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{:?} Broadcast({:?})", self.our_id(), self.proposer_id)
    }
}
