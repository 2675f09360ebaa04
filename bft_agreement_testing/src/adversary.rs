//! Network adversaries
//!
//! An adversary controls the order in which queued messages are delivered. It cannot forge,
//! drop or alter messages between correct nodes.

use rand::Rng;

use bft_agreement::DistAlgorithm;

use crate::VirtualNet;

/// An adversary, called before every crank of the network.
pub trait Adversary<D>
where
    D: DistAlgorithm,
{
    /// Reorders the network's message queue before the next message is delivered.
    ///
    /// The message at the front of the queue is delivered next.
    fn pre_crank<R: Rng>(&mut self, _net: &mut VirtualNet<D, Self>, _rng: &mut R)
    where
        Self: Sized,
    {
        // The default implementation does not alter anything.
    }
}

/// An adversary that does nothing: messages are delivered in FIFO order.
#[derive(Clone, Debug, Default)]
pub struct NullAdversary;

impl NullAdversary {
    /// Creates a new null adversary.
    #[inline]
    pub fn new() -> Self {
        NullAdversary
    }
}

impl<D: DistAlgorithm> Adversary<D> for NullAdversary {}

/// An adversary that delivers the messages to the node with the lowest ID first.
///
/// Within each recipient, the FIFO order is kept.
#[derive(Clone, Debug, Default)]
pub struct NodeOrderAdversary;

impl NodeOrderAdversary {
    /// Creates a new node order adversary.
    #[inline]
    pub fn new() -> Self {
        NodeOrderAdversary
    }
}

impl<D: DistAlgorithm> Adversary<D> for NodeOrderAdversary {
    fn pre_crank<R: Rng>(&mut self, net: &mut VirtualNet<D, Self>, _rng: &mut R) {
        net.sort_messages_by_key(|msg| msg.to().clone());
    }
}

/// An adversary that picks a random queued message for each crank.
#[derive(Clone, Debug, Default)]
pub struct ReorderingAdversary;

impl ReorderingAdversary {
    /// Creates a new reordering adversary.
    #[inline]
    pub fn new() -> Self {
        ReorderingAdversary
    }
}

impl<D: DistAlgorithm> Adversary<D> for ReorderingAdversary {
    fn pre_crank<R: Rng>(&mut self, net: &mut VirtualNet<D, Self>, rng: &mut R) {
        let len = net.messages_len();
        if len > 1 {
            let idx = rng.gen_range(0, len);
            net.move_to_front(idx);
        }
    }
}
