use std::collections::BTreeMap;

use thiserror::Error;

use crate::NodeIdT;

/// An error constructing a `NetworkInfo`.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum NetworkInfoError {
    /// The list of node IDs is empty.
    #[error("The node set is empty")]
    EmptyNodeSet,
    /// A node ID occurs more than once.
    #[error("Node ID occurs more than once: {0}")]
    DuplicateNode(String),
    /// Our own ID is not in the list of node IDs.
    #[error("Our own ID is not in the node set")]
    UnknownOwnId,
    /// There are more nodes than a 16-bit node index can address.
    #[error("Too many nodes: {0}, at most 65536 are supported")]
    TooManyNodes(usize),
    /// `3 f >= n`: the protocols can't guarantee anything with this many faulty nodes.
    #[error("Too many faulty nodes: f = {num_faulty} but n = {num_nodes}")]
    TooManyFaulty {
        /// The configured number of faulty nodes.
        num_faulty: usize,
        /// The total number of nodes.
        num_nodes: usize,
    },
}

/// The largest supported network. Messages address nodes by a `u16` index.
pub const MAX_NODES: usize = u16::MAX as usize + 1;

/// Common data shared between algorithms: the ordered node IDs, our own ID and the fault bound.
#[derive(Debug, Clone)]
pub struct NetworkInfo<N> {
    /// This node's ID.
    our_id: N,
    /// The number _f_ of faulty nodes the network tolerates.
    num_faulty: usize,
    /// All node IDs, in the order given on construction.
    ids: Vec<N>,
    /// The position of each ID in `ids`.
    indices: BTreeMap<N, usize>,
}

impl<N: NodeIdT> NetworkInfo<N> {
    /// Creates a new `NetworkInfo` for a fixed set of nodes.
    ///
    /// All nodes in the network must pass the same IDs in the same order, since child instances
    /// are addressed by a node's index. `num_faulty` must satisfy `3 f < n`, and there can be at
    /// most `MAX_NODES` nodes.
    pub fn new<I>(our_id: N, ids: I, num_faulty: usize) -> Result<Self, NetworkInfoError>
    where
        I: IntoIterator<Item = N>,
    {
        let ids: Vec<N> = ids.into_iter().collect();
        if ids.is_empty() {
            return Err(NetworkInfoError::EmptyNodeSet);
        }
        if ids.len() > MAX_NODES {
            return Err(NetworkInfoError::TooManyNodes(ids.len()));
        }
        let mut indices = BTreeMap::new();
        for (index, id) in ids.iter().enumerate() {
            if indices.insert(id.clone(), index).is_some() {
                return Err(NetworkInfoError::DuplicateNode(format!("{:?}", id)));
            }
        }
        if !indices.contains_key(&our_id) {
            return Err(NetworkInfoError::UnknownOwnId);
        }
        if 3 * num_faulty >= ids.len() {
            return Err(NetworkInfoError::TooManyFaulty {
                num_faulty,
                num_nodes: ids.len(),
            });
        }
        Ok(NetworkInfo {
            our_id,
            num_faulty,
            ids,
            indices,
        })
    }

    /// The ID of the node the algorithm runs on.
    #[inline]
    pub fn our_id(&self) -> &N {
        &self.our_id
    }

    /// ID of all nodes in the network, in their index order.
    #[inline]
    pub fn all_ids(&self) -> impl Iterator<Item = &N> + Clone {
        self.ids.iter()
    }

    /// The total number _N_ of nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.ids.len()
    }

    /// The maximum number _f_ of faulty, Byzantine nodes up to which the protocols are guaranteed
    /// to be correct.
    #[inline]
    pub fn num_faulty(&self) -> usize {
        self.num_faulty
    }

    /// The minimum number _N - f_ of correct nodes with which the protocols are guaranteed to be
    /// correct.
    #[inline]
    pub fn num_correct(&self) -> usize {
        // `new` guarantees that `num_faulty` is less than `num_nodes`.
        self.num_nodes() - self.num_faulty
    }

    /// Returns `true` if the given ID belongs to a known node.
    #[inline]
    pub fn is_node(&self, id: &N) -> bool {
        self.indices.contains_key(id)
    }

    /// Returns the node's index in the ordered list of all IDs.
    #[inline]
    pub fn node_index(&self, id: &N) -> Option<usize> {
        self.indices.get(id).cloned()
    }

    /// Returns the ID of the node with the given index.
    #[inline]
    pub fn node_id(&self, index: usize) -> Option<&N> {
        self.ids.get(index)
    }

    /// Returns our own index.
    #[inline]
    pub fn our_index(&self) -> usize {
        // `new` guarantees that our ID is in the map.
        self.indices.get(&self.our_id).cloned().unwrap_or_default()
    }
}
