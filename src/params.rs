use serde::{Deserialize, Serialize};

use crate::binary_agreement::Round;

/// Tuning parameters shared by the algorithms in this crate.
///
/// All nodes in a network should use the same values; a node with a smaller `max_future_rounds`
/// than its peers may drop coin shares it would later need.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// How many rounds ahead of the current one a Binary Agreement instance creates coin
    /// instances for. Coin messages for rounds further ahead are dropped.
    pub max_future_rounds: Round,
    /// The largest payload, in bytes, a Broadcast instance accepts.
    pub max_payload_size: usize,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_future_rounds: 10,
            max_payload_size: usize::MAX,
        }
    }
}
