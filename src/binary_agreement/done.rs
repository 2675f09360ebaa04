use std::collections::BTreeMap;
use std::fmt;

use super::Round;

/// Tracks who has decided, and in which round, to determine when it is safe to stop.
///
/// Each node's record is the round of its _first_ decision, as announced by its `Done` message.
/// Our own record is set on our own first decision. We can terminate once more than _f_ records
/// are for rounds strictly before our most recent decision.
#[derive(Debug, Clone)]
pub struct DoneTally<N> {
    first_decisions: BTreeMap<N, Round>,
    last_decision: Option<Round>,
}

impl<N: Ord + Clone> Default for DoneTally<N> {
    fn default() -> Self {
        DoneTally {
            first_decisions: BTreeMap::new(),
            last_decision: None,
        }
    }
}

impl<N: Ord + Clone> DoneTally<N> {
    /// Records a `Done(round)` from `sender_id`. Returns `false` if the sender already has a
    /// record; the existing one is kept.
    pub fn insert(&mut self, sender_id: &N, round: Round) -> bool {
        if self.first_decisions.contains_key(sender_id) {
            return false;
        }
        self.first_decisions.insert(sender_id.clone(), round);
        true
    }

    /// Records our own decision in `round`. Returns `true` if it is our first one, in which case
    /// we must announce it with a `Done` message.
    pub fn insert_own(&mut self, our_id: &N, round: Round) -> bool {
        self.last_decision = Some(round);
        self.insert(our_id, round)
    }

    /// Returns `true` if more than `num_faulty` nodes decided before our most recent decision.
    pub fn can_terminate(&self, num_faulty: usize) -> bool {
        let last = match self.last_decision {
            None => return false,
            Some(last) => last,
        };
        let earlier = self
            .first_decisions
            .values()
            .filter(|&&round| round < last)
            .count();
        earlier > num_faulty
    }
}

impl<N> fmt::Display for DoneTally<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.last_decision {
            Some(round) => write!(f, "{}@{}", self.first_decisions.len(), round),
            None => write!(f, "{}", self.first_decisions.len()),
        }
    }
}
