use super::bool_multimap::BoolMultimap;
use super::bool_set::{self, BoolSet};

/// The effect of a newly received `BVal` vote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BValUpdate {
    /// The value just reached _f + 1_ votes and we haven't sent it yet, so we must multicast it.
    pub amplify: bool,
    /// The value just reached _2 f + 1_ votes and was added to `bin_values`.
    pub confirmed: bool,
}

/// The `BVal` votes of the current round, and the set `bin_values` of values that received
/// _2 f + 1_ of them.
#[derive(Debug, Clone)]
pub struct BinValues<N> {
    /// The nodes that sent us a `BVal(b)`, by `b`.
    received: BoolMultimap<N>,
    /// The values `b` for which we already sent `BVal(b)`.
    sent: BoolSet,
    /// The values for which _2 f + 1_ `BVal`s have been received.
    values: BoolSet,
}

impl<N: Ord + Clone> Default for BinValues<N> {
    fn default() -> Self {
        BinValues {
            received: BoolMultimap::default(),
            sent: bool_set::NONE,
            values: bool_set::NONE,
        }
    }
}

impl<N: Ord + Clone> BinValues<N> {
    /// Records a `BVal(b)` from `sender_id`. Returns `None` if the sender already voted for `b`
    /// in this round.
    pub fn insert(&mut self, sender_id: &N, b: bool, num_faulty: usize) -> Option<BValUpdate> {
        if !self.received.insert(b, sender_id) {
            return None;
        }
        let count = self.received.count(b);
        let mut update = BValUpdate::default();
        if count == num_faulty + 1 && !self.sent.contains(b) {
            update.amplify = true;
        }
        if count == 2 * num_faulty + 1 {
            update.confirmed = self.values.insert(b);
        }
        Some(update)
    }

    /// Marks `BVal(b)` as sent. Returns `false` if it had been sent before.
    pub fn mark_sent(&mut self, b: bool) -> bool {
        self.sent.insert(b)
    }

    /// Returns the current `bin_values`.
    pub fn values(&self) -> BoolSet {
        self.values
    }

    /// Returns the number of `BVal` votes received in this round.
    pub fn received_count(&self) -> usize {
        self.received.len()
    }
}
