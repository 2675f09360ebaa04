use std::collections::BTreeMap;

use super::bool_set::{self, BoolSet};
use super::FaultKind;

/// The `Aux` votes of the current round, and the justified set `vals` computed from them.
#[derive(Debug, Clone)]
pub struct AuxVals<N> {
    /// The first `Aux` value each sender sent us.
    received: BTreeMap<N, bool>,
    /// Whether we already sent our `Aux`.
    sent: bool,
    /// The values of the first _N - f_ senders whose `Aux` was in `bin_values`. Frozen once set.
    output: Option<BoolSet>,
}

impl<N: Ord + Clone> Default for AuxVals<N> {
    fn default() -> Self {
        AuxVals {
            received: BTreeMap::new(),
            sent: false,
            output: None,
        }
    }
}

impl<N: Ord + Clone> AuxVals<N> {
    /// Records an `Aux(b)` from `sender_id`, unless the sender already sent one in this round.
    ///
    /// Only the first `Aux` per sender counts. A repeat is a `DuplicateAux` fault, a second vote
    /// for the other value is a `ConflictingAux` fault.
    pub fn insert(&mut self, sender_id: &N, b: bool) -> Result<(), FaultKind> {
        match self.received.get(sender_id) {
            None => {
                self.received.insert(sender_id.clone(), b);
                Ok(())
            }
            Some(&first) if first == b => Err(FaultKind::DuplicateAux),
            Some(_) => Err(FaultKind::ConflictingAux),
        }
    }

    /// Marks our own `Aux` as sent. Returns `false` if it had been sent before.
    pub fn mark_sent(&mut self) -> bool {
        !std::mem::replace(&mut self.sent, true)
    }

    /// Computes `vals` if that hasn't happened yet and at least `num_correct` senders voted for
    /// values in `bin_values`. Returns the set only on the call that computes it.
    ///
    /// `bin_values` can still grow after an earlier call returned `None`, so this must be retried
    /// whenever either `bin_values` or the `Aux` votes change.
    pub fn try_compute(&mut self, bin_values: BoolSet, num_correct: usize) -> Option<BoolSet> {
        if self.output.is_some() || bin_values.is_empty() {
            return None;
        }
        let mut vals = bool_set::NONE;
        let mut count = 0;
        for &b in self.received.values().filter(|b| bin_values.contains(**b)) {
            vals.insert(b);
            count += 1;
        }
        if count < num_correct {
            return None;
        }
        self.output = Some(vals);
        Some(vals)
    }

    /// Returns `vals`, if it has been computed.
    pub fn output(&self) -> Option<BoolSet> {
        self.output
    }

    /// Returns the number of senders whose `Aux` we received in this round.
    pub fn received_count(&self) -> usize {
        self.received.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_votes_in_bin_values() {
        let mut aux = AuxVals::default();
        assert_eq!(aux.insert(&0, true), Ok(()));
        assert_eq!(aux.insert(&1, false), Ok(()));
        assert_eq!(aux.insert(&2, false), Ok(()));
        assert_eq!(aux.insert(&2, false), Err(FaultKind::DuplicateAux));
        // Only one vote is for a value in `bin_values`.
        assert_eq!(aux.try_compute(bool_set::TRUE, 3), None);
        // `bin_values` grew: all three votes count now.
        assert_eq!(aux.try_compute(bool_set::BOTH, 3), Some(bool_set::BOTH));
        // Frozen after the first computation.
        assert_eq!(aux.try_compute(bool_set::TRUE, 1), None);
        assert_eq!(aux.output(), Some(bool_set::BOTH));
    }

    #[test]
    fn a_sender_counts_once_for_its_first_value() {
        let mut aux = AuxVals::default();
        assert_eq!(aux.insert(&0, true), Ok(()));
        assert_eq!(aux.insert(&3, true), Ok(()));
        assert_eq!(aux.insert(&3, false), Err(FaultKind::ConflictingAux));
        assert_eq!(aux.received_count(), 2);
        assert_eq!(aux.try_compute(bool_set::BOTH, 3), None);
        assert_eq!(aux.insert(&1, false), Ok(()));
        assert_eq!(aux.try_compute(bool_set::BOTH, 3), Some(bool_set::BOTH));
    }

    #[test]
    fn sends_once() {
        let mut aux = AuxVals::<usize>::default();
        assert!(aux.mark_sent());
        assert!(!aux.mark_sent());
        assert_eq!(aux.try_compute(bool_set::NONE, 0), None);
    }
}
