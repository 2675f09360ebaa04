use std::collections::BTreeSet;

/// The senders of a vote kind in one round, by the value they voted for.
#[derive(Debug, Clone)]
pub struct BoolMultimap<N>([BTreeSet<N>; 2]);

impl<N: Ord> Default for BoolMultimap<N> {
    fn default() -> Self {
        BoolMultimap([BTreeSet::default(), BTreeSet::default()])
    }
}

impl<N: Ord + Clone> BoolMultimap<N> {
    /// Records that `id` voted for `b`. Returns `false` if that vote was already recorded.
    pub fn insert(&mut self, b: bool, id: &N) -> bool {
        self.0[Self::slot(b)].insert(id.clone())
    }

    /// Returns the number of distinct senders that voted for `b`.
    pub fn count(&self, b: bool) -> usize {
        self.0[Self::slot(b)].len()
    }

    /// Returns the number of votes for either value.
    pub fn len(&self) -> usize {
        self.0[0].len() + self.0[1].len()
    }

    fn slot(b: bool) -> usize {
        if b {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BoolMultimap;

    #[test]
    fn counts_distinct_senders_per_value() {
        let mut votes = BoolMultimap::default();
        assert!(votes.insert(true, &1));
        assert!(votes.insert(false, &1));
        assert!(!votes.insert(true, &1));
        assert!(votes.insert(true, &2));
        assert_eq!(votes.count(true), 2);
        assert_eq!(votes.count(false), 1);
        assert_eq!(votes.len(), 3);
    }
}
