//! Reports of misbehaving peers.
//!
//! A fault is never an error: the offending contribution is ignored, the instance keeps running,
//! and the report travels upwards in the `Step`'s `FaultLog`. Parent algorithms wrap their
//! children's fault kinds in their own, so the application sees which sub-protocol was affected.

/// A peer that misbehaved, and how.
#[derive(Clone, Debug, PartialEq)]
pub struct Fault<N, F> {
    /// The faulty node's ID.
    pub node_id: N,
    /// The kind of fault the node is blamed for.
    pub kind: F,
}

impl<N, F> Fault<N, F> {
    /// Creates a new fault, blaming `node_id` for the `kind`.
    pub fn new(node_id: N, kind: F) -> Self {
        Fault { node_id, kind }
    }

    /// Converts the kind, e.g. into the fault kind of a parent algorithm.
    pub fn map<F2, FF>(self, f_fault: FF) -> Fault<N, F2>
    where
        FF: Fn(F) -> F2,
    {
        Fault {
            node_id: self.node_id,
            kind: f_fault(self.kind),
        }
    }
}

impl<N, F> From<Fault<N, F>> for FaultLog<N, F> {
    fn from(fault: Fault<N, F>) -> FaultLog<N, F> {
        FaultLog(vec![fault])
    }
}

/// The faults detected while handling one input or message, in the order they were found.
#[derive(Clone, Debug, PartialEq)]
pub struct FaultLog<N, F>(pub Vec<Fault<N, F>>);

impl<N, F> Default for FaultLog<N, F> {
    fn default() -> Self {
        FaultLog(Vec::new())
    }
}

impl<N, F> FaultLog<N, F> {
    /// Creates a log with a single fault.
    pub fn init(node_id: N, kind: F) -> Self {
        Fault::new(node_id, kind).into()
    }

    /// Blames `node_id` for `kind`.
    pub fn append(&mut self, node_id: N, kind: F) {
        self.0.push(Fault::new(node_id, kind));
    }

    /// Moves all faults of `other` to the end of `self`.
    pub fn extend(&mut self, other: FaultLog<N, F>) {
        self.0.extend(other.0);
    }

    /// Returns `true` if no fault was detected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of reported faults.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns an iterator over the reported faults.
    pub fn iter(&self) -> std::slice::Iter<'_, Fault<N, F>> {
        self.0.iter()
    }

    /// Converts every fault's kind.
    pub fn map<F2, FF>(self, f_fault: FF) -> FaultLog<N, F2>
    where
        FF: Fn(F) -> F2,
    {
        FaultLog(self.0.into_iter().map(|f| f.map(&f_fault)).collect())
    }
}

impl<N, F> IntoIterator for FaultLog<N, F> {
    type Item = Fault<N, F>;
    type IntoIter = std::vec::IntoIter<Fault<N, F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum Inner {
        Duplicate,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Outer {
        Child(Inner),
        Unknown,
    }

    #[test]
    fn wrapping_keeps_order_and_blame() {
        let mut log = FaultLog::init(3, Inner::Duplicate);
        log.append(1, Inner::Duplicate);
        let mut outer = FaultLog::init(2, Outer::Unknown);
        outer.extend(log.map(Outer::Child));
        let blamed: Vec<_> = outer.iter().map(|fault| fault.node_id).collect();
        assert_eq!(blamed, vec![2, 3, 1]);
        assert_eq!(outer.0[1].kind, Outer::Child(Inner::Duplicate));
    }
}
