use crate::binary_agreement::Decision;

/// The progress of one proposer's contribution: its broadcast value and its agreement outcome.
#[derive(Debug, Clone, Default)]
pub struct ProposalState {
    /// The value delivered by the proposer's `Broadcast` instance.
    value: Option<Vec<u8>>,
    /// Whether we already provided input to the proposer's `BinaryAgreement` instance.
    voted: bool,
    /// The latest output of the proposer's `BinaryAgreement` instance.
    decision: Option<Decision>,
}

impl ProposalState {
    /// Records the delivered value. Returns `true` if it is new and we still have to vote "yes".
    pub fn set_value(&mut self, value: Vec<u8>) -> bool {
        if self.value.is_some() {
            return false;
        }
        self.value = Some(value);
        !self.voted
    }

    /// Marks our vote as cast. Returns `false` if we had voted before.
    pub fn mark_voted(&mut self) -> bool {
        !std::mem::replace(&mut self.voted, true)
    }

    /// Records the agreement instance's output.
    pub fn set_decision(&mut self, decision: Decision) {
        self.decision = Some(decision);
    }

    /// Returns the delivered value, if any.
    pub fn value(&self) -> Option<&Vec<u8>> {
        self.value.as_ref()
    }

    /// Returns `true` if we already received the `Broadcast` result.
    pub fn received(&self) -> bool {
        self.value.is_some()
    }

    /// Returns `true` if this proposal has been accepted, even if we don't have the value yet.
    pub fn accepted(&self) -> bool {
        self.decision.map_or(false, |decision| decision.value)
    }

    /// Returns `true` if agreement about this proposal has been reached.
    pub fn decided(&self) -> bool {
        self.decision.is_some()
    }

    /// Returns `true` if the value is accepted and received, or rejected.
    pub fn complete(&self) -> bool {
        match self.decision {
            None => false,
            Some(decision) => !decision.value || self.received(),
        }
    }

    /// Returns `true` if the agreement instance has terminated.
    pub fn agreement_terminated(&self) -> bool {
        self.decision.map_or(false, |decision| decision.terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_proposal_is_complete_once_received() {
        let mut state = ProposalState::default();
        assert!(state.mark_voted());
        state.set_decision(Decision {
            value: true,
            terminated: false,
        });
        assert!(state.accepted());
        assert!(!state.complete());
        // We voted already, so there is nothing left to do with the value.
        assert!(!state.set_value(vec![1]));
        assert!(state.complete());
        assert!(!state.agreement_terminated());
    }

    #[test]
    fn rejected_proposal_is_complete() {
        let mut state = ProposalState::default();
        assert!(state.set_value(vec![1]));
        state.set_decision(Decision {
            value: false,
            terminated: true,
        });
        assert!(state.decided());
        assert!(state.complete());
        assert!(state.agreement_terminated());
    }
}
