use std::fmt;

use super::bool_set::BoolSet;

/// The two inputs to a round's decision step: the coin value and the justified set `vals`.
///
/// They arrive independently. The decision step runs exactly once per round, as soon as both are
/// known.
#[derive(Debug, Clone, Default)]
pub struct DecisionInputs {
    coin: Option<bool>,
    aux_vals: Option<BoolSet>,
    used: bool,
}

impl DecisionInputs {
    /// Sets the coin value. Only the first value counts.
    pub fn set_coin(&mut self, value: bool) {
        self.coin.get_or_insert(value);
    }

    /// Sets the justified values. Only the first set counts.
    pub fn set_aux_vals(&mut self, vals: BoolSet) {
        self.aux_vals.get_or_insert(vals);
    }

    /// Returns `true` if the coin value is known.
    pub fn has_coin(&self) -> bool {
        self.coin.is_some()
    }

    /// Returns both inputs the first time they are both present, and `None` otherwise.
    pub fn take(&mut self) -> Option<(BoolSet, bool)> {
        if self.used {
            return None;
        }
        let inputs = (self.aux_vals?, self.coin?);
        self.used = true;
        Some(inputs)
    }
}

impl fmt::Display for DecisionInputs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let aux_vals = match self.aux_vals {
            Some(vals) => vals.to_string(),
            None => "-".to_string(),
        };
        let coin = match self.coin {
            Some(coin) => coin.to_string(),
            None => "-".to_string(),
        };
        write!(f, "{{coin={}, auxVals={}, used={}}}", coin, aux_vals, self.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary_agreement::bool_set;

    #[test]
    fn fires_once_when_both_are_known() {
        let mut inputs = DecisionInputs::default();
        inputs.set_coin(false);
        assert_eq!(inputs.take(), None);
        inputs.set_coin(true);
        inputs.set_aux_vals(bool_set::TRUE);
        assert_eq!(inputs.take(), Some((bool_set::TRUE, false)));
        assert_eq!(inputs.take(), None);
    }
}
