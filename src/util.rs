//! Utility functions
//!
//! Functions not large enough to warrant their own crate or module, but flexible enough to be used
//! in multiple disjunct places in the library. May also contain backports, workarounds.

use std::fmt;

use hex_fmt::HexFmt;

/// Given a number of nodes, returns the maximum number of faulty nodes that can be tolerated: the
/// greatest number less than one third of `n`.
///
/// # Panics
///
/// Panics if `n == 0`.
#[inline]
pub fn max_faulty(n: usize) -> usize {
    (n - 1) / 3
}

/// Formats a byte string as shortened hexadecimal, for `Debug` implementations.
pub(crate) fn fmt_hex<T: AsRef<[u8]>>(bytes: T, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:0.10}", HexFmt(bytes))
}

/// Formats a map of byte strings, shortening each value to hexadecimal.
pub(crate) fn fmt_hex_map<K, T>(
    map: &std::collections::BTreeMap<K, T>,
    f: &mut fmt::Formatter,
) -> fmt::Result
where
    K: fmt::Debug,
    T: AsRef<[u8]>,
{
    f.debug_map()
        .entries(map.iter().map(|(k, v)| (k, HexFmt(v))))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::max_faulty;

    #[test]
    fn test_max_faulty() {
        assert_eq!(0, max_faulty(1));
        assert_eq!(0, max_faulty(3));
        assert_eq!(1, max_faulty(4));
        assert_eq!(2, max_faulty(9));
        assert_eq!(3, max_faulty(10));
    }
}
