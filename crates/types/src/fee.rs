//! Fee rates and the minimum-fee rule.

use serde::{Deserialize, Serialize};

/// Absolute floor for any fee we pay, in satoshis.
pub const MIN_ABSOLUTE_FEE: u64 = 300;

/// Recommended fee rates in sat/vB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRates {
    /// Lowest rate the network relays.
    pub minimum: u64,
    /// Rate targeting the next block.
    pub fastest: u64,
}

impl FeeRates {
    pub fn new(minimum: u64, fastest: u64) -> Self {
        Self {
            minimum: minimum.max(1),
            fastest: fastest.max(minimum).max(1),
        }
    }

    /// `max(300, minimum, vsize * fastest)`.
    pub fn fee_for(&self, vsize: u64) -> u64 {
        MIN_ABSOLUTE_FEE
            .max(self.minimum)
            .max(vsize.saturating_mul(self.fastest))
    }

    /// Smallest fee a transaction of `vsize` may pay to be relayed.
    pub fn relay_floor(&self, vsize: u64) -> u64 {
        vsize.saturating_mul(self.minimum)
    }
}

impl Default for FeeRates {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_floor() {
        let rates = FeeRates::new(1, 2);
        assert_eq!(rates.fee_for(100), 300);
        assert_eq!(rates.fee_for(200), 400);
    }

    #[test]
    fn test_fastest_never_below_minimum() {
        let rates = FeeRates::new(5, 2);
        assert_eq!(rates.fastest, 5);
        assert_eq!(rates.relay_floor(100), 500);
    }
}
