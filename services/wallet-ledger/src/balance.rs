//! Balance records keyed by (owner, owner type, asset)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::OwnerId;
use types::ledger::OwnerType;

/// Unique key for one balance record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub owner_id: OwnerId,
    pub owner_type: OwnerType,
    pub asset: String,
}

impl BalanceKey {
    pub fn new(owner_id: OwnerId, owner_type: OwnerType, asset: impl Into<String>) -> Self {
        Self {
            owner_id,
            owner_type,
            asset: asset.into(),
        }
    }
}

/// Balance for a single (owner, asset) pair
///
/// Invariant: both fields are non-negative at all times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub available: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Total holdings: available + locked
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }

    /// Check the non-negativity invariant
    pub fn check_invariant(&self) -> bool {
        self.available >= Decimal::ZERO && self.locked >= Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_balance() {
        let balance = Balance::zero();
        assert_eq!(balance.total(), Decimal::ZERO);
        assert!(balance.check_invariant());
    }

    #[test]
    fn test_total() {
        let balance = Balance {
            available: Decimal::from(700),
            locked: Decimal::from(300),
        };
        assert_eq!(balance.total(), Decimal::from(1000));
    }

    #[test]
    fn test_balance_key_ordering_is_stable() {
        let owner = OwnerId::new();
        let a = BalanceKey::new(owner, OwnerType::User, "BTC");
        let b = BalanceKey::new(owner, OwnerType::User, "USDT");
        assert!(a < b);
    }
}
