//! Reservation records
//!
//! Funds earmarked against a pending order or withdrawal. Each
//! reservation is a tagged record keyed by `ref_id` (the order or
//! withdrawal id) holding the exact amount still locked under it, so
//! releases restore precisely what remains even when several
//! reservations coexist for the same owner and asset.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::OwnerId;
use types::ledger::OwnerType;

/// Lifecycle of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationState {
    /// Funds are locked and can still be released or consumed
    Held,
    /// Remainder was moved back to available (terminal)
    Released,
    /// Remainder was permanently removed from locked (terminal)
    Consumed,
}

/// One reservation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub owner_id: OwnerId,
    pub owner_type: OwnerType,
    pub asset: String,
    /// Amount still locked under this reservation. Settlement reduces
    /// it fill by fill; release and consume zero it out.
    pub remaining: Decimal,
    pub state: ReservationState,
}

impl Reservation {
    pub fn new(owner_id: OwnerId, owner_type: OwnerType, asset: impl Into<String>, amount: Decimal) -> Self {
        Self {
            owner_id,
            owner_type,
            asset: asset.into(),
            remaining: amount,
            state: ReservationState::Held,
        }
    }

    pub fn is_held(&self) -> bool {
        self.state == ReservationState::Held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reservation_is_held() {
        let res = Reservation::new(OwnerId::new(), OwnerType::User, "USDT", Decimal::from(100));
        assert!(res.is_held());
        assert_eq!(res.remaining, Decimal::from(100));
    }
}
