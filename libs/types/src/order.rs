//! Order lifecycle types
//!
//! An order moves monotonically from NEW/OPEN into exactly one terminal
//! state; fills only ever increase and never exceed the order quantity.

use crate::errors::OrderError;
use crate::ids::{MarketId, OrderId, OwnerId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order execution type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Rest in the book at a fixed price until matched
    Limit,
    /// Execute immediately against resting liquidity; never rests
    Market,
}

/// Order lifecycle state
///
/// `New → Open → {Filled, Cancelled, Expired}`; New may also transition
/// directly into a terminal state. Terminal states accept no further
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Accepted, funds reserved, not yet partially filled
    New,
    /// Resting in the book with zero or more partial fills
    Open,
    /// Completely matched (terminal)
    Filled,
    /// Cancelled by the owner or the system (terminal)
    Cancelled,
    /// Expiry deadline reached before completion (terminal)
    Expired,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    /// Check if the order can still rest in a book or be cancelled
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Open)
    }
}

/// Complete order record
///
/// The order store is the exclusive owner of these records; book entries
/// are cache projections of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    pub symbol: MarketId,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price, or the caller-supplied reservation estimate for
    /// market orders
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub filled: Quantity,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
    /// Optional expiry deadline (Unix nanos)
    pub expires_at: Option<i64>,
}

impl Order {
    /// Create a new order in status `New`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: OwnerId,
        symbol: MarketId,
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        quantity: Quantity,
        expires_at: Option<i64>,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            owner_id,
            symbol,
            side,
            order_type,
            price,
            quantity,
            filled: Quantity::zero(),
            status: OrderStatus::New,
            created_at: timestamp,
            updated_at: timestamp,
            expires_at,
        }
    }

    /// Unfilled remainder
    pub fn remaining(&self) -> Quantity {
        self.quantity.saturating_sub(self.filled)
    }

    /// Check fill invariant: 0 <= filled <= quantity
    pub fn check_invariant(&self) -> bool {
        self.filled.as_decimal() >= rust_decimal::Decimal::ZERO
            && self.filled.as_decimal() <= self.quantity.as_decimal()
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled == self.quantity
    }

    /// Check if the order has passed its expiry deadline
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.map(|deadline| deadline <= now).unwrap_or(false)
    }

    /// Advance the fill counter and adjust status
    ///
    /// Rejects fills on terminal orders (`StatusConflict`) and fills
    /// beyond the remaining quantity (`InvalidQuantity`): a fill racing
    /// a cancel must lose here, not overwrite the terminal state.
    pub fn add_fill(&mut self, fill_quantity: Quantity, timestamp: i64) -> Result<(), OrderError> {
        if !self.status.is_active() {
            return Err(OrderError::StatusConflict {
                order_id: self.order_id.to_string(),
                status: format!("{:?}", self.status),
            });
        }

        let new_filled = self.filled + fill_quantity;
        if new_filled.as_decimal() > self.quantity.as_decimal() {
            return Err(OrderError::InvalidQuantity(fill_quantity.to_string()));
        }

        self.filled = new_filled;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::Open
        };
        self.updated_at = timestamp;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit_order(quantity: &str) -> Order {
        Order::new(
            OwnerId::new(),
            MarketId::new("BTC/USDT"),
            Side::Buy,
            OrderType::Limit,
            Some(Price::from_u64(50_000)),
            Quantity::from_str(quantity).unwrap(),
            None,
            1_708_123_456_789_000_000,
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_order_creation() {
        let order = limit_order("1.0");
        assert_eq!(order.status, OrderStatus::New);
        assert!(order.check_invariant());
        assert_eq!(order.remaining(), Quantity::from_str("1.0").unwrap());
    }

    #[test]
    fn test_order_fill_progression() {
        let mut order = limit_order("1.0");

        order
            .add_fill(Quantity::from_str("0.3").unwrap(), 1_708_123_456_790_000_000)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.remaining(), Quantity::from_str("0.7").unwrap());
        assert!(order.check_invariant());

        order
            .add_fill(Quantity::from_str("0.7").unwrap(), 1_708_123_456_791_000_000)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.is_filled());
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_order_overfill_rejected() {
        let mut order = limit_order("1.0");
        let err = order
            .add_fill(Quantity::from_str("1.5").unwrap(), 1_708_123_456_790_000_000)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidQuantity(_)));
        // Nothing moved.
        assert_eq!(order.filled, Quantity::zero());
        assert_eq!(order.status, OrderStatus::New);
    }

    #[test]
    fn test_fill_on_terminal_order_rejected() {
        let mut order = limit_order("1.0");
        order.status = OrderStatus::Cancelled;

        let err = order
            .add_fill(Quantity::from_str("0.5").unwrap(), 1_708_123_456_790_000_000)
            .unwrap_err();
        assert!(matches!(err, OrderError::StatusConflict { .. }));
        // The terminal status never resurrects.
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.filled, Quantity::zero());
    }

    #[test]
    fn test_status_classification() {
        assert!(OrderStatus::New.is_active());
        assert!(OrderStatus::Open.is_active());
        assert!(!OrderStatus::Cancelled.is_active());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
    }

    #[test]
    fn test_expiry_check() {
        let mut order = limit_order("1.0");
        assert!(!order.is_expired_at(i64::MAX));

        order.expires_at = Some(100);
        assert!(order.is_expired_at(100));
        assert!(!order.is_expired_at(99));
    }

    #[test]
    fn test_order_serialization() {
        let order = limit_order("2.5");
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();

        assert_eq!(order.order_id, deserialized.order_id);
        assert_eq!(order.side, deserialized.side);
        assert_eq!(order.price, deserialized.price);
        assert!(json.contains("\"NEW\""));
    }
}
