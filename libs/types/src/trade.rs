//! Trade record types
//!
//! A trade is the committed result of one match: the atomic fund
//! exchange has already happened by the time the record exists.

use crate::ids::{MarketId, OrderId, OwnerId, TradeId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable record of one executed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: MarketId,

    pub price: Price,
    pub quantity: Quantity,
    /// Quote-asset value: price × quantity
    pub amount: Decimal,

    pub maker_id: OwnerId,
    pub taker_id: OwnerId,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,

    pub maker_fee: Decimal,
    pub taker_fee: Decimal,

    pub executed_at: i64, // Unix nanos
}

impl Trade {
    /// Create a trade record; `amount` is derived from price × quantity
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: MarketId,
        price: Price,
        quantity: Quantity,
        maker_id: OwnerId,
        taker_id: OwnerId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_fee: Decimal,
        taker_fee: Decimal,
        executed_at: i64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            symbol,
            amount: price.as_decimal() * quantity.as_decimal(),
            price,
            quantity,
            maker_id,
            taker_id,
            maker_order_id,
            taker_order_id,
            maker_fee,
            taker_fee,
            executed_at,
        }
    }

    /// Check if the given owner participated in this trade
    pub fn involves(&self, owner: &OwnerId) -> bool {
        &self.maker_id == owner || &self.taker_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade::new(
            MarketId::new("BTC/USDT"),
            Price::from_u64(50_000),
            Quantity::from_str("0.5").unwrap(),
            OwnerId::new(),
            OwnerId::new(),
            OrderId::new(),
            OrderId::new(),
            Decimal::from(25),
            Decimal::from(50),
            1_708_123_456_789_000_000,
        )
    }

    #[test]
    fn test_amount_derived_from_price_and_quantity() {
        let trade = sample_trade();
        assert_eq!(trade.amount, Decimal::from(25_000));
    }

    #[test]
    fn test_involves() {
        let trade = sample_trade();
        assert!(trade.involves(&trade.maker_id));
        assert!(trade.involves(&trade.taker_id));
        assert!(!trade.involves(&OwnerId::new()));
    }

    #[test]
    fn test_trade_serialization() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
