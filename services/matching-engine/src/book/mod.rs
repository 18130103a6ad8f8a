//! Per-symbol order book
//!
//! Two price-sorted sides plus an order-id index so an order can be
//! removed without the caller knowing its side or price.

pub mod ask_book;
pub mod bid_book;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::{BookEntry, PriceLevel};

use std::collections::HashMap;

use types::ids::{MarketId, OrderId, OwnerId};
use types::numeric::{Price, Quantity};
use types::order::Side;

/// Order book for a single symbol
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: MarketId,
    pub(crate) bids: BidBook,
    pub(crate) asks: AskBook,
    /// order-id → (side, price) for removal without a book walk
    index: HashMap<OrderId, (Side, Price)>,
    next_seq: u64,
}

/// Top-of-book view, best prices first on both sides
#[derive(Debug, Clone, PartialEq)]
pub struct BookDepth {
    pub symbol: String,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
}

impl OrderBook {
    pub fn new(symbol: MarketId) -> Self {
        Self {
            symbol,
            bids: BidBook::new(),
            asks: AskBook::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn symbol(&self) -> &MarketId {
        &self.symbol
    }

    /// Rest a limit order in the book; returns its arrival sequence
    pub fn insert(
        &mut self,
        side: Side,
        price: Price,
        order_id: OrderId,
        owner_id: OwnerId,
        remaining: Quantity,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = BookEntry {
            order_id,
            owner_id,
            remaining,
            seq,
        };
        match side {
            Side::Buy => self.bids.insert(price, entry),
            Side::Sell => self.asks.insert(price, entry),
        }
        self.index.insert(order_id, (side, price));
        seq
    }

    /// Remove an order wherever it rests; no-op if absent
    pub fn remove(&mut self, order_id: &OrderId) -> bool {
        let Some((side, price)) = self.index.remove(order_id) else {
            return false;
        };
        match side {
            Side::Buy => self.bids.remove(order_id, price),
            Side::Sell => self.asks.remove(order_id, price),
        }
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Top N levels per side
    pub fn depth(&self, n: usize) -> BookDepth {
        BookDepth {
            symbol: self.symbol.as_str().to_string(),
            bids: self.bids.depth(n),
            asks: self.asks.depth(n),
        }
    }

    /// Advance the front entry of the best level on `side` by `filled`
    ///
    /// The caller has already settled this fill; an exhausted entry
    /// leaves the book and the index.
    pub(crate) fn fill_best(&mut self, side: Side, price: Price, order_id: OrderId, filled: Quantity) {
        let exhausted = match side {
            Side::Buy => self
                .bids
                .best_level_mut()
                .map(|(_, level)| level.fill_front(filled))
                .unwrap_or(false),
            Side::Sell => self
                .asks
                .best_level_mut()
                .map(|(_, level)| level.fill_front(filled))
                .unwrap_or(false),
        };
        if exhausted {
            self.index.remove(&order_id);
            match side {
                Side::Buy => self.bids.drop_level_if_empty(price),
                Side::Sell => self.asks.drop_level_if_empty(price),
            }
        }
    }
}
