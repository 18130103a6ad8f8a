//! Bid (buy-side) book
//!
//! Buy orders sorted by price descending, best bid first. BTreeMap
//! keeps iteration deterministic.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::{Price, Quantity};

use super::price_level::{BookEntry, PriceLevel};

#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, price: Price, entry: BookEntry) {
        self.levels.entry(price).or_default().insert(entry);
    }

    /// Remove an order; drops the level when it empties
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> bool {
        if let Some(level) = self.levels.get_mut(&price) {
            if level.remove(order_id).is_some() {
                if level.is_empty() {
                    self.levels.remove(&price);
                }
                return true;
            }
        }
        false
    }

    /// Highest bid price
    pub fn best_price(&self) -> Option<Price> {
        // BTreeMap iterates ascending, so the best bid is last
        self.levels.keys().next_back().copied()
    }

    pub fn best_level(&self) -> Option<(Price, &PriceLevel)> {
        self.levels.iter().next_back().map(|(p, l)| (*p, l))
    }

    pub(crate) fn best_level_mut(&mut self) -> Option<(Price, &mut PriceLevel)> {
        self.levels.iter_mut().next_back().map(|(p, l)| (*p, l))
    }

    pub(crate) fn drop_level_if_empty(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(PriceLevel::is_empty) {
            self.levels.remove(&price);
        }
    }

    /// Top N levels, highest price first
    pub fn depth(&self, n: usize) -> Vec<(Price, Quantity)> {
        self.levels
            .iter()
            .rev()
            .take(n)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::OwnerId;

    fn entry(qty: &str, seq: u64) -> BookEntry {
        BookEntry {
            order_id: OrderId::new(),
            owner_id: OwnerId::new(),
            remaining: Quantity::from_str(qty).unwrap(),
            seq,
        }
    }

    #[test]
    fn test_best_price_is_highest() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(50_000), entry("1.0", 1));
        book.insert(Price::from_u64(51_000), entry("2.0", 2));
        book.insert(Price::from_u64(49_000), entry("1.5", 3));

        assert_eq!(book.best_price(), Some(Price::from_u64(51_000)));
    }

    #[test]
    fn test_remove_drops_empty_level() {
        let mut book = BidBook::new();
        let e = entry("1.0", 1);
        book.insert(Price::from_u64(50_000), e);

        assert!(book.remove(&e.order_id, Price::from_u64(50_000)));
        assert!(book.is_empty());
        assert!(!book.remove(&e.order_id, Price::from_u64(50_000)));
    }

    #[test]
    fn test_depth_highest_first() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(50_000), entry("1.0", 1));
        book.insert(Price::from_u64(51_000), entry("2.0", 2));
        book.insert(Price::from_u64(49_000), entry("1.5", 3));
        book.insert(Price::from_u64(52_000), entry("0.5", 4));

        let depth = book.depth(2);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].0, Price::from_u64(52_000));
        assert_eq!(depth[1].0, Price::from_u64(51_000));
    }

    #[test]
    fn test_same_price_shares_level() {
        let mut book = BidBook::new();
        book.insert(Price::from_u64(50_000), entry("1.0", 1));
        book.insert(Price::from_u64(50_000), entry("2.0", 2));

        assert_eq!(book.level_count(), 1);
        let (_, level) = book.best_level().unwrap();
        assert_eq!(level.total_quantity(), Quantity::from_str("3.0").unwrap());
    }
}
