//! Ask (sell-side) book
//!
//! Sell orders sorted by price ascending, best ask first.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::{Price, Quantity};

use super::price_level::{BookEntry, PriceLevel};

#[derive(Debug, Clone, Default)]
pub struct AskBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
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

    /// Lowest ask price
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
    }

    pub fn best_level(&self) -> Option<(Price, &PriceLevel)> {
        self.levels.iter().next().map(|(p, l)| (*p, l))
    }

    pub(crate) fn best_level_mut(&mut self) -> Option<(Price, &mut PriceLevel)> {
        self.levels.iter_mut().next().map(|(p, l)| (*p, l))
    }

    pub(crate) fn drop_level_if_empty(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(PriceLevel::is_empty) {
            self.levels.remove(&price);
        }
    }

    /// Top N levels, lowest price first
    pub fn depth(&self, n: usize) -> Vec<(Price, Quantity)> {
        self.levels
            .iter()
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
    fn test_best_price_is_lowest() {
        let mut book = AskBook::new();
        book.insert(Price::from_u64(50_000), entry("1.0", 1));
        book.insert(Price::from_u64(51_000), entry("2.0", 2));
        book.insert(Price::from_u64(49_000), entry("1.5", 3));

        assert_eq!(book.best_price(), Some(Price::from_u64(49_000)));
    }

    #[test]
    fn test_depth_lowest_first() {
        let mut book = AskBook::new();
        book.insert(Price::from_u64(50_000), entry("1.0", 1));
        book.insert(Price::from_u64(51_000), entry("2.0", 2));
        book.insert(Price::from_u64(49_000), entry("1.5", 3));

        let depth = book.depth(2);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].0, Price::from_u64(49_000));
        assert_eq!(depth[1].0, Price::from_u64(50_000));
    }
}
