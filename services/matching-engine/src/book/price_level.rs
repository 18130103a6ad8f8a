//! Price level with a FIFO queue
//!
//! A price level holds every resting order at one price point. Orders
//! queue in arrival order so time priority falls out of the structure.

use std::collections::VecDeque;
use types::ids::{OrderId, OwnerId};
use types::numeric::Quantity;

/// A resting order's footprint in the book
///
/// `seq` is the book-wide arrival number; the entry with the smaller
/// `seq` in a crossed pair is the maker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookEntry {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    pub remaining: Quantity,
    pub seq: u64,
}

/// All orders resting at one price, FIFO
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<BookEntry>,
    total_quantity: Quantity,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_quantity: Quantity::zero(),
        }
    }

    /// Append an entry at the back of the queue (time priority)
    pub fn insert(&mut self, entry: BookEntry) {
        self.total_quantity = self.total_quantity + entry.remaining;
        self.orders.push_back(entry);
    }

    /// Remove an entry by order id
    ///
    /// Returns the removed entry's remaining quantity, or None if the
    /// order is not at this level.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self.orders.iter().position(|e| &e.order_id == order_id)?;
        let entry = self.orders.remove(position)?;
        self.total_quantity = self.total_quantity.saturating_sub(entry.remaining);
        Some(entry.remaining)
    }

    /// The front entry, without removing it
    pub fn peek_front(&self) -> Option<&BookEntry> {
        self.orders.front()
    }

    /// Reduce the front entry by `filled`; removes it when exhausted
    ///
    /// Returns true if the front entry left the level.
    pub fn fill_front(&mut self, filled: Quantity) -> bool {
        let Some(entry) = self.orders.front_mut() else {
            return false;
        };
        entry.remaining = entry.remaining.saturating_sub(filled);
        self.total_quantity = self.total_quantity.saturating_sub(filled);
        if entry.remaining.is_zero() {
            self.orders.pop_front();
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Sum of remaining quantities at this level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(qty: &str, seq: u64) -> BookEntry {
        BookEntry {
            order_id: OrderId::new(),
            owner_id: OwnerId::new(),
            remaining: Quantity::from_str(qty).unwrap(),
            seq,
        }
    }

    #[test]
    fn test_insert_keeps_fifo_order() {
        let mut level = PriceLevel::new();
        let first = entry("1.0", 1);
        let second = entry("2.0", 2);

        level.insert(first);
        level.insert(second);

        assert_eq!(level.peek_front().unwrap().order_id, first.order_id);
        assert_eq!(level.total_quantity(), Quantity::from_str("3.0").unwrap());
    }

    #[test]
    fn test_remove_updates_total() {
        let mut level = PriceLevel::new();
        let first = entry("1.0", 1);
        let second = entry("2.0", 2);
        level.insert(first);
        level.insert(second);

        let removed = level.remove(&first.order_id);
        assert_eq!(removed, Some(Quantity::from_str("1.0").unwrap()));
        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_quantity(), Quantity::from_str("2.0").unwrap());
        assert_eq!(level.remove(&first.order_id), None);
    }

    #[test]
    fn test_fill_front_partial_then_exhaust() {
        let mut level = PriceLevel::new();
        level.insert(entry("5.0", 1));

        assert!(!level.fill_front(Quantity::from_str("3.0").unwrap()));
        assert_eq!(level.total_quantity(), Quantity::from_str("2.0").unwrap());
        assert_eq!(level.order_count(), 1);

        assert!(level.fill_front(Quantity::from_str("2.0").unwrap()));
        assert!(level.is_empty());
        assert_eq!(level.total_quantity(), Quantity::zero());
    }
}
