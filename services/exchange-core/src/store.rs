//! Order and trade store
//!
//! Exclusive owner of order records. Book entries are projections of
//! these records; whenever the two could disagree, the store wins.
//! Status transitions and fill claims go through compare-and-swap so
//! lifecycle races (cancel vs concurrent fill) resolve without locking
//! any book.

use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use types::errors::OrderError;
use types::ids::{OrderId, OwnerId};
use types::numeric::Quantity;
use types::order::{Order, OrderStatus};
use types::trade::Trade;

#[derive(Default)]
pub struct OrderStore {
    orders: DashMap<OrderId, Order>,
    trades: Mutex<Vec<Trade>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) -> Result<(), OrderError> {
        match self.orders.entry(order.order_id) {
            Entry::Occupied(_) => Err(OrderError::Duplicate {
                order_id: order.order_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<Order> {
        self.orders.get(order_id).map(|r| r.clone())
    }

    /// Compare-and-swap into a terminal status
    ///
    /// Succeeds only while the order is still NEW or OPEN; a concurrent
    /// fill or cancel that got there first surfaces as `StatusConflict`.
    pub fn transition(
        &self,
        order_id: &OrderId,
        to: OrderStatus,
        timestamp: i64,
    ) -> Result<Order, OrderError> {
        let mut order = self.orders.get_mut(order_id).ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })?;
        if !order.status.is_active() {
            return Err(OrderError::StatusConflict {
                order_id: order_id.to_string(),
                status: format!("{:?}", order.status),
            });
        }
        order.status = to;
        order.updated_at = timestamp;
        Ok(order.clone())
    }

    /// Mark a NEW order as resting on the book
    pub fn mark_open(&self, order_id: &OrderId, timestamp: i64) {
        if let Some(mut order) = self.orders.get_mut(order_id) {
            if order.status == OrderStatus::New {
                order.status = OrderStatus::Open;
                order.updated_at = timestamp;
            }
        }
    }

    /// Claim a fill on an order: the settlement-side half of the
    /// cancel-vs-fill CAS
    ///
    /// Rejects the claim if the order is no longer active or the fill
    /// exceeds the remainder; the caller must claim before moving any
    /// funds and roll the claim back with [`unclaim_fill`] if the fund
    /// movement fails.
    ///
    /// [`unclaim_fill`]: OrderStore::unclaim_fill
    pub fn claim_fill(
        &self,
        order_id: &OrderId,
        quantity: Quantity,
        timestamp: i64,
    ) -> Result<Order, OrderError> {
        let mut order = self.orders.get_mut(order_id).ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })?;
        order.add_fill(quantity, timestamp)?;
        Ok(order.clone())
    }

    /// Roll back a fill claim whose settlement failed
    ///
    /// Restores the fill counter; a FILLED status caused by the claim
    /// drops back to OPEN, while a terminal status set by a concurrent
    /// cancel in the meantime is left alone.
    pub fn unclaim_fill(&self, order_id: &OrderId, quantity: Quantity, timestamp: i64) {
        if let Some(mut order) = self.orders.get_mut(order_id) {
            order.filled = order.filled.saturating_sub(quantity);
            if order.status == OrderStatus::Filled {
                order.status = OrderStatus::Open;
            }
            order.updated_at = timestamp;
        }
    }

    /// Active orders whose expiry deadline has passed
    pub fn expired_at(&self, now: i64) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|o| o.status.is_active() && o.is_expired_at(now))
            .map(|o| o.clone())
            .collect()
    }

    pub fn orders_for(&self, owner_id: &OwnerId) -> Vec<Order> {
        let mut result: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| &o.owner_id == owner_id)
            .map(|o| o.clone())
            .collect();
        result.sort_by_key(|o| o.created_at);
        result
    }

    /// NEW/OPEN orders for one symbol, oldest first — the input for a
    /// cold-start book rebuild
    pub fn open_orders(&self, symbol: &str) -> Vec<Order> {
        let mut result: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.status.is_active() && o.symbol.as_str() == symbol)
            .map(|o| o.clone())
            .collect();
        result.sort_by_key(|o| o.created_at);
        result
    }

    /// Symbols with at least one NEW/OPEN order
    pub fn active_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .orders
            .iter()
            .filter(|o| o.status.is_active())
            .map(|o| o.symbol.as_str().to_string())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    pub fn record_trade(&self, trade: Trade) {
        self.trades
            .lock()
            .expect("trade store lock poisoned")
            .push(trade);
    }

    pub fn trades(&self, symbol: &str) -> Vec<Trade> {
        self.trades
            .lock()
            .expect("trade store lock poisoned")
            .iter()
            .filter(|t| t.symbol.as_str() == symbol)
            .cloned()
            .collect()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.lock().expect("trade store lock poisoned").len()
    }
}
