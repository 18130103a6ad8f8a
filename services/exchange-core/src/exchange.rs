//! Exchange composition root
//!
//! Owns the ledger, the order store, and the per-symbol book registry,
//! and wires the external ports in by constructor. All public
//! operations take an explicit `now` timestamp (Unix nanoseconds) so
//! behavior stays deterministic under test.
//!
//! Concurrency: each symbol's book sits behind its own mutex, held
//! across insert + match so matching within a symbol is strictly
//! serialized while symbols proceed in parallel. Lifecycle races
//! (cancel vs concurrent fill) resolve through status CAS on the order
//! records, never by locking a book for the duration of a cancel.
//! Commission and notification hooks fire after the book lock is
//! released, outside the matching critical path.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use matching_engine::{match_market, match_symbol, BookDepth, OrderBook};
use persistence::{BookSnapshot, SnapshotStore};
use types::errors::{CoreError, OrderError, WalletError};
use types::ids::{MarketId, OrderId, OwnerId};
use types::ledger::{EntryType, LedgerEntry, OwnerType};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, OrderType, Side};
use types::trade::Trade;
use wallet_ledger::{Balance, WalletLedger};

use crate::config::ExchangeConfig;
use crate::ports::{CommissionHook, MarketEvents, NoCommission, NoEvents, NoWithdrawals, WithdrawalExecutor};
use crate::settlement::{reserved_asset, TradeSettler};
use crate::store::OrderStore;

/// Order placement request
#[derive(Debug, Clone)]
pub struct PlaceRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; for MARKET orders the reservation estimate
    pub price: Option<Price>,
    pub quantity: Quantity,
    /// Optional expiry deadline (Unix nanos)
    pub expires_at: Option<i64>,
}

pub struct Exchange {
    ledger: WalletLedger,
    store: OrderStore,
    /// Per-symbol book registry; the only process-wide mutable state,
    /// rebuildable from the order store
    books: DashMap<String, Arc<Mutex<OrderBook>>>,
    config: ExchangeConfig,
    snapshots: Option<SnapshotStore>,
    commission: Arc<dyn CommissionHook>,
    events: Arc<dyn MarketEvents>,
    withdrawals: Arc<dyn WithdrawalExecutor>,
}

impl Exchange {
    pub fn new(config: ExchangeConfig) -> Self {
        let snapshots = config.snapshot_dir.clone().map(SnapshotStore::new);
        Self {
            ledger: WalletLedger::new(),
            store: OrderStore::new(),
            books: DashMap::new(),
            config,
            snapshots,
            commission: Arc::new(NoCommission),
            events: Arc::new(NoEvents),
            withdrawals: Arc::new(NoWithdrawals),
        }
    }

    pub fn with_ports(
        config: ExchangeConfig,
        commission: Arc<dyn CommissionHook>,
        events: Arc<dyn MarketEvents>,
        withdrawals: Arc<dyn WithdrawalExecutor>,
    ) -> Self {
        let mut exchange = Self::new(config);
        exchange.commission = commission;
        exchange.events = events;
        exchange.withdrawals = withdrawals;
        exchange
    }

    /// Seed a cold-started exchange with previously persisted orders
    /// and rebuild each affected symbol's book from its NEW/OPEN records
    ///
    /// Books are built eagerly so depth queries and matching see the
    /// recovered liquidity immediately, without waiting for the first
    /// placement on the symbol.
    pub fn recover(&self, orders: Vec<Order>) -> Result<(), CoreError> {
        for order in orders {
            self.store.insert(order)?;
        }
        for symbol in self.store.active_symbols() {
            if let Some(symbol) = MarketId::try_new(symbol) {
                self.book_for(&symbol);
            }
        }
        Ok(())
    }

    // ── Funding ─────────────────────────────────────────────────────

    /// Credit an external deposit to available balance
    pub fn deposit(
        &self,
        owner_id: OwnerId,
        asset: &str,
        amount: Decimal,
        now: i64,
    ) -> Result<(), CoreError> {
        self.ledger
            .credit(owner_id, OwnerType::User, asset, amount, EntryType::Deposit, None, now)?;
        Ok(())
    }

    /// Reserve, send on-chain, then consume; release on executor failure
    pub fn request_withdrawal(
        &self,
        owner_id: OwnerId,
        asset: &str,
        amount: Decimal,
        address: &str,
        now: i64,
    ) -> Result<(), CoreError> {
        let ref_id = format!("wd-{}", Uuid::now_v7());
        self.ledger
            .reserve(owner_id, OwnerType::User, asset, amount, &ref_id, now)?;

        match self.withdrawals.send(asset, address, amount) {
            Ok(()) => {
                self.ledger
                    .consume(owner_id, OwnerType::User, asset, &ref_id, EntryType::Withdraw, now)?;
                info!(%owner_id, asset, %amount, ref_id, "withdrawal confirmed");
                Ok(())
            }
            Err(err) => {
                self.ledger
                    .release(owner_id, OwnerType::User, asset, &ref_id, now)?;
                Err(CoreError::TransactionAbort {
                    reason: format!("withdrawal executor failed: {err}"),
                })
            }
        }
    }

    // ── Order lifecycle ─────────────────────────────────────────────

    /// Validate, reserve funds, persist the order, then show it to the
    /// book and match
    pub fn place(&self, owner_id: OwnerId, request: PlaceRequest, now: i64) -> Result<Order, CoreError> {
        let (symbol, price) = validate(&request)?;

        let order = Order::new(
            owner_id,
            symbol.clone(),
            request.side,
            request.order_type,
            Some(price),
            request.quantity,
            request.expires_at,
            now,
        );

        // Reservation first: the order is never visible anywhere while
        // its funds are unbacked.
        let (base, quote) = symbol.split();
        let (reserve_asset, reserve_amount) = match request.side {
            Side::Buy => (quote.to_string(), price.as_decimal() * request.quantity.as_decimal()),
            Side::Sell => (base.to_string(), request.quantity.as_decimal()),
        };
        let ref_id = order.order_id.to_string();
        self.ledger
            .reserve(owner_id, OwnerType::User, &reserve_asset, reserve_amount, &ref_id, now)?;

        // Resolve the book before the store sees the order: a
        // first-reference rebuild must not load the being-placed order
        // and double it against the insert below.
        let book = self.book_for(&symbol);

        if let Err(err) = self.store.insert(order.clone()) {
            // Roll the reservation back before surfacing.
            if let Err(release_err) =
                self.ledger.release(owner_id, OwnerType::User, &reserve_asset, &ref_id, now)
            {
                warn!(order_id = %order.order_id, %release_err, "rollback release failed");
            }
            return Err(CoreError::TransactionAbort {
                reason: format!("order insert failed: {err}"),
            });
        }

        let mut guard = book.lock().expect("book lock poisoned");
        let settler = TradeSettler::new(&self.ledger, &self.store, &self.config.fees, now);

        let outcome = match request.order_type {
            OrderType::Limit => {
                guard.insert(request.side, price, order.order_id, owner_id, request.quantity);
                self.store.mark_open(&order.order_id, now);
                match_symbol(&mut guard, &settler)
            }
            OrderType::Market => match_market(
                &mut guard,
                request.side,
                order.order_id,
                owner_id,
                request.quantity,
                &settler,
            ),
        };

        let depth = guard.depth(self.config.snapshot_depth);
        drop(guard);

        if let Some(err) = &outcome.aborted {
            // The failed fill moved no funds and the book kept both
            // entries; surface for reconciliation but keep the order.
            warn!(order_id = %order.order_id, %err, "match pass aborted after settlement failure");
        }

        // A market order never rests: cancel any unfilled remainder and
        // give the unused reservation back.
        if request.order_type == OrderType::Market {
            self.finish_market_order(&order.order_id, now);
        }

        // Hooks fire with the book lock released, outside the matching
        // critical path.
        for trade in settler.into_trades() {
            if let Err(err) = self
                .commission
                .commission(trade.taker_id, trade.maker_id, trade.amount)
            {
                warn!(trade_id = %trade.trade_id, %err, "commission hook failed");
            }
            self.events.on_trade(symbol.as_str(), &trade);
        }
        self.publish_book(&symbol, &depth, now);

        Ok(self.store.get(&order.order_id).unwrap_or(order))
    }

    /// Cancel an active order owned by `owner_id`
    ///
    /// The status CAS decides the race with a concurrent fill: if the
    /// order went terminal first, this returns `Conflict` and nothing
    /// is released twice. A fill claim that lands after the CAS is
    /// rejected by the store, so the cancelled order never resurrects.
    pub fn cancel(&self, owner_id: OwnerId, order_id: &OrderId, now: i64) -> Result<Order, CoreError> {
        let order = self.store.get(order_id).ok_or(OrderError::NotFound {
            order_id: order_id.to_string(),
        })?;
        if order.owner_id != owner_id {
            return Err(OrderError::Unauthorized {
                order_id: order_id.to_string(),
            }
            .into());
        }

        let cancelled = self.store.transition(order_id, OrderStatus::Cancelled, now)?;
        self.release_reservation(&cancelled, now);
        self.remove_from_book(&cancelled, now);
        Ok(cancelled)
    }

    /// Expire every active order whose deadline has passed
    ///
    /// Idempotent: a second sweep finds the orders already terminal and
    /// touches nothing.
    pub fn expire(&self, now: i64) -> Vec<Order> {
        let mut expired = Vec::new();
        for order in self.store.expired_at(now) {
            match self.store.transition(&order.order_id, OrderStatus::Expired, now) {
                Ok(updated) => {
                    self.release_reservation(&updated, now);
                    self.remove_from_book(&updated, now);
                    expired.push(updated);
                }
                // Lost the race to a fill or cancel; skip.
                Err(_) => continue,
            }
        }
        expired
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.store.get(order_id)
    }

    pub fn orders_for(&self, owner_id: &OwnerId) -> Vec<Order> {
        self.store.orders_for(owner_id)
    }

    pub fn trades(&self, symbol: &str) -> Vec<Trade> {
        self.store.trades(symbol)
    }

    pub fn balance(&self, owner_id: OwnerId, asset: &str) -> Balance {
        self.ledger.balance(owner_id, OwnerType::User, asset)
    }

    pub fn ledger_entries(&self, owner_id: OwnerId, owner_type: OwnerType, asset: &str) -> Vec<LedgerEntry> {
        self.ledger.entries(owner_id, owner_type, asset)
    }

    pub fn book_depth(&self, symbol: &str, n: usize) -> Option<BookDepth> {
        self.books
            .get(symbol)
            .map(|book| book.lock().expect("book lock poisoned").depth(n))
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Fetch or build the book for a symbol, rebuilding from the order
    /// store's active orders on first reference
    fn book_for(&self, symbol: &MarketId) -> Arc<Mutex<OrderBook>> {
        self.books
            .entry(symbol.as_str().to_string())
            .or_insert_with(|| {
                let mut book = OrderBook::new(symbol.clone());
                for order in self.store.open_orders(symbol.as_str()) {
                    if order.order_type != OrderType::Limit {
                        continue;
                    }
                    if let Some(price) = order.price {
                        book.insert(order.side, price, order.order_id, order.owner_id, order.remaining());
                    }
                }
                Arc::new(Mutex::new(book))
            })
            .clone()
    }

    /// Release whatever is still reserved under the order's ref id
    ///
    /// Tolerates an already-consumed reservation: settlement consumes
    /// exactly at full fill, and the CAS upstream guarantees this runs
    /// at most once per order.
    fn release_reservation(&self, order: &Order, now: i64) {
        let ref_id = order.order_id.to_string();
        let asset = reserved_asset(order);
        match self.ledger.release(order.owner_id, OwnerType::User, &asset, &ref_id, now) {
            Ok(_) => {}
            Err(WalletError::ReservationConsumed { .. }) | Err(WalletError::ReservationNotFound { .. }) => {}
            Err(err) => {
                warn!(order_id = %order.order_id, %err, "reservation release failed");
            }
        }
    }

    fn remove_from_book(&self, order: &Order, now: i64) {
        let book = self.book_for(&order.symbol);
        let mut guard = book.lock().expect("book lock poisoned");
        if guard.remove(&order.order_id) {
            let depth = guard.depth(self.config.snapshot_depth);
            drop(guard);
            self.publish_book(&order.symbol, &depth, now);
        }
    }

    /// Cancel a market order's unfilled remainder
    fn finish_market_order(&self, order_id: &OrderId, now: i64) {
        if let Ok(cancelled) = self.store.transition(order_id, OrderStatus::Cancelled, now) {
            self.release_reservation(&cancelled, now);
        }
    }

    /// Persist the top-N snapshot and fan out the book update
    fn publish_book(&self, symbol: &MarketId, depth: &BookDepth, now: i64) {
        if let Some(store) = &self.snapshots {
            let snapshot = BookSnapshot::from_depth(depth, now);
            if let Err(err) = store.write(&snapshot) {
                // Cache only; the authoritative state lives in the
                // order store.
                warn!(symbol = symbol.as_str(), %err, "book snapshot write failed");
            }
        }
        self.events.on_book_update(symbol.as_str(), depth);
    }
}

/// Reject malformed requests before any mutation
fn validate(request: &PlaceRequest) -> Result<(MarketId, Price), CoreError> {
    let symbol = MarketId::try_new(&request.symbol).ok_or(OrderError::InvalidSymbol {
        symbol: request.symbol.clone(),
    })?;

    if request.quantity.is_zero() {
        return Err(OrderError::InvalidQuantity(request.quantity.to_string()).into());
    }

    // MARKET orders need the price as a reservation estimate; slippage
    // sizing is the caller's responsibility.
    let price = request.price.ok_or_else(|| OrderError::InvalidPrice("missing".to_string()))?;
    if price.is_zero() {
        return Err(OrderError::InvalidPrice(price.to_string()).into());
    }

    Ok((symbol, price))
}
