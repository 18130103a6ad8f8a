//! The wallet ledger: balances, reservations, and the journal
//!
//! All mutating operations run under one internal lock so the balance
//! update and its journal entry become visible atomically to any
//! concurrent reader. Multi-movement settlement is staged first and
//! committed only when every movement succeeds; a failure leaves the
//! ledger untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::debug;
use types::errors::WalletError;
use types::ids::OwnerId;
use types::ledger::{EntryType, LedgerEntry, OwnerType};

use crate::balance::{Balance, BalanceKey};
use crate::reservation::{Reservation, ReservationState};

/// Fund movements of one trade, expressed in ledger terms
///
/// The buyer pays `amount` of quote (spent through their order's
/// reservation) and receives `quantity` of base; the seller delivers
/// `quantity` of base (spent through their order's reservation) and
/// receives `seller_proceeds` of quote, which is `amount` less the
/// fee for the seller's role in the match.
#[derive(Debug, Clone)]
pub struct TradeFunds {
    pub buyer_id: OwnerId,
    pub seller_id: OwnerId,
    pub base: String,
    pub quote: String,
    pub quantity: Decimal,
    pub amount: Decimal,
    pub seller_proceeds: Decimal,
    pub buyer_order_ref: String,
    pub seller_order_ref: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: BTreeMap<BalanceKey, Balance>,
    reservations: BTreeMap<String, Reservation>,
    journal: Vec<LedgerEntry>,
}

impl LedgerState {
    fn balance_mut(&mut self, key: &BalanceKey) -> &mut Balance {
        self.balances.entry(key.clone()).or_default()
    }

    fn append(
        &mut self,
        key: &BalanceKey,
        change: Decimal,
        entry_type: EntryType,
        ref_id: Option<&str>,
        meta: serde_json::Value,
        timestamp: i64,
    ) {
        let balance_after = self.balances.get(key).copied().unwrap_or_default().available;
        self.journal.push(LedgerEntry {
            owner_id: key.owner_id,
            owner_type: key.owner_type,
            asset: key.asset.clone(),
            change,
            balance_after,
            entry_type,
            ref_id: ref_id.map(str::to_string),
            meta,
            timestamp,
        });
    }
}

/// Thread-safe wallet ledger
pub struct WalletLedger {
    inner: Mutex<LedgerState>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerState::default()),
        }
    }

    /// Move `amount` from available to locked under `ref_id`
    ///
    /// Rejects a second reservation under the same `ref_id`: ref ids are
    /// order ids and an order reserves exactly once.
    pub fn reserve(
        &self,
        owner_id: OwnerId,
        owner_type: OwnerType,
        asset: &str,
        amount: Decimal,
        ref_id: &str,
        timestamp: i64,
    ) -> Result<(), WalletError> {
        require_positive(amount)?;
        let key = BalanceKey::new(owner_id, owner_type, asset);
        let mut state = self.inner.lock().expect("ledger lock poisoned");

        if state.reservations.contains_key(ref_id) {
            return Err(WalletError::DuplicateReservation {
                ref_id: ref_id.to_string(),
            });
        }

        let balance = state.balance_mut(&key);
        if balance.available < amount {
            return Err(insufficient(asset, amount, balance.available));
        }
        balance.available -= amount;
        balance.locked += amount;

        state.reservations.insert(
            ref_id.to_string(),
            Reservation::new(owner_id, owner_type, asset, amount),
        );
        state.append(
            &key,
            Decimal::ZERO,
            EntryType::Reserve,
            Some(ref_id),
            json!({ "action": "reserve", "amount": amount.to_string() }),
            timestamp,
        );
        debug!(%owner_id, asset, %amount, ref_id, "funds reserved");
        Ok(())
    }

    /// Move the reservation's remaining amount back from locked to
    /// available; returns the amount restored
    pub fn release(
        &self,
        owner_id: OwnerId,
        owner_type: OwnerType,
        asset: &str,
        ref_id: &str,
        timestamp: i64,
    ) -> Result<Decimal, WalletError> {
        let key = BalanceKey::new(owner_id, owner_type, asset);
        let mut state = self.inner.lock().expect("ledger lock poisoned");

        let amount = {
            let reservation = held_reservation(&mut state.reservations, &key, ref_id)?;
            let amount = reservation.remaining;
            reservation.remaining = Decimal::ZERO;
            reservation.state = ReservationState::Released;
            amount
        };

        let balance = state.balance_mut(&key);
        debug_assert!(balance.locked >= amount, "locked below reserved remainder");
        balance.locked -= amount;
        balance.available += amount;

        state.append(
            &key,
            Decimal::ZERO,
            EntryType::Release,
            Some(ref_id),
            json!({ "action": "release", "amount": amount.to_string() }),
            timestamp,
        );
        debug!(%owner_id, asset, %amount, ref_id, "reservation released");
        Ok(amount)
    }

    /// Permanently remove the reservation's remaining amount from
    /// locked; returns the amount consumed. Irreversible.
    ///
    /// `entry_type` names the cause in the journal (e.g. `Withdraw` when
    /// an on-chain withdrawal is confirmed).
    pub fn consume(
        &self,
        owner_id: OwnerId,
        owner_type: OwnerType,
        asset: &str,
        ref_id: &str,
        entry_type: EntryType,
        timestamp: i64,
    ) -> Result<Decimal, WalletError> {
        let key = BalanceKey::new(owner_id, owner_type, asset);
        let mut state = self.inner.lock().expect("ledger lock poisoned");

        let amount = {
            let reservation = held_reservation(&mut state.reservations, &key, ref_id)?;
            let amount = reservation.remaining;
            reservation.remaining = Decimal::ZERO;
            reservation.state = ReservationState::Consumed;
            amount
        };

        let balance = state.balance_mut(&key);
        debug_assert!(balance.locked >= amount, "locked below reserved remainder");
        balance.locked -= amount;

        state.append(
            &key,
            -amount,
            entry_type,
            Some(ref_id),
            json!({ "action": "consume", "amount": amount.to_string() }),
            timestamp,
        );
        debug!(%owner_id, asset, %amount, ref_id, "reservation consumed");
        Ok(amount)
    }

    /// Adjust available directly (deposit, trade proceeds, commission)
    pub fn credit(
        &self,
        owner_id: OwnerId,
        owner_type: OwnerType,
        asset: &str,
        amount: Decimal,
        entry_type: EntryType,
        ref_id: Option<&str>,
        timestamp: i64,
    ) -> Result<(), WalletError> {
        require_positive(amount)?;
        let key = BalanceKey::new(owner_id, owner_type, asset);
        let mut state = self.inner.lock().expect("ledger lock poisoned");

        state.balance_mut(&key).available += amount;
        state.append(
            &key,
            amount,
            entry_type,
            ref_id,
            json!({ "action": "credit", "amount": amount.to_string() }),
            timestamp,
        );
        Ok(())
    }

    /// Deduct from available directly
    pub fn debit(
        &self,
        owner_id: OwnerId,
        owner_type: OwnerType,
        asset: &str,
        amount: Decimal,
        entry_type: EntryType,
        ref_id: Option<&str>,
        timestamp: i64,
    ) -> Result<(), WalletError> {
        require_positive(amount)?;
        let key = BalanceKey::new(owner_id, owner_type, asset);
        let mut state = self.inner.lock().expect("ledger lock poisoned");

        let balance = state.balance_mut(&key);
        if balance.available < amount {
            return Err(insufficient(asset, amount, balance.available));
        }
        balance.available -= amount;

        state.append(
            &key,
            -amount,
            entry_type,
            ref_id,
            json!({ "action": "debit", "amount": amount.to_string() }),
            timestamp,
        );
        Ok(())
    }

    /// Execute all four fund movements of one trade as a single atomic
    /// unit
    ///
    /// Movements are applied to a staged copy of the affected balances
    /// and reservations first; only when every movement succeeds is the
    /// staged state written back together with its four journal
    /// entries. On failure nothing changes.
    pub fn settle_trade(&self, funds: &TradeFunds, timestamp: i64) -> Result<(), WalletError> {
        let mut state = self.inner.lock().expect("ledger lock poisoned");

        let buyer_quote = BalanceKey::new(funds.buyer_id, OwnerType::User, &funds.quote);
        let buyer_base = BalanceKey::new(funds.buyer_id, OwnerType::User, &funds.base);
        let seller_base = BalanceKey::new(funds.seller_id, OwnerType::User, &funds.base);
        let seller_quote = BalanceKey::new(funds.seller_id, OwnerType::User, &funds.quote);

        let mut staged = Staging::capture(
            &state,
            [&buyer_quote, &buyer_base, &seller_base, &seller_quote],
            [&funds.buyer_order_ref, &funds.seller_order_ref],
        );

        // Buyer pays quote through their reservation, receives base.
        staged.settle_debit(&buyer_quote, &funds.buyer_order_ref, funds.amount)?;
        staged.credit(&buyer_base, funds.quantity);
        // Seller delivers base through their reservation, receives quote
        // less the fee for their role.
        staged.settle_debit(&seller_base, &funds.seller_order_ref, funds.quantity)?;
        staged.credit(&seller_quote, funds.seller_proceeds);

        staged.commit(&mut state);

        let trade_meta = |leg: &str, amount: &Decimal| {
            json!({ "action": leg, "amount": amount.to_string() })
        };
        state.append(
            &buyer_quote,
            -funds.amount,
            EntryType::Trade,
            Some(&funds.buyer_order_ref),
            trade_meta("trade_debit", &funds.amount),
            timestamp,
        );
        state.append(
            &buyer_base,
            funds.quantity,
            EntryType::Trade,
            Some(&funds.buyer_order_ref),
            trade_meta("trade_credit", &funds.quantity),
            timestamp,
        );
        state.append(
            &seller_base,
            -funds.quantity,
            EntryType::Trade,
            Some(&funds.seller_order_ref),
            trade_meta("trade_debit", &funds.quantity),
            timestamp,
        );
        state.append(
            &seller_quote,
            funds.seller_proceeds,
            EntryType::Trade,
            Some(&funds.seller_order_ref),
            trade_meta("trade_credit", &funds.seller_proceeds),
            timestamp,
        );
        Ok(())
    }

    /// Current balance for one (owner, asset) pair; zero if never seen
    pub fn balance(&self, owner_id: OwnerId, owner_type: OwnerType, asset: &str) -> Balance {
        let key = BalanceKey::new(owner_id, owner_type, asset);
        let state = self.inner.lock().expect("ledger lock poisoned");
        state.balances.get(&key).copied().unwrap_or_default()
    }

    /// Time-ordered journal entries for one (owner, asset) pair
    pub fn entries(&self, owner_id: OwnerId, owner_type: OwnerType, asset: &str) -> Vec<LedgerEntry> {
        let state = self.inner.lock().expect("ledger lock poisoned");
        state
            .journal
            .iter()
            .filter(|e| e.owner_id == owner_id && e.owner_type == owner_type && e.asset == asset)
            .cloned()
            .collect()
    }

    /// Amount still locked under `ref_id`, if the reservation is held
    pub fn reservation_remaining(&self, ref_id: &str) -> Option<Decimal> {
        let state = self.inner.lock().expect("ledger lock poisoned");
        state
            .reservations
            .get(ref_id)
            .filter(|r| r.is_held())
            .map(|r| r.remaining)
    }
}

impl Default for WalletLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Staged copies of the balances and reservations a settlement touches
struct Staging {
    balances: HashMap<BalanceKey, Balance>,
    reservations: HashMap<String, Option<Reservation>>,
}

impl Staging {
    fn capture<'a>(
        state: &LedgerState,
        keys: impl IntoIterator<Item = &'a BalanceKey>,
        refs: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let balances = keys
            .into_iter()
            .map(|k| (k.clone(), state.balances.get(k).copied().unwrap_or_default()))
            .collect();
        let reservations = refs
            .into_iter()
            .map(|r| (r.clone(), state.reservations.get(r).cloned()))
            .collect();
        Self {
            balances,
            reservations,
        }
    }

    /// Spend `amount` of the key's asset: first from the reservation's
    /// locked remainder, then any shortfall from available (market-order
    /// slippage beyond the estimate)
    fn settle_debit(&mut self, key: &BalanceKey, ref_id: &str, amount: Decimal) -> Result<(), WalletError> {
        let balance = self.balances.get_mut(key).expect("balance staged");

        let from_locked = match self.reservations.get_mut(ref_id) {
            Some(Some(res)) if res.is_held() && res.asset == key.asset && res.owner_id == key.owner_id => {
                let take = res.remaining.min(amount);
                res.remaining -= take;
                if res.remaining.is_zero() {
                    res.state = ReservationState::Consumed;
                }
                take
            }
            _ => Decimal::ZERO,
        };

        let shortfall = amount - from_locked;
        if balance.available < shortfall {
            return Err(insufficient(&key.asset, shortfall, balance.available));
        }
        debug_assert!(balance.locked >= from_locked, "locked below reserved remainder");
        balance.locked -= from_locked;
        balance.available -= shortfall;
        Ok(())
    }

    fn credit(&mut self, key: &BalanceKey, amount: Decimal) {
        self.balances.get_mut(key).expect("balance staged").available += amount;
    }

    fn commit(self, state: &mut LedgerState) {
        for (key, balance) in self.balances {
            debug_assert!(balance.check_invariant());
            state.balances.insert(key, balance);
        }
        for (ref_id, reservation) in self.reservations {
            if let Some(reservation) = reservation {
                state.reservations.insert(ref_id, reservation);
            }
        }
    }
}

fn require_positive(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(amount.to_string()));
    }
    Ok(())
}

fn insufficient(asset: &str, required: Decimal, available: Decimal) -> WalletError {
    WalletError::InsufficientFunds {
        asset: asset.to_string(),
        required: required.to_string(),
        available: available.to_string(),
    }
}

/// Look up a reservation that must exist, belong to the key, and still
/// be held
fn held_reservation<'a>(
    reservations: &'a mut BTreeMap<String, Reservation>,
    key: &BalanceKey,
    ref_id: &str,
) -> Result<&'a mut Reservation, WalletError> {
    let reservation = reservations
        .get_mut(ref_id)
        .filter(|r| r.owner_id == key.owner_id && r.owner_type == key.owner_type && r.asset == key.asset)
        .ok_or_else(|| WalletError::ReservationNotFound {
            ref_id: ref_id.to_string(),
        })?;
    match reservation.state {
        ReservationState::Held => Ok(reservation),
        ReservationState::Released => Err(WalletError::ReservationReleased {
            ref_id: ref_id.to_string(),
        }),
        ReservationState::Consumed => Err(WalletError::ReservationConsumed {
            ref_id: ref_id.to_string(),
        }),
    }
}
