//! Trade settlement
//!
//! Turns a match proposal into committed fund movements, a persisted
//! trade record, and advanced fill counters. Runs synchronously inside
//! the match pass, before the book mutates: a failure here propagates
//! up and the engine leaves both book entries untouched.
//!
//! Ordering against a concurrent cancel: the fill is claimed on both
//! order records first (a status CAS that rejects terminal orders),
//! then funds move, and a fund-movement failure rolls the claims back.
//! A cancel that wins its CAS first makes the claim fail before any
//! money moves; a cancel that loses finds the order FILLED and gets
//! `StatusConflict`. Terminal statuses never resurrect.

use std::sync::Mutex;

use rust_decimal::Decimal;
use tracing::warn;
use types::errors::SettlementError;
use types::ledger::OwnerType;
use types::numeric::Quantity;
use types::order::{Order, Side};
use types::trade::Trade;

use matching_engine::{MatchProposal, SettlementPort};
use wallet_ledger::{TradeFunds, WalletLedger};

use crate::config::FeeConfig;
use crate::store::OrderStore;

/// One-pass settlement context, built per match pass
///
/// Committed trades accumulate in `committed`; the composition root
/// drains them after the book lock is released and fires the
/// commission/notification hooks outside the matching critical path.
pub struct TradeSettler<'a> {
    pub ledger: &'a WalletLedger,
    pub store: &'a OrderStore,
    pub fees: &'a FeeConfig,
    pub now: i64,
    pub committed: Mutex<Vec<Trade>>,
}

impl<'a> TradeSettler<'a> {
    pub fn new(ledger: &'a WalletLedger, store: &'a OrderStore, fees: &'a FeeConfig, now: i64) -> Self {
        Self {
            ledger,
            store,
            fees,
            now,
            committed: Mutex::new(Vec::new()),
        }
    }

    /// Trades committed during this pass, in execution order
    pub fn into_trades(self) -> Vec<Trade> {
        self.committed.into_inner().expect("settler lock poisoned")
    }
}

impl SettlementPort for TradeSettler<'_> {
    fn settle(&self, proposal: &MatchProposal) -> Result<(), SettlementError> {
        // Claim both fills before any funds move; either claim losing
        // to a concurrent cancel aborts with nothing to undo.
        let maker = self
            .store
            .claim_fill(&proposal.maker_order_id, proposal.quantity, self.now)
            .map_err(|err| SettlementError::Aborted {
                reason: err.to_string(),
            })?;
        let taker = match self
            .store
            .claim_fill(&proposal.taker_order_id, proposal.quantity, self.now)
        {
            Ok(taker) => taker,
            Err(err) => {
                self.store
                    .unclaim_fill(&proposal.maker_order_id, proposal.quantity, self.now);
                return Err(SettlementError::Aborted {
                    reason: err.to_string(),
                });
            }
        };

        let (base, quote) = proposal.symbol.split();
        let amount = proposal.price.as_decimal() * proposal.quantity.as_decimal();
        let maker_fee = amount * self.fees.maker_rate;
        let taker_fee = amount * self.fees.taker_rate;

        // The seller's proceeds carry the fee for whichever role the
        // seller holds in this match; the buyer pays the full amount.
        let funds = match maker.side {
            Side::Sell => TradeFunds {
                buyer_id: taker.owner_id,
                seller_id: maker.owner_id,
                base: base.to_string(),
                quote: quote.to_string(),
                quantity: proposal.quantity.as_decimal(),
                amount,
                seller_proceeds: amount - maker_fee,
                buyer_order_ref: taker.order_id.to_string(),
                seller_order_ref: maker.order_id.to_string(),
            },
            Side::Buy => TradeFunds {
                buyer_id: maker.owner_id,
                seller_id: taker.owner_id,
                base: base.to_string(),
                quote: quote.to_string(),
                quantity: proposal.quantity.as_decimal(),
                amount,
                seller_proceeds: amount - taker_fee,
                buyer_order_ref: maker.order_id.to_string(),
                seller_order_ref: taker.order_id.to_string(),
            },
        };

        if let Err(err) = self.ledger.settle_trade(&funds, self.now) {
            self.store
                .unclaim_fill(&proposal.maker_order_id, proposal.quantity, self.now);
            self.store
                .unclaim_fill(&proposal.taker_order_id, proposal.quantity, self.now);
            return Err(SettlementError::Funds(err));
        }

        let trade = Trade::new(
            proposal.symbol.clone(),
            proposal.price,
            proposal.quantity,
            proposal.maker_id,
            proposal.taker_id,
            proposal.maker_order_id,
            proposal.taker_order_id,
            maker_fee,
            taker_fee,
            self.now,
        );
        self.store.record_trade(trade.clone());

        // Price improvement or estimate overshoot leaves part of a
        // completed order's reservation behind; give it back now.
        self.release_leftover(&maker);
        self.release_leftover(&taker);

        self.committed
            .lock()
            .expect("settler lock poisoned")
            .push(trade);

        Ok(())
    }
}

impl TradeSettler<'_> {
    /// `claimed` is the post-claim snapshot, so `is_filled` already
    /// accounts for this fill.
    fn release_leftover(&self, claimed: &Order) {
        if !claimed.is_filled() {
            return;
        }
        let ref_id = claimed.order_id.to_string();
        let remaining = self.ledger.reservation_remaining(&ref_id);
        if remaining.is_some_and(|r| r > Decimal::ZERO) {
            let asset = reserved_asset(claimed);
            if let Err(err) =
                self.ledger
                    .release(claimed.owner_id, OwnerType::User, &asset, &ref_id, self.now)
            {
                warn!(order_id = %claimed.order_id, %err, "leftover reservation release failed");
            }
        }
    }
}

/// Asset an order's placement reservation was taken in
pub(crate) fn reserved_asset(order: &Order) -> String {
    let (base, quote) = order.symbol.split();
    match order.side {
        Side::Buy => quote.to_string(),
        Side::Sell => base.to_string(),
    }
}
