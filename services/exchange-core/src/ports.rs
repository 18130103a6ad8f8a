//! External integration points
//!
//! Everything outside the transactional core comes in through these
//! traits; the composition root wires concrete implementations by
//! constructor passing.

use matching_engine::BookDepth;
use rust_decimal::Decimal;
use types::ids::OwnerId;
use types::trade::Trade;

/// Affiliate commission fan-out, fired after a trade commits
///
/// Best-effort: settlement logs a failure and moves on; it never
/// unwinds the committed trade.
pub trait CommissionHook: Send + Sync {
    fn commission(&self, taker_id: OwnerId, maker_id: OwnerId, amount: Decimal)
        -> anyhow::Result<()>;
}

/// Notification fan-out, fired after committed mutations; at-most-once
pub trait MarketEvents: Send + Sync {
    fn on_book_update(&self, _symbol: &str, _depth: &BookDepth) {}
    fn on_trade(&self, _symbol: &str, _trade: &Trade) {}
}

/// On-chain withdrawal executor, called between reserve and consume
///
/// The core does not retry on the executor's behalf: a failure releases
/// the reservation and surfaces to the caller.
pub trait WithdrawalExecutor: Send + Sync {
    fn send(&self, asset: &str, address: &str, amount: Decimal) -> anyhow::Result<()>;
}

/// No-op implementations for deployments without the external systems
pub struct NoCommission;

impl CommissionHook for NoCommission {
    fn commission(&self, _: OwnerId, _: OwnerId, _: Decimal) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct NoEvents;

impl MarketEvents for NoEvents {}

pub struct NoWithdrawals;

impl WithdrawalExecutor for NoWithdrawals {
    fn send(&self, _: &str, _: &str, _: Decimal) -> anyhow::Result<()> {
        anyhow::bail!("no withdrawal executor configured")
    }
}
