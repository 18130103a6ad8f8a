//! Exchange transactional core
//!
//! Composition root tying the wallet ledger, the order store, and the
//! per-symbol matching books into one placement/cancel/settlement
//! surface.
//!
//! The invariant the whole crate defends: an order is only ever shown
//! to the book after its funds are reserved, and funds only move
//! through settled trades or explicit reservation releases. Any
//! multi-step failure rolls back before it surfaces.

pub mod config;
pub mod exchange;
pub mod ports;
pub mod settlement;
pub mod store;

pub use config::{ExchangeConfig, FeeConfig};
pub use exchange::{Exchange, PlaceRequest};
pub use ports::{CommissionHook, MarketEvents, WithdrawalExecutor};
pub use store::OrderStore;
