//! Order matching engine
//!
//! Price-time priority matching over per-symbol order books.
//!
//! **Key invariants:**
//! - Price-time priority strictly enforced (best price first, FIFO
//!   within a price level)
//! - Execution price is always the resting (maker) order's price
//! - Funds move before the book does: each match is settled through
//!   the [`SettlementPort`] and the book is only mutated on success

pub mod book;
pub mod matching;

pub use book::{BookDepth, BookEntry, OrderBook};
pub use matching::{match_market, match_symbol, MatchOutcome, MatchProposal, SettlementPort};
