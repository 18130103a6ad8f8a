//! Wallet Ledger Service
//!
//! Owns per-owner, per-asset balances (`available`, `locked`) and the
//! append-only journal of every change.
//!
//! **Key Invariants:**
//! - Every balance mutation commits together with exactly one journal
//!   entry, or not at all
//! - Reservations are tagged records keyed by `ref_id`, never an
//!   aggregate locked counter, so partial and independent releases stay
//!   exact
//! - `available + locked` is conserved by reserve/release; only
//!   consume, credit, debit, and settlement change the total

pub mod balance;
pub mod ledger;
pub mod reservation;

pub use balance::{Balance, BalanceKey};
pub use ledger::{TradeFunds, WalletLedger};
pub use reservation::{Reservation, ReservationState};
