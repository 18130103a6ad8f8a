//! Types library for the exchange transactional core
//!
//! This library provides all core type definitions shared across the
//! matching engine, wallet ledger, and order lifecycle services.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, TradeId, OwnerId, MarketId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `order`: Order lifecycle types
//! - `trade`: Trade record types
//! - `ledger`: Journal entry and owner types
//! - `errors`: Error taxonomy

pub mod errors;
pub mod ids;
pub mod ledger;
pub mod numeric;
pub mod order;
pub mod trade;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::ledger::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::trade::*;
}
