//! Error taxonomy for the transactional core
//!
//! Every failure surfaces as a structured, typed result. Nothing is
//! recovered silently except the commission hook, which settlement logs
//! and swallows.

use thiserror::Error;

/// Top-level core error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    /// A multi-step operation failed after partial writes and was rolled
    /// back fully before surfacing
    #[error("Transaction aborted: {reason}")]
    TransactionAbort { reason: String },
}

/// Wallet and reservation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Insufficient funds for asset {asset}: required {required}, available {available}")]
    InsufficientFunds {
        asset: String,
        required: String,
        available: String,
    },

    #[error("No reservation found under ref {ref_id}")]
    ReservationNotFound { ref_id: String },

    #[error("Reservation {ref_id} already released")]
    ReservationReleased { ref_id: String },

    #[error("Reservation {ref_id} already consumed")]
    ReservationConsumed { ref_id: String },

    #[error("Reservation already exists under ref {ref_id}")]
    DuplicateReservation { ref_id: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Order validation and lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("Order {order_id} does not belong to the requesting owner")]
    Unauthorized { order_id: String },

    #[error("Order {order_id} is {status} and cannot transition")]
    StatusConflict { order_id: String, status: String },

    #[error("Order already exists: {order_id}")]
    Duplicate { order_id: String },
}

/// Settlement errors
///
/// A settlement failure never corrupts the book or the ledger: the
/// failing atomic unit leaves no partial fund movement behind, and the
/// match pass that triggered it aborts with pre-match state intact.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    #[error("Fund movement failed: {0}")]
    Funds(#[from] WalletError),

    #[error("Settlement aborted: {reason}")]
    Aborted { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_error_display() {
        let err = WalletError::InsufficientFunds {
            asset: "BTC".to_string(),
            required: "1.5".to_string(),
            available: "1.0".to_string(),
        };
        assert!(err.to_string().contains("BTC"));
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_core_error_from_wallet_error() {
        let wallet_err = WalletError::ReservationNotFound {
            ref_id: "order-1".to_string(),
        };
        let core_err: CoreError = wallet_err.into();
        assert!(matches!(core_err, CoreError::Wallet(_)));
    }

    #[test]
    fn test_settlement_error_wraps_wallet_error() {
        let err: SettlementError = WalletError::InvalidAmount("negative".to_string()).into();
        assert!(matches!(err, SettlementError::Funds(_)));
    }
}
