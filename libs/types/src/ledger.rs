//! Journal entry and owner types for the wallet ledger
//!
//! Ledger entries are immutable and append-only; they are never updated
//! or deleted. `ref_id` links each entry back to the order, trade, or
//! transaction that caused it.

use crate::ids::OwnerId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of balance owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OwnerType {
    User,
    Affiliate,
}

/// Cause of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    /// External deposit credited to available
    Deposit,
    /// Reserved funds permanently removed for an on-chain withdrawal
    Withdraw,
    /// Available moved to locked under a reservation
    Reserve,
    /// Locked moved back to available
    Release,
    /// Fund movement from trade settlement
    Trade,
    /// Affiliate commission credit
    Commission,
}

/// One immutable journal record
///
/// `change` is the signed delta to the owner's total holdings of the
/// asset; reserve/release entries carry `change = 0` (they only move
/// funds between `available` and `locked`) with the moved amount in
/// `meta`. `balance_after` is the available balance after the
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub owner_id: OwnerId,
    pub owner_type: OwnerType,
    pub asset: String,
    pub change: Decimal,
    pub balance_after: Decimal,
    pub entry_type: EntryType,
    pub ref_id: Option<String>,
    pub meta: serde_json::Value,
    pub timestamp: i64, // Unix nanos
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_type_wire_names() {
        assert_eq!(serde_json::to_string(&EntryType::Deposit).unwrap(), "\"DEPOSIT\"");
        assert_eq!(serde_json::to_string(&EntryType::Withdraw).unwrap(), "\"WITHDRAW\"");
        assert_eq!(serde_json::to_string(&OwnerType::Affiliate).unwrap(), "\"AFFILIATE\"");
    }

    #[test]
    fn test_ledger_entry_serialization() {
        let entry = LedgerEntry {
            owner_id: OwnerId::new(),
            owner_type: OwnerType::User,
            asset: "USDT".to_string(),
            change: Decimal::ZERO,
            balance_after: Decimal::from(900),
            entry_type: EntryType::Reserve,
            ref_id: Some("order-1".to_string()),
            meta: json!({ "action": "reserve", "amount": "100" }),
            timestamp: 1_708_123_456_789_000_000,
        };

        let json = serde_json::to_string(&entry).unwrap();
        let back: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
