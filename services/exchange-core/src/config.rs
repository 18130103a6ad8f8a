//! Exchange configuration

use rust_decimal::Decimal;
use std::path::PathBuf;

/// Trading fee rates, applied to the quote-asset trade amount
#[derive(Debug, Clone)]
pub struct FeeConfig {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            // 0.10% maker, 0.20% taker
            maker_rate: Decimal::new(1, 3),
            taker_rate: Decimal::new(2, 3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub fees: FeeConfig,
    /// Levels persisted per side in book snapshots
    pub snapshot_depth: usize,
    /// Directory for book snapshot files; None disables persistence
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fees: FeeConfig::default(),
            snapshot_depth: persistence::SNAPSHOT_DEPTH,
            snapshot_dir: None,
        }
    }
}
