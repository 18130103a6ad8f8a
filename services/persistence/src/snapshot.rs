//! Top-of-book snapshots with integrity checking
//!
//! One snapshot file per symbol, holding up to [`SNAPSHOT_DEPTH`]
//! levels per side. Writes are atomic (tmp + fsync + rename) and carry
//! a SHA-256 checksum over the serialized levels so torn or tampered
//! files are rejected on load.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use matching_engine::BookDepth;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default number of levels persisted per side
pub const SNAPSHOT_DEPTH: usize = 50;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("No snapshot for symbol {0}")]
    NotFound(String),
}

/// One price level in a snapshot
///
/// Decimals are stored as strings so the on-disk format is stable
/// across rust_decimal internal representation changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: String,
    pub quantity: String,
}

/// Top-of-book snapshot for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub version: u32,
    pub symbol: String,
    /// Unix nanosecond timestamp when the snapshot was taken
    pub timestamp: i64,
    /// Best bids first (price descending)
    pub bids: Vec<LevelSnapshot>,
    /// Best asks first (price ascending)
    pub asks: Vec<LevelSnapshot>,
    /// SHA-256 over the serialized levels
    pub checksum: String,
}

impl BookSnapshot {
    /// Build a snapshot from a book depth view, truncated to
    /// [`SNAPSHOT_DEPTH`] levels per side
    pub fn from_depth(depth: &BookDepth, timestamp: i64) -> Self {
        let to_levels = |side: &[(types::numeric::Price, types::numeric::Quantity)]| {
            side.iter()
                .take(SNAPSHOT_DEPTH)
                .map(|(price, quantity)| LevelSnapshot {
                    price: price.to_string(),
                    quantity: quantity.to_string(),
                })
                .collect::<Vec<_>>()
        };
        let bids = to_levels(&depth.bids);
        let asks = to_levels(&depth.asks);
        let checksum = compute_checksum(&bids, &asks);
        Self {
            version: SNAPSHOT_VERSION,
            symbol: depth.symbol.clone(),
            timestamp,
            bids,
            asks,
            checksum,
        }
    }

    pub fn verify_integrity(&self) -> bool {
        self.checksum == compute_checksum(&self.bids, &self.asks)
    }
}

fn compute_checksum(bids: &[LevelSnapshot], asks: &[LevelSnapshot]) -> String {
    let bytes = bincode::serialize(&(bids, asks)).expect("level serialization cannot fail");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// Reads and writes per-symbol snapshot files under one directory
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write a snapshot atomically: tmp file, fsync, rename
    pub fn write(&self, snapshot: &BookSnapshot) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let data = bincode::serialize(snapshot)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        let filename = Self::filename(&snapshot.symbol);
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{filename}.tmp"));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        Ok(path)
    }

    /// Load the snapshot for a symbol, verifying version and checksum
    pub fn load(&self, symbol: &str) -> Result<BookSnapshot, SnapshotError> {
        let path = self.dir.join(Self::filename(symbol));
        if !path.exists() {
            return Err(SnapshotError::NotFound(symbol.to_string()));
        }
        self.load_path(&path)
    }

    fn load_path(&self, path: &Path) -> Result<BookSnapshot, SnapshotError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let snapshot: BookSnapshot = bincode::deserialize(&data)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        if !snapshot.verify_integrity() {
            return Err(SnapshotError::IntegrityFailure {
                expected: snapshot.checksum.clone(),
                actual: compute_checksum(&snapshot.bids, &snapshot.asks),
            });
        }

        Ok(snapshot)
    }

    /// Symbols that currently have a snapshot on disk
    pub fn list_symbols(&self) -> Result<Vec<String>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_prefix("book-").and_then(|s| s.strip_suffix(".snap")) {
                symbols.push(stem.replace('-', "/"));
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    // "BTC/USDT" → "book-BTC-USDT.snap"
    fn filename(symbol: &str) -> String {
        format!("book-{}.snap", symbol.replace('/', "-"))
    }
}
