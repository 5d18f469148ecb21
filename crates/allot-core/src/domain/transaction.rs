//! Executed ledger transactions (read-only input to accounting).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TxHash;
use super::units::Wei;

/// One executed transaction as observed on the ledger. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// Price per unit of gas.
    pub gas_price: Wei,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn cost(&self) -> Wei {
        self.gas_price.times(self.gas_used)
    }
}

/// Inclusive block range for reading past transactions. `to: None` means latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl BlockRange {
    /// From genesis to latest.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(from: u64, to: Option<u64>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.from && self.to.is_none_or(|to| block <= to)
    }
}
