//! Accounting aggregator: execution-cost and task statistics.
//!
//! Pure reductions over snapshots. Nothing here mutates its input or
//! takes an engine lock, so results are identical for identical input
//! regardless of record order or concurrent allocation traffic.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::status::{TaskStats, TaskStatusCounts};
use crate::domain::{EngineError, TaskStatus, TransactionRecord, TxHash, Wei};

/// Cost breakdown of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCost {
    pub hash: TxHash,
    pub gas_used: u64,
    pub gas_price: Wei,
    pub cost: Wei,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub transaction_count: usize,
    pub total_gas_used: u128,
    /// Total cost in the ledger's native unit (wei).
    pub total_cost: Wei,
    /// Sorted by `(timestamp, hash)`.
    pub per_transaction: Vec<TransactionCost>,
}

/// On-chain cost overview (admin dashboard shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainCosts {
    pub total_gas_used: u128,
    pub total_ether_spent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPriceEntry {
    pub transaction_hash: TxHash,
    pub gas_price_gwei: String,
}

/// Per-transaction gas prices (admin dashboard shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub transaction_count: usize,
    pub gas_prices: Vec<GasPriceEntry>,
}

impl TransactionSummary {
    pub fn onchain_costs(&self) -> OnchainCosts {
        OnchainCosts {
            total_gas_used: self.total_gas_used,
            total_ether_spent: self.total_cost.to_ether_string(),
        }
    }

    pub fn transaction_stats(&self) -> TransactionStats {
        TransactionStats {
            transaction_count: self.transaction_count,
            gas_prices: self
                .per_transaction
                .iter()
                .map(|tx| GasPriceEntry {
                    transaction_hash: tx.hash.clone(),
                    gas_price_gwei: tx.gas_price.to_gwei_string(),
                })
                .collect(),
        }
    }
}

/// Summarise executed transactions.
///
/// The same hash seen twice with identical content counts once; the same hash
/// with different content is rejected as `InvalidInput`.
pub fn summarize(records: &[TransactionRecord]) -> Result<TransactionSummary, EngineError> {
    let mut unique: BTreeMap<&TxHash, &TransactionRecord> = BTreeMap::new();
    for record in records {
        match unique.get(&record.hash) {
            Some(seen) if *seen != record => {
                return Err(EngineError::invalid_input(format!(
                    "conflicting records for transaction {}",
                    record.hash
                )));
            }
            Some(_) => {}
            None => {
                unique.insert(&record.hash, record);
            }
        }
    }

    let mut per_transaction: Vec<TransactionCost> = unique
        .values()
        .map(|record| TransactionCost {
            hash: record.hash.clone(),
            gas_used: record.gas_used,
            gas_price: record.gas_price,
            cost: record.cost(),
            timestamp: record.timestamp,
        })
        .collect();
    per_transaction.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));

    Ok(TransactionSummary {
        transaction_count: per_transaction.len(),
        total_gas_used: per_transaction.iter().map(|tx| u128::from(tx.gas_used)).sum(),
        total_cost: per_transaction.iter().map(|tx| tx.cost).sum(),
        per_transaction,
    })
}

/// Count tasks per status.
pub fn task_stats(statuses: impl IntoIterator<Item = TaskStatus>) -> TaskStats {
    let mut counts = TaskStatusCounts::default();
    let mut total = 0;
    for status in statuses {
        total += 1;
        match status {
            TaskStatus::Pending => counts.pending += 1,
            TaskStatus::InProgress => counts.in_progress += 1,
            TaskStatus::Completed => counts.completed += 1,
            TaskStatus::Expired => counts.expired += 1,
        }
    }
    TaskStats {
        total_tasks: total,
        tasks_by_status: counts,
    }
}
