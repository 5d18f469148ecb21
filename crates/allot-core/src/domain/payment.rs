//! Payment obligations accrued when allocations complete.
//!
//! The engine decides how much is owed to whom; moving funds is the
//! ledger collaborator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::allocation::Allocation;
use super::ids::{AllocationId, TaskId, WalletRef, WorkerId};
use super::units::Wei;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentObligation {
    pub allocation_id: AllocationId,
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub wallet: Option<WalletRef>,
    pub hours: u32,
    pub hourly_wage: u64,
    pub amount: Wei,
    pub accrued_at: DateTime<Utc>,
}

impl PaymentObligation {
    pub fn accrue(allocation: &Allocation, wallet: Option<WalletRef>, now: DateTime<Utc>) -> Self {
        Self {
            allocation_id: allocation.id,
            task_id: allocation.task_id,
            worker_id: allocation.worker_id,
            wallet,
            hours: allocation.hours_committed,
            hourly_wage: allocation.hourly_wage,
            amount: allocation.amount(),
            accrued_at: now,
        }
    }
}
