//! Events - ドメインイベント
//!
//! 状態が変わるたびに engine が EventSink へ送るイベント。
//! ledger への送信とは独立で、監査ログや通知に使います。

use serde::{Deserialize, Serialize};

use super::ids::{AllocationId, TaskId, WorkerId};
use super::state::TaskStatus;
use super::units::Wei;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    WorkerRegistered {
        worker_id: WorkerId,
        hours: u32,
    },
    TaskAdded {
        task_id: TaskId,
        time_required: u32,
    },
    AllocationCommitted {
        allocation_id: AllocationId,
        task_id: TaskId,
        worker_id: WorkerId,
        hours: u32,
    },
    AllocationCompleted {
        allocation_id: AllocationId,
        amount_owed: Wei,
    },
    AllocationCancelled {
        allocation_id: AllocationId,
        hours_released: u32,
    },
    /// Allocation rolled back because the ledger did not confirm it.
    AllocationReverted {
        allocation_id: AllocationId,
    },
    TaskStatusChanged {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// All dependencies of `task_id` are completed.
    TaskUnblocked {
        task_id: TaskId,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::WorkerRegistered { .. } => "worker_registered",
            DomainEvent::TaskAdded { .. } => "task_added",
            DomainEvent::AllocationCommitted { .. } => "allocation_committed",
            DomainEvent::AllocationCompleted { .. } => "allocation_completed",
            DomainEvent::AllocationCancelled { .. } => "allocation_cancelled",
            DomainEvent::AllocationReverted { .. } => "allocation_reverted",
            DomainEvent::TaskStatusChanged { .. } => "task_status_changed",
            DomainEvent::TaskUnblocked { .. } => "task_unblocked",
        }
    }
}
