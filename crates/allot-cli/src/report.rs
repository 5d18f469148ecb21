//! JSON shapes read and printed by the CLI.

use serde::{Deserialize, Serialize};

use allot_core::accounting::{OnchainCosts, TransactionStats};
use allot_core::app::{TaskStats, WorkerOverview};
use allot_core::domain::{
    Allocation, PaymentObligation, Task, TaskId, TaskSubmission, WorkerRegistration,
};
use allot_core::{EngineError, ErrorKind};

/// Input of `allot plan`. Tasks get ids 1, 2, ... in file order, so
/// `dependencies` can refer to earlier entries by position.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    #[serde(default)]
    pub workers: Vec<WorkerRegistration>,
    #[serde(default)]
    pub tasks: Vec<TaskSubmission>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationFailure {
    pub task_id: TaskId,
    pub kind: ErrorKind,
    pub retryable: bool,
    pub error: String,
}

impl AllocationFailure {
    pub fn new(task_id: TaskId, error: &EngineError) -> Self {
        Self {
            task_id,
            kind: error.kind(),
            retryable: error.is_retryable(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub workers: Vec<WorkerOverview>,
    pub tasks: Vec<Task>,
    pub allocations: Vec<Allocation>,
    pub failures: Vec<AllocationFailure>,
    pub payments: Vec<PaymentObligation>,
    pub task_stats: TaskStats,
    pub transaction_stats: TransactionStats,
    pub onchain_costs: OnchainCosts,
}
