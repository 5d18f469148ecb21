//! Status - 集計ビュー
//!
//! 読み取り専用のスナップショット。シリアライズ形は admin / worker ダッシュボードに合わせています。

use serde::{Deserialize, Serialize};

use crate::domain::{Allocation, Task, Worker};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub expired: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub tasks_by_status: TaskStatusCounts,
}

/// Worker record plus derived activity.
///
/// A worker is inactive once its capacity is used up and no allocation is still active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOverview {
    #[serde(flatten)]
    pub worker: Worker,
    pub active_allocations: usize,
    pub active: bool,
}

impl WorkerOverview {
    pub fn new(worker: Worker, active_allocations: usize) -> Self {
        let active = worker.available_hours > 0 || active_allocations > 0;
        Self {
            worker,
            active_allocations,
            active,
        }
    }
}

/// A task as seen from one worker (worker dashboard shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerTask {
    #[serde(flatten)]
    pub task: Task,
    /// This worker's non-cancelled allocations on the task.
    pub allocations: Vec<Allocation>,
}
