//! Allocation record: a binding of one worker's hours to one task.
//!
//! Allocations reference Worker/Task by id only. The lifecycle controller owns
//! them; the registry owns the records they point at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::ids::{AllocationId, TaskId, WorkerId};
use super::state::AllocationStatus;
use super::units::Wei;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: AllocationId,
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub hours_committed: u32,
    /// Wage per hour at commit time.
    pub hourly_wage: u64,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    pub fn new(
        id: AllocationId,
        task_id: TaskId,
        worker_id: WorkerId,
        hours_committed: u32,
        hourly_wage: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id,
            worker_id,
            hours_committed,
            hourly_wage,
            status: AllocationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }

    /// Amount owed to the worker once the allocation completes.
    pub fn amount(&self) -> Wei {
        Wei::new(u128::from(self.hourly_wage)).times(u64::from(self.hours_committed))
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.status = self.status.transition_to(AllocationStatus::Completed)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.status = self.status.transition_to(AllocationStatus::Cancelled)?;
        self.updated_at = now;
        Ok(())
    }
}
