//! Task record and submission input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{EngineError, TransitionSubject};
use super::ids::TaskId;
use super::state::TaskStatus;

/// Task submission as it arrives from the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    pub time_required: i64,
    pub required_expertise: u32,
    pub hourly_wage: i64,
    pub deadline: DateTime<Utc>,
    pub is_divisible: bool,
    /// Tasks that must be completed before this one can be allocated.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

impl TaskSubmission {
    pub fn new(
        time_required: i64,
        required_expertise: u32,
        hourly_wage: i64,
        deadline: DateTime<Utc>,
        is_divisible: bool,
    ) -> Self {
        Self {
            time_required,
            required_expertise,
            hourly_wage,
            deadline,
            is_divisible,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, task_id: TaskId) -> Self {
        self.dependencies.push(task_id);
        self
    }

    /// Check ranges and build the `pending` record stored under `id`.
    ///
    /// Existence of dependencies is checked by the registry, not here.
    pub fn validate(&self, id: TaskId, now: DateTime<Utc>) -> Result<Task, EngineError> {
        if self.time_required <= 0 {
            return Err(EngineError::invalid_input(format!(
                "time required must be positive, got {}",
                self.time_required
            )));
        }
        let time_required = u32::try_from(self.time_required).map_err(|_| {
            EngineError::invalid_input(format!(
                "time required out of range: {}",
                self.time_required
            ))
        })?;
        if self.hourly_wage <= 0 {
            return Err(EngineError::invalid_input(format!(
                "hourly wage must be positive, got {}",
                self.hourly_wage
            )));
        }
        if self.deadline <= now {
            return Err(EngineError::invalid_input(format!(
                "deadline {} is not in the future",
                self.deadline
            )));
        }

        let mut dependencies = self.dependencies.clone();
        dependencies.sort();
        dependencies.dedup();

        Ok(Task {
            id,
            time_required,
            required_expertise: self.required_expertise,
            // positive i64 always fits
            hourly_wage: self.hourly_wage as u64,
            deadline: self.deadline,
            is_divisible: self.is_divisible,
            status: TaskStatus::Pending,
            covered_hours: 0,
            dependencies,
            created_at: now,
        })
    }
}

/// Canonical task record owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub time_required: u32,
    pub required_expertise: u32,
    pub hourly_wage: u64,
    pub deadline: DateTime<Utc>,
    pub is_divisible: bool,
    /// Last persisted status. Use [`Task::effective_status`] for reads.
    pub status: TaskStatus,
    /// Sum of hours over active and completed allocations.
    pub covered_hours: u32,
    pub dependencies: Vec<TaskId>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn remaining_uncovered(&self) -> u32 {
        self.time_required.saturating_sub(self.covered_hours)
    }

    pub fn is_fully_covered(&self) -> bool {
        self.covered_hours >= self.time_required
    }

    /// Status as of `now`. Deadline expiry is a pure function of the clock;
    /// nothing persists it until the next mutation touches the task.
    pub fn effective_status(&self, now: DateTime<Utc>) -> TaskStatus {
        match self.status {
            TaskStatus::Pending | TaskStatus::InProgress
                if now > self.deadline && !self.is_fully_covered() =>
            {
                TaskStatus::Expired
            }
            status => status,
        }
    }

    /// Persist clock-driven expiry. Returns true when the status changed.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) -> bool {
        let effective = self.effective_status(now);
        if effective != self.status {
            self.status = effective;
            true
        } else {
            false
        }
    }

    /// Whole hours between `now` and the deadline (one allocated hour is one elapsed hour).
    pub fn hours_until_deadline(&self, now: DateTime<Utc>) -> u32 {
        if now >= self.deadline {
            return 0;
        }
        let hours = (self.deadline - now).num_hours();
        u32::try_from(hours).unwrap_or(u32::MAX)
    }

    /// Add `hours` of coverage, moving `pending -> inProgress` on the first commit.
    pub fn cover(&mut self, hours: u32) -> Result<(), EngineError> {
        if hours > self.remaining_uncovered() {
            return Err(EngineError::ConcurrencyConflict(format!(
                "{} has {} uncovered hour(s), {} requested",
                self.id,
                self.remaining_uncovered(),
                hours
            )));
        }
        if self.status == TaskStatus::Pending && hours > 0 {
            self.status = self.status.transition_to(TaskStatus::InProgress)?;
        } else if self.status != TaskStatus::InProgress {
            return Err(EngineError::InvalidTransition {
                subject: TransitionSubject::Task,
                from: self.status.to_string(),
                to: TaskStatus::InProgress.to_string(),
            });
        }
        self.covered_hours += hours;
        Ok(())
    }

    /// Remove `hours` of coverage; an `inProgress` task with nothing left reverts to `pending`.
    pub fn uncover(&mut self, hours: u32) {
        self.covered_hours = self.covered_hours.saturating_sub(hours);
        if self.covered_hours == 0 && self.status == TaskStatus::InProgress {
            self.status = TaskStatus::Pending;
        }
    }
}
