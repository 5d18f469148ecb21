//! Engine - Task Allocation & Settlement Engine の表面
//!
//! 登録・照会・集計をここに、割り当ては `allocate.rs`、
//! 状態遷移は `lifecycle.rs` に置いています（同じ `Engine` の impl）。
//!
//! すべての操作は同期的で、外部 I/O をしません。
//! ledger への送信は Coordinator が engine の戻り値を使って行います。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::builder::EngineBuilder;
use super::status::{TaskStats, WorkerOverview, WorkerTask};
use crate::accounting::{self, TransactionSummary};
use crate::allocation::{AllocationBook, Candidate, find_eligible_workers};
use crate::domain::{
    Allocation, AllocationId, DomainEvent, EngineError, MissingRecord,
    PaymentObligation, Task, TaskId, TaskSubmission, TransactionRecord, Wei, Worker, WorkerId,
    WorkerRegistration,
};
use crate::ports::{Clock, EventSink, IdGenerator};
use crate::registry::{Registry, WorkerHandle};
use crate::sync::lock;

pub struct Engine {
    pub(crate) registry: Registry,
    pub(crate) book: AllocationBook,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) max_plan_attempts: u32,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn emit(&self, event: DomainEvent) {
        self.events.emit(&event);
    }

    // ────────────────────────────────────────────────────────────────────────
    // Registry
    // ────────────────────────────────────────────────────────────────────────

    /// Validate and register a worker. Fails with `InvalidInput` before any mutation.
    pub fn register_worker(&self, registration: &WorkerRegistration) -> Result<WorkerId, EngineError> {
        let worker = self.prepare_worker(registration)?;
        self.admit_worker(worker)
    }

    /// Validate a registration and mint its id. Nothing is stored, so the
    /// worker stays invisible to `allocate` until [`Engine::admit_worker`].
    pub fn prepare_worker(&self, registration: &WorkerRegistration) -> Result<Worker, EngineError> {
        registration.validate(self.ids.next_worker_id(), self.now())
    }

    pub fn admit_worker(&self, worker: Worker) -> Result<WorkerId, EngineError> {
        let (id, hours) = (worker.id, worker.capacity_hours);
        self.registry.insert_worker(worker)?;

        info!(worker_id = %id, hours, "worker registered");
        self.emit(DomainEvent::WorkerRegistered { worker_id: id, hours });
        Ok(id)
    }

    /// Validate and add a `pending` task. Dependencies must already exist.
    pub fn add_task(&self, submission: &TaskSubmission) -> Result<TaskId, EngineError> {
        let task = self.prepare_task(submission)?;
        self.admit_task(task)
    }

    /// Validate a submission and mint its id without storing it.
    ///
    /// Unknown dependencies fail with `NotFound` here; `admit_task` checks again.
    pub fn prepare_task(&self, submission: &TaskSubmission) -> Result<Task, EngineError> {
        let task = submission.validate(self.ids.next_task_id(), self.now())?;
        for dep in &task.dependencies {
            self.registry.task_handle(*dep)?;
        }
        Ok(task)
    }

    pub fn admit_task(&self, task: Task) -> Result<TaskId, EngineError> {
        let (id, time_required, divisible) = (task.id, task.time_required, task.is_divisible);
        self.registry.insert_task(task)?;

        info!(task_id = %id, time_required, divisible, "task added");
        self.emit(DomainEvent::TaskAdded {
            task_id: id,
            time_required,
        });
        Ok(id)
    }

    pub fn get_worker(&self, id: WorkerId) -> Result<Worker, EngineError> {
        self.registry.get_worker(id)
    }

    /// Task snapshot with its status as of now (deadline expiry applied).
    pub fn get_task(&self, id: TaskId) -> Result<Task, EngineError> {
        let now = self.now();
        let mut task = self.registry.get_task(id)?;
        task.status = task.effective_status(now);
        Ok(task)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Queries
    // ────────────────────────────────────────────────────────────────────────

    pub fn list_workers(&self) -> Vec<WorkerOverview> {
        self.registry
            .workers_snapshot()
            .into_iter()
            .map(|worker| {
                let active = self.book.active_count_for_worker(worker.id);
                WorkerOverview::new(worker, active)
            })
            .collect()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        let now = self.now();
        self.registry
            .tasks_snapshot()
            .into_iter()
            .map(|mut task| {
                task.status = task.effective_status(now);
                task
            })
            .collect()
    }

    /// Tasks the worker holds non-cancelled allocations on, ascending by task id.
    pub fn worker_tasks(&self, worker_id: WorkerId) -> Result<Vec<WorkerTask>, EngineError> {
        self.registry.worker_handle(worker_id)?;

        let mut allocations: Vec<Allocation> = self
            .book
            .for_worker(worker_id)
            .into_iter()
            .filter(|allocation| allocation.status.counts_towards_coverage())
            .collect();
        allocations.sort_by_key(|allocation| allocation.task_id);

        let mut out: Vec<WorkerTask> = Vec::new();
        for allocation in allocations {
            match out.last_mut() {
                Some(entry) if entry.task.id == allocation.task_id => {
                    entry.allocations.push(allocation);
                }
                _ => {
                    let task = self.get_task(allocation.task_id)?;
                    out.push(WorkerTask {
                        task,
                        allocations: vec![allocation],
                    });
                }
            }
        }
        Ok(out)
    }

    pub fn get_allocation(&self, id: AllocationId) -> Result<Allocation, EngineError> {
        self.book.get(id)
    }

    pub fn allocations_for_task(&self, task_id: TaskId) -> Result<Vec<Allocation>, EngineError> {
        self.registry.task_handle(task_id)?;
        Ok(self.book.for_task(task_id))
    }

    pub fn allocations_for_worker(&self, worker_id: WorkerId) -> Result<Vec<Allocation>, EngineError> {
        self.registry.worker_handle(worker_id)?;
        Ok(self.book.for_worker(worker_id))
    }

    /// Eligible workers for the task right now, in allocation order.
    pub fn find_eligible_workers(&self, task_id: TaskId) -> Result<Vec<WorkerId>, EngineError> {
        let now = self.now();
        let task = self.registry.get_task(task_id)?;
        let candidates = snapshot_candidates(&self.registry.worker_handles());
        Ok(find_eligible_workers(&task, candidates, now)
            .map(|candidate| candidate.worker_id)
            .collect())
    }

    /// Task counts per status, as of now. Read-only.
    pub fn task_stats(&self) -> TaskStats {
        let now = self.now();
        accounting::task_stats(
            self.registry
                .tasks_snapshot()
                .iter()
                .map(|task| task.effective_status(now)),
        )
    }

    pub fn summarize(&self, records: &[TransactionRecord]) -> Result<TransactionSummary, EngineError> {
        accounting::summarize(records)
    }

    pub fn payment_obligations(&self) -> Vec<PaymentObligation> {
        self.book.payments()
    }

    pub fn amount_owed(&self, worker_id: WorkerId) -> Result<Wei, EngineError> {
        self.registry.worker_handle(worker_id)?;
        Ok(self.book.amount_owed(worker_id))
    }

    pub fn all_allocations(&self) -> Vec<Allocation> {
        self.book.all()
    }

    pub(crate) fn missing_worker(id: WorkerId) -> EngineError {
        EngineError::NotFound(MissingRecord::Worker(id))
    }
}

/// Copy the planner-relevant fields of each worker, one lock at a time.
pub(crate) fn snapshot_candidates(workers: &[(WorkerId, WorkerHandle)]) -> Vec<Candidate> {
    workers
        .iter()
        .map(|(_, handle)| Candidate::of(&lock(handle)))
        .collect()
}
