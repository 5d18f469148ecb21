//! Lifecycle - allocation の完了 / 取消と task の状態遷移
//!
//! 完了・取消は ledger / 呼び出し側から来る外部イベントです。
//! ここでは遷移の合法性と副作用（支払い義務、容量の返却、coverage）だけを扱います。

use tracing::{debug, info};

use super::engine::Engine;
use crate::domain::{
    Allocation, AllocationId, DomainEvent, EngineError, PaymentObligation, TaskId, TaskStatus,
};
use crate::sync::lock;

impl Engine {
    /// The worker reports the allocation done.
    ///
    /// Accrues a payment obligation. The task completes once it is fully
    /// covered and none of its allocations is still active.
    pub fn complete_allocation(&self, id: AllocationId) -> Result<Allocation, EngineError> {
        let allocation = self.book.get(id)?;
        let task_handle = self.registry.task_handle(allocation.task_id)?;
        let wallet = self.registry.get_worker(allocation.worker_id)?.wallet;

        let mut task = lock(&task_handle);
        let now = self.now();
        let completed = self.book.update(id, |a| a.mark_completed(now))?;

        let obligation = PaymentObligation::accrue(&completed, wallet, now);
        let amount = obligation.amount;
        self.book.record_payment(obligation);

        let from = task.status;
        task.refresh_expiry(now);
        if task.status == TaskStatus::InProgress
            && task.is_fully_covered()
            && !self.book.has_active_for_task(task.id)
        {
            task.status = task.status.transition_to(TaskStatus::Completed)?;
        }
        let (task_id, to) = (task.id, task.status);
        drop(task);

        info!(allocation_id = %id, %task_id, %amount, "allocation completed");
        self.emit(DomainEvent::AllocationCompleted {
            allocation_id: id,
            amount_owed: amount,
        });
        if from != to {
            self.emit(DomainEvent::TaskStatusChanged { task_id, from, to });
        }
        if to == TaskStatus::Completed {
            self.announce_unblocked(task_id);
        }
        Ok(completed)
    }

    /// Cancel an active allocation, giving its hours back to the worker and
    /// taking them off the task's coverage.
    pub fn cancel_allocation(&self, id: AllocationId) -> Result<Allocation, EngineError> {
        let allocation = self.book.get(id)?;
        let task_handle = self.registry.task_handle(allocation.task_id)?;
        let worker_handle = self.registry.worker_handle(allocation.worker_id)?;

        let mut task = lock(&task_handle);
        let mut worker = lock(&worker_handle);
        let now = self.now();
        let cancelled = self.book.update(id, |a| a.mark_cancelled(now))?;

        let from = task.status;
        worker.release(cancelled.hours_committed);
        task.uncover(cancelled.hours_committed);
        task.refresh_expiry(now);
        let (task_id, to) = (task.id, task.status);
        drop(worker);
        drop(task);

        info!(allocation_id = %id, %task_id, hours = cancelled.hours_committed, "allocation cancelled");
        self.emit(DomainEvent::AllocationCancelled {
            allocation_id: id,
            hours_released: cancelled.hours_committed,
        });
        if from != to {
            self.emit(DomainEvent::TaskStatusChanged { task_id, from, to });
        }
        Ok(cancelled)
    }

    /// Persist deadline expiry for every task the clock has overtaken.
    ///
    /// Returns the ids that changed, ascending.
    pub fn refresh_expired_tasks(&self) -> Vec<TaskId> {
        let now = self.now();
        let mut expired = Vec::new();
        for (task_id, handle) in self.registry.task_handles() {
            let mut task = lock(&handle);
            let from = task.status;
            if task.refresh_expiry(now) {
                let to = task.status;
                drop(task);
                self.emit(DomainEvent::TaskStatusChanged { task_id, from, to });
                expired.push(task_id);
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "tasks expired");
        }
        expired
    }

    /// Emit `TaskUnblocked` for dependants whose dependencies are now all completed.
    fn announce_unblocked(&self, task_id: TaskId) {
        for dependant in self.registry.dependants_of(task_id) {
            let ready = match self.registry.dependency_handles(dependant) {
                Ok(deps) => deps
                    .iter()
                    .all(|(_, handle)| lock(handle).status == TaskStatus::Completed),
                Err(_) => false,
            };
            if ready {
                debug!(task_id = %dependant, "task unblocked");
                self.emit(DomainEvent::TaskUnblocked { task_id: dependant });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::app::testing::{Fixture, hours_from_start};
    use crate::domain::{AllocationStatus, TaskSubmission, Wei, WalletRef, WorkerRegistration};

    use super::*;

    #[test]
    fn task_completes_when_every_share_is_done() {
        let fx = Fixture::new();
        let (a, b) = fx.scenario_workers();
        let task_id = fx.scenario_task(true);
        let allocations = fx.engine.allocate(task_id).unwrap();

        fx.engine.complete_allocation(allocations[0].id).unwrap();
        assert_eq!(fx.engine.get_task(task_id).unwrap().status, TaskStatus::InProgress);

        fx.engine.complete_allocation(allocations[1].id).unwrap();
        assert_eq!(fx.engine.get_task(task_id).unwrap().status, TaskStatus::Completed);

        // 3h * 12 each
        assert_eq!(fx.engine.amount_owed(a).unwrap(), Wei::new(36));
        assert_eq!(fx.engine.amount_owed(b).unwrap(), Wei::new(36));
        assert_eq!(fx.engine.payment_obligations().len(), 2);
        assert_eq!(fx.engine.task_stats().tasks_by_status.completed, 1);
    }

    #[test]
    fn completed_allocation_cannot_be_cancelled_and_vice_versa() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let task_id = fx.scenario_task(true);
        let allocations = fx.engine.allocate(task_id).unwrap();

        fx.engine.complete_allocation(allocations[0].id).unwrap();
        fx.engine.cancel_allocation(allocations[1].id).unwrap();

        assert!(matches!(
            fx.engine.cancel_allocation(allocations[0].id),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            fx.engine.complete_allocation(allocations[1].id),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert_eq!(fx.engine.payment_obligations().len(), 1);
    }

    #[test]
    fn cancelling_every_share_reverts_task_to_pending() {
        let fx = Fixture::new();
        let (a, b) = fx.scenario_workers();
        let task_id = fx.scenario_task(true);
        let allocations = fx.engine.allocate(task_id).unwrap();

        for allocation in &allocations {
            let cancelled = fx.engine.cancel_allocation(allocation.id).unwrap();
            assert_eq!(cancelled.status, AllocationStatus::Cancelled);
        }

        let task = fx.engine.get_task(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.covered_hours, 0);
        assert_eq!(fx.engine.get_worker(a).unwrap().available_hours, 5);
        assert_eq!(fx.engine.get_worker(b).unwrap().available_hours, 3);

        // hours are back, so the task can be allocated again
        assert_eq!(fx.engine.allocate(task_id).unwrap().len(), 2);
    }

    #[test]
    fn completion_keeps_worker_hours_spent() {
        let fx = Fixture::new();
        let (a, _) = fx.scenario_workers();
        let task_id = fx
            .engine
            .add_task(&TaskSubmission::new(4, 3, 12, hours_from_start(&fx, 48), false))
            .unwrap();
        let allocation = fx.engine.allocate(task_id).unwrap().remove(0);
        assert_eq!(allocation.worker_id, a);

        fx.engine.complete_allocation(allocation.id).unwrap();
        assert_eq!(fx.engine.get_worker(a).unwrap().available_hours, 1);
    }

    #[test]
    fn payment_carries_worker_wallet() {
        let fx = Fixture::new();
        fx.engine
            .register_worker(&WorkerRegistration::new(6, 3, 1).with_wallet(WalletRef::new("0xabc")))
            .unwrap();
        let task_id = fx.scenario_task(false);
        let allocation = fx.engine.allocate(task_id).unwrap().remove(0);

        fx.engine.complete_allocation(allocation.id).unwrap();

        let obligation = &fx.engine.payment_obligations()[0];
        assert_eq!(obligation.wallet, Some(WalletRef::new("0xabc")));
        assert_eq!(obligation.amount, Wei::new(72));
    }

    #[test]
    fn partially_covered_task_expires_on_refresh() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let task_id = fx
            .engine
            .add_task(&TaskSubmission::new(6, 3, 12, hours_from_start(&fx, 10), true))
            .unwrap();
        let allocations = fx.engine.allocate(task_id).unwrap();
        fx.engine.cancel_allocation(allocations[0].id).unwrap();

        fx.clock.advance(Duration::hours(11));
        assert_eq!(fx.engine.refresh_expired_tasks(), vec![task_id]);
        assert!(fx.engine.refresh_expired_tasks().is_empty());

        // expired stays expired; the remaining share is still paid
        fx.engine.complete_allocation(allocations[1].id).unwrap();
        assert_eq!(fx.engine.get_task(task_id).unwrap().status, TaskStatus::Expired);
        assert_eq!(fx.engine.payment_obligations().len(), 1);
    }

    #[test]
    fn finishing_a_dependency_announces_unblocked_tasks() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let first = fx
            .engine
            .add_task(&TaskSubmission::new(2, 3, 12, hours_from_start(&fx, 48), false))
            .unwrap();
        fx.engine
            .add_task(
                &TaskSubmission::new(2, 3, 12, hours_from_start(&fx, 48), true).depends_on(first),
            )
            .unwrap();

        let allocation = fx.engine.allocate(first).unwrap().remove(0);
        fx.engine.complete_allocation(allocation.id).unwrap();

        assert_eq!(fx.events.names().last(), Some(&"task_unblocked"));
    }

    #[test]
    fn unknown_allocation_is_not_found() {
        let fx = Fixture::new();
        let id = fx.engine.ids.next_allocation_id();
        assert!(matches!(
            fx.engine.complete_allocation(id),
            Err(EngineError::NotFound(_))
        ));
    }
}
