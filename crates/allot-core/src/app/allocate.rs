//! Allocate - 計画してからロックを取り、検証してコミット
//!
//! # 流れ
//! 1. 依存タスクがすべて completed か確認（completed は終端なので先に見てよい）
//! 2. task の Mutex を取る（coverage の直列化）
//! 3. worker のスナップショットから eligible を作り、planner で shares を決める
//! 4. 選ばれた worker を WorkerId 昇順でロックし、容量と条件を再検証
//! 5. 全部通ったときだけ coverage / capacity / allocation を書き込む
//!
//! 再検証で負けた場合（並行 allocate が容量を先に取った）は、
//! `max_plan_attempts` 回まで計画からやり直します。
//! 失敗した呼び出しは何も書き込みません（期限切れの永続化もしない）。

use std::collections::BTreeMap;
use std::sync::MutexGuard;

use tracing::{debug, info, warn};

use super::engine::{Engine, snapshot_candidates};
use crate::allocation::{Candidate, Share, find_eligible_workers, plan};
use crate::domain::{
    Allocation, AllocationId, DomainEvent, EngineError, Task, TaskId, TaskStatus, Worker,
    WorkerId,
};
use crate::registry::WorkerHandle;
use crate::sync::lock;

/// Lock the given workers in ascending id order.
///
/// `handles` must be sorted by id (as returned by `Registry::worker_handles`).
pub(crate) fn lock_workers<'a>(
    handles: &'a [(WorkerId, WorkerHandle)],
    ids: impl IntoIterator<Item = WorkerId>,
) -> Result<BTreeMap<WorkerId, MutexGuard<'a, Worker>>, EngineError> {
    let mut ordered: Vec<WorkerId> = ids.into_iter().collect();
    ordered.sort_unstable();
    ordered.dedup();

    let mut guards = BTreeMap::new();
    for id in ordered {
        let index = handles
            .binary_search_by_key(&id, |(worker_id, _)| *worker_id)
            .map_err(|_| Engine::missing_worker(id))?;
        guards.insert(id, lock(&handles[index].1));
    }
    Ok(guards)
}

/// Outcome of checking a plan against the locked workers.
enum Validation {
    Ready,
    Stale(String),
}

fn validate_shares(
    task: &Task,
    shares: &[Share],
    workers: &BTreeMap<WorkerId, MutexGuard<'_, Worker>>,
) -> Result<Validation, EngineError> {
    let total: u32 = shares.iter().map(|share| share.hours).sum();
    if total > task.remaining_uncovered() {
        return Err(EngineError::ConcurrencyConflict(format!(
            "plan for {} covers {} hour(s), only {} uncovered",
            task.id,
            total,
            task.remaining_uncovered()
        )));
    }
    for share in shares {
        let Some(worker) = workers.get(&share.worker_id) else {
            return Err(Engine::missing_worker(share.worker_id));
        };
        if !Candidate::of(worker).qualifies_for(task) {
            return Ok(Validation::Stale(format!("{} no longer qualifies", worker.id)));
        }
        if worker.available_hours < share.hours {
            return Ok(Validation::Stale(format!(
                "{} has {} hour(s) left, plan needs {}",
                worker.id, worker.available_hours, share.hours
            )));
        }
    }
    Ok(Validation::Ready)
}

impl Engine {
    /// Commit enough worker hours to cover the task, or nothing at all.
    ///
    /// Returns the new allocations in eligibility order.
    pub fn allocate(&self, task_id: TaskId) -> Result<Vec<Allocation>, EngineError> {
        let task_handle = self.registry.task_handle(task_id)?;
        self.ensure_dependencies_completed(task_id)?;
        let workers = self.registry.worker_handles();

        let mut task = lock(&task_handle);
        let now = self.now();

        let status = task.effective_status(now);
        if status.is_terminal() {
            debug!(%task_id, %status, "task not allocatable");
            return Err(EngineError::NoEligibleWorker(task_id));
        }
        if task.is_fully_covered() {
            return Err(EngineError::invalid_input(format!(
                "{task_id} is already fully covered"
            )));
        }
        if !task.is_divisible && !self.book.for_task(task_id).is_empty() {
            return Err(EngineError::invalid_input(format!(
                "{task_id} is not divisible and was already allocated once"
            )));
        }

        for attempt in 1..=self.max_plan_attempts {
            let candidates = snapshot_candidates(&workers);
            let eligible = find_eligible_workers(&task, candidates, now);
            let shares = plan(&task, eligible, now)?;

            let mut guards = lock_workers(&workers, shares.iter().map(|share| share.worker_id))?;
            match validate_shares(&task, &shares, &guards)? {
                Validation::Stale(reason) => {
                    debug!(%task_id, attempt, %reason, "plan went stale, re-planning");
                    continue;
                }
                Validation::Ready => {}
            }

            // validate_shares が容量を確認済みなので reserve は失敗しない
            for share in &shares {
                guards
                    .get_mut(&share.worker_id)
                    .ok_or_else(|| Engine::missing_worker(share.worker_id))?
                    .reserve(share.hours)?;
            }
            let from = task.status;
            let total: u32 = shares.iter().map(|share| share.hours).sum();
            task.cover(total)?;

            let mut allocations = Vec::with_capacity(shares.len());
            for share in &shares {
                allocations.push(Allocation::new(
                    self.ids.next_allocation_id(),
                    task_id,
                    share.worker_id,
                    share.hours,
                    task.hourly_wage,
                    now,
                ));
            }
            self.book.insert_all(&allocations);
            let to = task.status;
            drop(guards);
            drop(task);

            info!(%task_id, shares = allocations.len(), hours = total, "allocation committed");
            for allocation in &allocations {
                self.emit(DomainEvent::AllocationCommitted {
                    allocation_id: allocation.id,
                    task_id,
                    worker_id: allocation.worker_id,
                    hours: allocation.hours_committed,
                });
            }
            if from != to {
                self.emit(DomainEvent::TaskStatusChanged { task_id, from, to });
            }
            return Ok(allocations);
        }

        warn!(%task_id, attempts = self.max_plan_attempts, "allocation kept losing to concurrent commits");
        Err(EngineError::ConcurrencyConflict(format!(
            "{task_id}: worker capacity changed on every attempt"
        )))
    }

    /// Undo allocations the ledger did not confirm, as if they were never made.
    ///
    /// Only active allocations of `task_id` are touched; anything else in `ids` is skipped.
    pub fn revert_allocations(
        &self,
        task_id: TaskId,
        ids: &[AllocationId],
    ) -> Result<Vec<Allocation>, EngineError> {
        let task_handle = self.registry.task_handle(task_id)?;
        let workers = self.registry.worker_handles();

        let mut task = lock(&task_handle);
        let targets: Vec<Allocation> = self
            .book
            .for_task(task_id)
            .into_iter()
            .filter(|allocation| allocation.is_active() && ids.contains(&allocation.id))
            .collect();
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut guards = lock_workers(&workers, targets.iter().map(|a| a.worker_id))?;
        let from = task.status;
        for allocation in &targets {
            guards
                .get_mut(&allocation.worker_id)
                .ok_or_else(|| Engine::missing_worker(allocation.worker_id))?
                .release(allocation.hours_committed);
            task.uncover(allocation.hours_committed);
        }
        let target_ids: Vec<AllocationId> = targets.iter().map(|a| a.id).collect();
        let removed = self.book.remove_all(&target_ids);
        let to = task.status;
        drop(guards);
        drop(task);

        warn!(%task_id, reverted = removed.len(), "allocations reverted");
        for allocation in &removed {
            self.emit(DomainEvent::AllocationReverted {
                allocation_id: allocation.id,
            });
        }
        if from != to {
            self.emit(DomainEvent::TaskStatusChanged { task_id, from, to });
        }
        Ok(removed)
    }

    fn ensure_dependencies_completed(&self, task_id: TaskId) -> Result<(), EngineError> {
        let pending: Vec<TaskId> = self
            .registry
            .dependency_handles(task_id)?
            .into_iter()
            .filter(|(_, handle)| lock(handle).status != TaskStatus::Completed)
            .map(|(id, _)| id)
            .collect();
        if pending.is_empty() {
            Ok(())
        } else {
            Err(EngineError::DependenciesPending { task_id, pending })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::Duration;
    use rstest::rstest;

    use crate::app::testing::{Fixture, hours_from_start};
    use crate::domain::{AllocationStatus, TaskSubmission, WorkerRegistration};

    use super::*;

    fn worker_hours(fx: &Fixture, id: WorkerId) -> u32 {
        fx.engine.get_worker(id).unwrap().available_hours
    }

    #[test]
    fn divisible_task_is_shared_cheapest_first() {
        let fx = Fixture::new();
        let (a, b) = fx.scenario_workers();
        let task_id = fx.scenario_task(true);

        let allocations = fx.engine.allocate(task_id).unwrap();

        let shares: Vec<_> = allocations
            .iter()
            .map(|a| (a.worker_id, a.hours_committed))
            .collect();
        assert_eq!(shares, vec![(b, 3), (a, 3)]);
        assert!(allocations.iter().all(|a| a.hourly_wage == 12));

        let task = fx.engine.get_task(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.covered_hours, 6);
        assert_eq!(worker_hours(&fx, a), 2);
        assert_eq!(worker_hours(&fx, b), 0);
        assert!(fx.events.names().contains(&"task_status_changed"));
    }

    #[test]
    fn non_divisible_task_without_a_big_enough_worker_fails() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let task_id = fx.scenario_task(false);

        assert_eq!(
            fx.engine.allocate(task_id),
            Err(EngineError::NoEligibleWorker(task_id))
        );
        assert!(fx.engine.all_allocations().is_empty());
    }

    #[test]
    fn expired_task_is_not_allocated() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let task_id = fx
            .engine
            .add_task(&TaskSubmission::new(2, 3, 12, hours_from_start(&fx, 1), true))
            .unwrap();

        fx.clock.advance(Duration::hours(2));

        assert_eq!(
            fx.engine.allocate(task_id),
            Err(EngineError::NoEligibleWorker(task_id))
        );
        assert!(fx.engine.all_allocations().is_empty());
    }

    #[test]
    fn failed_allocation_leaves_state_untouched() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let task_id = fx
            .engine
            .add_task(&TaskSubmission::new(10, 3, 12, hours_from_start(&fx, 48), true))
            .unwrap();

        let workers_before = fx.engine.list_workers();
        let tasks_before = fx.engine.list_tasks();
        let events_before = fx.events.names().len();

        assert_eq!(
            fx.engine.allocate(task_id),
            Err(EngineError::PartialAllocationImpossible {
                task_id,
                uncovered: 2
            })
        );

        assert_eq!(fx.engine.list_workers(), workers_before);
        assert_eq!(fx.engine.list_tasks(), tasks_before);
        assert!(fx.engine.all_allocations().is_empty());
        assert_eq!(fx.events.names().len(), events_before);
    }

    #[rstest]
    #[case::wage_below_minimum(WorkerRegistration::new(8, 5, 20))]
    #[case::expertise_too_low(WorkerRegistration::new(8, 1, 5))]
    fn ineligible_workers_are_never_chosen(#[case] registration: WorkerRegistration) {
        let fx = Fixture::new();
        fx.engine.register_worker(&registration).unwrap();
        let task_id = fx.scenario_task(true);

        assert_eq!(
            fx.engine.allocate(task_id),
            Err(EngineError::NoEligibleWorker(task_id))
        );
    }

    #[test]
    fn fully_covered_task_cannot_be_allocated_again() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let task_id = fx.scenario_task(true);
        fx.engine.allocate(task_id).unwrap();

        assert!(matches!(
            fx.engine.allocate(task_id),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn non_divisible_task_is_allocated_at_most_once() {
        let fx = Fixture::new();
        let worker = fx
            .engine
            .register_worker(&WorkerRegistration::new(10, 5, 1))
            .unwrap();
        let task_id = fx.scenario_task(false);

        let first = fx.engine.allocate(task_id).unwrap();
        fx.engine.cancel_allocation(first[0].id).unwrap();
        assert_eq!(fx.engine.get_task(task_id).unwrap().status, TaskStatus::Pending);

        assert!(matches!(
            fx.engine.allocate(task_id),
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(fx.engine.all_allocations().len(), 1);
        assert_eq!(worker_hours(&fx, worker), 10);
    }

    #[test]
    fn divisible_task_can_be_reallocated_after_cancel() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let task_id = fx.scenario_task(true);

        let first = fx.engine.allocate(task_id).unwrap();
        fx.engine.cancel_allocation(first[0].id).unwrap();

        let second = fx.engine.allocate(task_id).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(fx.engine.get_task(task_id).unwrap().covered_hours, 3);
    }

    #[test]
    fn dependent_task_waits_for_its_dependency() {
        let fx = Fixture::new();
        fx.scenario_workers();
        let first = fx
            .engine
            .add_task(&TaskSubmission::new(2, 3, 12, hours_from_start(&fx, 48), true))
            .unwrap();
        let second = fx
            .engine
            .add_task(
                &TaskSubmission::new(2, 3, 12, hours_from_start(&fx, 48), true).depends_on(first),
            )
            .unwrap();

        assert_eq!(
            fx.engine.allocate(second),
            Err(EngineError::DependenciesPending {
                task_id: second,
                pending: vec![first]
            })
        );

        for allocation in fx.engine.allocate(first).unwrap() {
            fx.engine.complete_allocation(allocation.id).unwrap();
        }
        assert_eq!(fx.engine.get_task(first).unwrap().status, TaskStatus::Completed);
        assert!(fx.engine.allocate(second).is_ok());
    }

    #[test]
    fn revert_restores_hours_and_coverage() {
        let fx = Fixture::new();
        let (a, b) = fx.scenario_workers();
        let task_id = fx.scenario_task(true);
        let allocations = fx.engine.allocate(task_id).unwrap();

        let reverted = fx
            .engine
            .revert_allocations(task_id, &[allocations[1].id])
            .unwrap();
        assert_eq!(reverted.len(), 1);
        assert_eq!(worker_hours(&fx, a), 5);
        assert_eq!(worker_hours(&fx, b), 0);
        assert_eq!(fx.engine.get_task(task_id).unwrap().covered_hours, 3);
        assert!(matches!(
            fx.engine.get_allocation(allocations[1].id),
            Err(EngineError::NotFound(_))
        ));

        fx.engine
            .revert_allocations(task_id, &[allocations[0].id])
            .unwrap();
        assert_eq!(fx.engine.get_task(task_id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn concurrent_allocations_never_oversubscribe() {
        let fx = Fixture::with_plan_attempts(8);
        let workers: Vec<WorkerId> = (0..4)
            .map(|i| {
                fx.engine
                    .register_worker(&WorkerRegistration::new(7, 3 + i, 5 + i64::from(i)))
                    .unwrap()
            })
            .collect();
        let tasks: Vec<TaskId> = (0..24)
            .map(|i| {
                let submission = TaskSubmission::new(
                    1 + (i % 3),
                    3,
                    12,
                    hours_from_start(&fx, 48),
                    i % 2 == 0,
                );
                fx.engine.add_task(&submission).unwrap()
            })
            .collect();

        let engine = Arc::clone(&fx.engine);
        thread::scope(|scope| {
            for chunk in tasks.chunks(3) {
                let engine = &engine;
                scope.spawn(move || {
                    for task_id in chunk {
                        let _ = engine.allocate(*task_id);
                    }
                });
            }
        });

        let allocations = fx.engine.all_allocations();
        for worker_id in &workers {
            let worker = fx.engine.get_worker(*worker_id).unwrap();
            let committed: u32 = allocations
                .iter()
                .filter(|a| a.worker_id == *worker_id && a.status == AllocationStatus::Active)
                .map(|a| a.hours_committed)
                .sum();
            assert_eq!(worker.capacity_hours - worker.available_hours, committed);
        }
        for task_id in &tasks {
            let task = fx.engine.get_task(*task_id).unwrap();
            let covered: u32 = allocations
                .iter()
                .filter(|a| a.task_id == *task_id)
                .map(|a| a.hours_committed)
                .sum();
            assert_eq!(task.covered_hours, covered);
            assert!(covered == 0 || covered == task.time_required);
        }
    }
}
