//! Allocation book: allocation records and the payment obligations they accrue.
//!
//! Design:
//! - `by_id` is the single source of truth for allocations.
//! - `by_task` / `by_worker` hold ids only (insertion order).
//! - Writers always hold the owning task's lock, so entries of one task are
//!   never mutated concurrently; the RwLock only guards the maps themselves.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{
    Allocation, AllocationId, EngineError, MissingRecord, PaymentObligation, TaskId, Wei,
    WorkerId,
};
use crate::sync::{read, write};

#[derive(Debug, Default)]
struct BookState {
    by_id: HashMap<AllocationId, Allocation>,
    by_task: HashMap<TaskId, Vec<AllocationId>>,
    by_worker: HashMap<WorkerId, Vec<AllocationId>>,
    payments: Vec<PaymentObligation>,
}

impl BookState {
    fn collect(&self, ids: Option<&Vec<AllocationId>>) -> Vec<Allocation> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct AllocationBook {
    state: RwLock<BookState>,
}

impl AllocationBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_all(&self, allocations: &[Allocation]) {
        let mut state = write(&self.state);
        for allocation in allocations {
            state
                .by_task
                .entry(allocation.task_id)
                .or_default()
                .push(allocation.id);
            state
                .by_worker
                .entry(allocation.worker_id)
                .or_default()
                .push(allocation.id);
            state.by_id.insert(allocation.id, allocation.clone());
        }
    }

    pub fn get(&self, id: AllocationId) -> Result<Allocation, EngineError> {
        read(&self.state)
            .by_id
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound(MissingRecord::Allocation(id)))
    }

    /// Apply `f` to the stored allocation and return the updated copy.
    /// Nothing is written when `f` fails.
    pub fn update<F>(&self, id: AllocationId, f: F) -> Result<Allocation, EngineError>
    where
        F: FnOnce(&mut Allocation) -> Result<(), EngineError>,
    {
        let mut state = write(&self.state);
        let stored = state
            .by_id
            .get_mut(&id)
            .ok_or(EngineError::NotFound(MissingRecord::Allocation(id)))?;
        let mut updated = stored.clone();
        f(&mut updated)?;
        *stored = updated.clone();
        Ok(updated)
    }

    /// Remove allocations entirely (ledger rollback). Unknown ids are skipped.
    pub fn remove_all(&self, ids: &[AllocationId]) -> Vec<Allocation> {
        let mut state = write(&self.state);
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(allocation) = state.by_id.remove(id) else {
                continue;
            };
            if let Some(list) = state.by_task.get_mut(&allocation.task_id) {
                list.retain(|other| other != id);
                if list.is_empty() {
                    state.by_task.remove(&allocation.task_id);
                }
            }
            if let Some(list) = state.by_worker.get_mut(&allocation.worker_id) {
                list.retain(|other| other != id);
                if list.is_empty() {
                    state.by_worker.remove(&allocation.worker_id);
                }
            }
            removed.push(allocation);
        }
        removed
    }

    pub fn for_task(&self, task_id: TaskId) -> Vec<Allocation> {
        let state = read(&self.state);
        state.collect(state.by_task.get(&task_id))
    }

    pub fn for_worker(&self, worker_id: WorkerId) -> Vec<Allocation> {
        let state = read(&self.state);
        state.collect(state.by_worker.get(&worker_id))
    }

    pub fn has_active_for_task(&self, task_id: TaskId) -> bool {
        self.for_task(task_id).iter().any(Allocation::is_active)
    }

    pub fn active_count_for_worker(&self, worker_id: WorkerId) -> usize {
        self.for_worker(worker_id)
            .iter()
            .filter(|allocation| allocation.is_active())
            .count()
    }

    pub fn all(&self) -> Vec<Allocation> {
        let mut all: Vec<_> = read(&self.state).by_id.values().cloned().collect();
        all.sort_by_key(|allocation| (allocation.task_id, allocation.created_at, allocation.id));
        all
    }

    pub fn record_payment(&self, obligation: PaymentObligation) {
        write(&self.state).payments.push(obligation);
    }

    pub fn payments(&self) -> Vec<PaymentObligation> {
        read(&self.state).payments.clone()
    }

    pub fn amount_owed(&self, worker_id: WorkerId) -> Wei {
        read(&self.state)
            .payments
            .iter()
            .filter(|payment| payment.worker_id == worker_id)
            .map(|payment| payment.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AllocationStatus;
    use chrono::{DateTime, Utc};
    use ulid::Ulid;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn allocation(task: u64, worker: u64, hours: u32) -> Allocation {
        Allocation::new(
            AllocationId::from_ulid(Ulid::new()),
            TaskId::new(task),
            WorkerId::new(worker),
            hours,
            12,
            now(),
        )
    }

    #[test]
    fn allocations_are_indexed_by_task_and_worker() {
        let book = AllocationBook::new();
        let a = allocation(1, 1, 3);
        let b = allocation(1, 2, 3);
        let c = allocation(2, 1, 1);
        book.insert_all(&[a.clone(), b.clone(), c.clone()]);

        assert_eq!(book.for_task(TaskId::new(1)), vec![a.clone(), b.clone()]);
        assert_eq!(book.for_worker(WorkerId::new(1)), vec![a, c]);
        assert_eq!(book.active_count_for_worker(WorkerId::new(2)), 1);
    }

    #[test]
    fn failed_update_writes_nothing() {
        let book = AllocationBook::new();
        let a = allocation(1, 1, 3);
        book.insert_all(std::slice::from_ref(&a));

        book.update(a.id, |allocation| allocation.mark_cancelled(now()))
            .unwrap();
        let result = book.update(a.id, |allocation| allocation.mark_completed(now()));

        assert!(result.is_err());
        assert_eq!(book.get(a.id).unwrap().status, AllocationStatus::Cancelled);
    }

    #[test]
    fn remove_all_drops_indexes() {
        let book = AllocationBook::new();
        let a = allocation(1, 1, 3);
        book.insert_all(std::slice::from_ref(&a));

        let removed = book.remove_all(&[a.id]);
        assert_eq!(removed, vec![a.clone()]);
        assert!(book.for_task(TaskId::new(1)).is_empty());
        assert!(book.for_worker(WorkerId::new(1)).is_empty());
        assert!(matches!(book.get(a.id), Err(EngineError::NotFound(_))));
    }
}
