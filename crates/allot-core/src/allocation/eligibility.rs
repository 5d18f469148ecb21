//! Eligibility filter: which workers may take a task, and in what order.
//!
//! # Ordering policy (cost minimisation)
//! 1. ascending `min_hourly_wage` (cheapest first)
//! 2. descending `expertise_level` (most qualified among equally cheap)
//! 3. ascending `WorkerId` (stable tie-break)
//!
//! This order decides allocation outcomes directly, so it is part of the
//! contract and covered by tests.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::domain::{Task, TaskStatus, Worker, WorkerId};

/// The parts of a worker the filter and planner look at, copied out of the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub worker_id: WorkerId,
    pub available_hours: u32,
    pub expertise_level: u32,
    pub min_hourly_wage: u64,
}

impl Candidate {
    pub fn of(worker: &Worker) -> Self {
        Self {
            worker_id: worker.id,
            available_hours: worker.available_hours,
            expertise_level: worker.expertise_level,
            min_hourly_wage: worker.min_hourly_wage,
        }
    }

    /// Worker-side predicate: expertise, wage and capacity.
    pub fn qualifies_for(&self, task: &Task) -> bool {
        self.expertise_level >= task.required_expertise
            && self.min_hourly_wage <= task.hourly_wage
            && self.available_hours > 0
    }
}

/// Total order used to rank eligible workers (smallest first).
pub fn eligibility_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.min_hourly_wage
        .cmp(&b.min_hourly_wage)
        .then_with(|| b.expertise_level.cmp(&a.expertise_level))
        .then_with(|| a.worker_id.cmp(&b.worker_id))
}

/// Heap entry.
///
/// We use reversed ordering so BinaryHeap acts as a min-heap (best candidate first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ranked(Candidate);

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        eligibility_order(&other.0, &self.0)
    }
}

/// Lazily ordered sequence of eligible workers.
///
/// Finite (bounded by the snapshot it was built from) and restartable:
/// clone it before consuming to walk the same order again.
#[derive(Debug, Clone, Default)]
pub struct EligibleWorkers {
    heap: BinaryHeap<Ranked>,
}

impl EligibleWorkers {
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Iterator for EligibleWorkers {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        self.heap.pop().map(|ranked| ranked.0)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.heap.len(), Some(self.heap.len()))
    }
}

impl ExactSizeIterator for EligibleWorkers {}

/// Filter `workers` against `task` as of `now`.
///
/// A task that is expired or completed has no eligible workers.
pub fn find_eligible_workers(
    task: &Task,
    workers: impl IntoIterator<Item = Candidate>,
    now: DateTime<Utc>,
) -> EligibleWorkers {
    if matches!(
        task.effective_status(now),
        TaskStatus::Expired | TaskStatus::Completed
    ) {
        return EligibleWorkers::default();
    }
    let heap = workers
        .into_iter()
        .filter(|candidate| candidate.qualifies_for(task))
        .map(Ranked)
        .collect();
    EligibleWorkers { heap }
}
