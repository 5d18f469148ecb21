//! Registry - Worker / Task の正本（engine 内）
//!
//! Registry は Worker と Task のレコードを排他的に所有します。
//! 各レコードは個別の Mutex に入っており、
//! capacity / coverage の変更はエンティティ単位で直列化されます。
//!
//! # ロック
//! - map の RwLock はハンドル（Arc）の出し入れにだけ使う
//! - エンティティの Mutex を持ったまま map のロックを取らない

mod dependency;

pub use dependency::DependencyGraph;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::domain::{EngineError, MissingRecord, Task, TaskId, Worker, WorkerId};
use crate::sync::{lock, read, write};

pub type WorkerHandle = Arc<Mutex<Worker>>;
pub type TaskHandle = Arc<Mutex<Task>>;

#[derive(Debug, Default)]
pub struct Registry {
    workers: RwLock<BTreeMap<WorkerId, WorkerHandle>>,
    tasks: RwLock<BTreeMap<TaskId, TaskHandle>>,
    dependencies: RwLock<DependencyGraph>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_worker(&self, worker: Worker) -> Result<(), EngineError> {
        let mut workers = write(&self.workers);
        if workers.contains_key(&worker.id) {
            return Err(EngineError::ConcurrencyConflict(format!(
                "{} is already registered",
                worker.id
            )));
        }
        workers.insert(worker.id, Arc::new(Mutex::new(worker)));
        Ok(())
    }

    /// Insert a validated task. Every dependency must already be registered.
    pub fn insert_task(&self, task: Task) -> Result<(), EngineError> {
        let mut tasks = write(&self.tasks);
        if tasks.contains_key(&task.id) {
            return Err(EngineError::ConcurrencyConflict(format!(
                "{} is already registered",
                task.id
            )));
        }
        if let Some(missing) = task.dependencies.iter().find(|dep| !tasks.contains_key(*dep)) {
            return Err(EngineError::NotFound(MissingRecord::Task(*missing)));
        }

        let mut graph = write(&self.dependencies);
        for dep in &task.dependencies {
            graph.add_dependency(task.id, *dep);
        }
        tasks.insert(task.id, Arc::new(Mutex::new(task)));
        Ok(())
    }

    pub fn worker_handle(&self, id: WorkerId) -> Result<WorkerHandle, EngineError> {
        read(&self.workers)
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound(MissingRecord::Worker(id)))
    }

    pub fn task_handle(&self, id: TaskId) -> Result<TaskHandle, EngineError> {
        read(&self.tasks)
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound(MissingRecord::Task(id)))
    }

    /// All worker handles in ascending id order.
    pub fn worker_handles(&self) -> Vec<(WorkerId, WorkerHandle)> {
        read(&self.workers)
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect()
    }

    /// All task handles in ascending id order.
    pub fn task_handles(&self) -> Vec<(TaskId, TaskHandle)> {
        read(&self.tasks)
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect()
    }

    pub fn get_worker(&self, id: WorkerId) -> Result<Worker, EngineError> {
        let handle = self.worker_handle(id)?;
        let worker = lock(&handle).clone();
        Ok(worker)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Task, EngineError> {
        let handle = self.task_handle(id)?;
        let task = lock(&handle).clone();
        Ok(task)
    }

    pub fn workers_snapshot(&self) -> Vec<Worker> {
        self.worker_handles()
            .into_iter()
            .map(|(_, handle)| lock(&handle).clone())
            .collect()
    }

    pub fn tasks_snapshot(&self) -> Vec<Task> {
        self.task_handles()
            .into_iter()
            .map(|(_, handle)| lock(&handle).clone())
            .collect()
    }

    /// Handles of the tasks `id` depends on, ascending.
    pub fn dependency_handles(&self, id: TaskId) -> Result<Vec<(TaskId, TaskHandle)>, EngineError> {
        let deps = read(&self.dependencies).get_dependencies(id);
        deps.into_iter()
            .map(|dep| self.task_handle(dep).map(|handle| (dep, handle)))
            .collect()
    }

    pub fn dependants_of(&self, id: TaskId) -> Vec<TaskId> {
        read(&self.dependencies).get_waiting_tasks(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskSubmission, WorkerRegistration};
    use chrono::{DateTime, Duration, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn worker(id: u64) -> Worker {
        WorkerRegistration::new(5, 3, 10)
            .validate(WorkerId::new(id), now())
            .unwrap()
    }

    fn task(id: u64, deps: &[u64]) -> Task {
        let mut submission = TaskSubmission::new(6, 3, 12, now() + Duration::hours(24), true);
        for dep in deps {
            submission = submission.depends_on(TaskId::new(*dep));
        }
        submission.validate(TaskId::new(id), now()).unwrap()
    }

    #[test]
    fn get_unknown_ids_is_not_found() {
        let registry = Registry::new();
        assert_eq!(
            registry.get_worker(WorkerId::new(1)),
            Err(EngineError::NotFound(MissingRecord::Worker(WorkerId::new(1))))
        );
        assert_eq!(
            registry.get_task(TaskId::new(1)),
            Err(EngineError::NotFound(MissingRecord::Task(TaskId::new(1))))
        );
    }

    #[test]
    fn handles_are_listed_in_id_order() {
        let registry = Registry::new();
        registry.insert_worker(worker(3)).unwrap();
        registry.insert_worker(worker(1)).unwrap();
        registry.insert_worker(worker(2)).unwrap();

        let ids: Vec<_> = registry.worker_handles().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![WorkerId::new(1), WorkerId::new(2), WorkerId::new(3)]);
    }

    #[test]
    fn task_with_unknown_dependency_is_rejected_without_mutation() {
        let registry = Registry::new();
        let result = registry.insert_task(task(2, &[1]));

        assert_eq!(
            result,
            Err(EngineError::NotFound(MissingRecord::Task(TaskId::new(1))))
        );
        assert!(registry.tasks_snapshot().is_empty());
    }

    #[test]
    fn dependencies_are_tracked_both_ways() {
        let registry = Registry::new();
        registry.insert_task(task(1, &[])).unwrap();
        registry.insert_task(task(2, &[1])).unwrap();

        let deps: Vec<_> = registry
            .dependency_handles(TaskId::new(2))
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(deps, vec![TaskId::new(1)]);
        assert_eq!(registry.dependants_of(TaskId::new(1)), vec![TaskId::new(2)]);
        assert!(registry.dependants_of(TaskId::new(2)).is_empty());
    }
}
