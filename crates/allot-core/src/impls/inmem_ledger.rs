//! InMemoryLedger - 開発・テスト用の ledger
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で async trait の中から状態を守る
//! - 書き込みごとに TransactionRecord を発行（ブロック番号は単調増加）
//! - 失敗注入で Coordinator のロールバックを再現

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::{
    Allocation, AllocationId, BlockRange, LedgerError, Task, TaskId, TransactionRecord, TxHash,
    Wei, Worker, WorkerId,
};
use crate::ports::{Clock, LedgerClient};

/// 書き込みの種類（ガス量と失敗注入の単位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LedgerWrite {
    WorkerRegistration,
    Task,
    Allocation,
}

/// 書き込み種別ごとのガス量とガス価格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    pub worker_registration: u64,
    pub task: u64,
    pub allocation: u64,
    pub gas_price: Wei,
}

impl GasSchedule {
    pub fn with_gas_price(mut self, gas_price: Wei) -> Self {
        self.gas_price = gas_price;
        self
    }

    fn gas_for(&self, write: LedgerWrite) -> u64 {
        match write {
            LedgerWrite::WorkerRegistration => self.worker_registration,
            LedgerWrite::Task => self.task,
            LedgerWrite::Allocation => self.allocation,
        }
    }
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            worker_registration: 120_000,
            task: 180_000,
            allocation: 95_000,
            gas_price: Wei::from_gwei(20),
        }
    }
}

struct InjectedFailure {
    write: LedgerWrite,
    /// この種別の書き込みがあと何回成功してから失敗するか
    succeed_first: usize,
    error: LedgerError,
}

#[derive(Default)]
struct LedgerState {
    workers: BTreeMap<WorkerId, Worker>,
    tasks: BTreeMap<TaskId, Task>,
    allocations: BTreeMap<AllocationId, Allocation>,
    transactions: Vec<TransactionRecord>,
    next_block: u64,
    failure: Option<InjectedFailure>,
}

impl LedgerState {
    fn take_failure(&mut self, write: LedgerWrite) -> Option<LedgerError> {
        let failure = self.failure.as_mut()?;
        if failure.write != write {
            return None;
        }
        if failure.succeed_first > 0 {
            failure.succeed_first -= 1;
            return None;
        }
        self.failure.take().map(|failure| failure.error)
    }
}

/// InMemoryLedger は LedgerClient の fake
///
/// # 使用例
/// ```ignore
/// let ledger = InMemoryLedger::new(clock.clone(), GasSchedule::default());
/// ledger.fail_after(LedgerWrite::Allocation, 1, LedgerError::Rejected("out of gas".into())).await;
/// ```
pub struct InMemoryLedger {
    clock: Arc<dyn Clock>,
    schedule: GasSchedule,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(clock: Arc<dyn Clock>, schedule: GasSchedule) -> Self {
        Self {
            clock,
            schedule,
            state: Mutex::new(LedgerState {
                next_block: 1,
                ..LedgerState::default()
            }),
        }
    }

    pub fn schedule(&self) -> GasSchedule {
        self.schedule
    }

    /// The next `write` fails with `error`.
    pub async fn fail_next(&self, write: LedgerWrite, error: LedgerError) {
        self.fail_after(write, 0, error).await;
    }

    /// Let `succeed_first` writes of this kind through, then fail one with `error`.
    pub async fn fail_after(&self, write: LedgerWrite, succeed_first: usize, error: LedgerError) {
        self.state.lock().await.failure = Some(InjectedFailure {
            write,
            succeed_first,
            error,
        });
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    pub async fn allocation(&self, id: AllocationId) -> Option<Allocation> {
        self.state.lock().await.allocations.get(&id).cloned()
    }

    fn mint(&self, state: &mut LedgerState, write: LedgerWrite) -> TxHash {
        let now = self.clock.now();
        let timestamp_ms = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let hash = TxHash::new(format!(
            "0x{:064x}",
            Ulid::from_parts(timestamp_ms, rand::random()).0
        ));
        let block_number = state.next_block;
        state.next_block += 1;
        state.transactions.push(TransactionRecord {
            hash: hash.clone(),
            block_number,
            gas_used: self.schedule.gas_for(write),
            gas_price: self.schedule.gas_price,
            timestamp: now,
        });
        hash
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit_worker_registration(&self, worker: &Worker) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.take_failure(LedgerWrite::WorkerRegistration) {
            return Err(error);
        }
        if state.workers.contains_key(&worker.id) {
            return Err(LedgerError::Conflict(format!("{} already on ledger", worker.id)));
        }
        state.workers.insert(worker.id, worker.clone());
        Ok(self.mint(&mut state, LedgerWrite::WorkerRegistration))
    }

    async fn submit_task(&self, task: &Task) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.take_failure(LedgerWrite::Task) {
            return Err(error);
        }
        if state.tasks.contains_key(&task.id) {
            return Err(LedgerError::Conflict(format!("{} already on ledger", task.id)));
        }
        state.tasks.insert(task.id, task.clone());
        Ok(self.mint(&mut state, LedgerWrite::Task))
    }

    async fn submit_allocation(&self, allocation: &Allocation) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.take_failure(LedgerWrite::Allocation) {
            return Err(error);
        }
        if !state.tasks.contains_key(&allocation.task_id) {
            return Err(LedgerError::Rejected(format!(
                "{} is not on ledger",
                allocation.task_id
            )));
        }
        if !state.workers.contains_key(&allocation.worker_id) {
            return Err(LedgerError::Rejected(format!(
                "{} is not on ledger",
                allocation.worker_id
            )));
        }
        state.allocations.insert(allocation.id, allocation.clone());
        Ok(self.mint(&mut state, LedgerWrite::Allocation))
    }

    async fn read_task_details(&self, id: TaskId) -> Result<Option<Task>, LedgerError> {
        Ok(self.state.lock().await.tasks.get(&id).cloned())
    }

    async fn read_worker_details(&self, id: WorkerId) -> Result<Option<Worker>, LedgerError> {
        Ok(self.state.lock().await.workers.get(&id).cloned())
    }

    async fn read_past_transactions(
        &self,
        range: BlockRange,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|record| range.contains(record.block_number))
            .cloned()
            .collect())
    }
}
