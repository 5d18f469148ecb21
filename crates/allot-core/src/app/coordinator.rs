//! Coordinator - engine と ledger の橋渡し
//!
//! # 書き込みの順序
//! - worker / task: engine で検証して id を採番し、ledger が確定してから登録する。
//!   確定前のレコードは `allocate` から見えない
//! - allocation: engine が先に反映し（同期、ロック内）、ledger に送信する（async、ロック外）。
//!   ledger が拒否したら、まだ確定していない分だけ engine 側を巻き戻す
//!
//! ledger が正本なので、確定済みの書き込みは engine から消しません。

use std::sync::Arc;

use tracing::{debug, warn};

use super::engine::Engine;
use crate::accounting::{OnchainCosts, TransactionStats, TransactionSummary};
use crate::domain::{
    Allocation, AllocationId, BlockRange, EngineError, MissingRecord, Task, TaskId,
    TaskSubmission, TxHash, Worker, WorkerId, WorkerRegistration,
};
use crate::ports::LedgerClient;

/// A record together with the ledger transaction that confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed<T> {
    pub record: T,
    pub tx_hash: TxHash,
}

pub struct Coordinator<L: LedgerClient> {
    engine: Arc<Engine>,
    ledger: Arc<L>,
}

impl<L: LedgerClient> Coordinator<L> {
    pub fn new(engine: Arc<Engine>, ledger: Arc<L>) -> Self {
        Self { engine, ledger }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Register a worker once the ledger has confirmed it.
    ///
    /// On rejection nothing is stored and the ledger error is returned as is.
    pub async fn register_worker(
        &self,
        registration: &WorkerRegistration,
    ) -> Result<Confirmed<Worker>, EngineError> {
        let worker = self.engine.prepare_worker(registration)?;

        let tx_hash = match self.ledger.submit_worker_registration(&worker).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                warn!(worker_id = %worker.id, error = %e, "ledger rejected registration");
                return Err(e.into());
            }
        };
        self.engine.admit_worker(worker.clone())?;
        Ok(Confirmed {
            record: worker,
            tx_hash,
        })
    }

    pub async fn add_task(&self, submission: &TaskSubmission) -> Result<Confirmed<Task>, EngineError> {
        let task = self.engine.prepare_task(submission)?;

        let tx_hash = match self.ledger.submit_task(&task).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "ledger rejected task");
                return Err(e.into());
            }
        };
        self.engine.admit_task(task.clone())?;
        Ok(Confirmed {
            record: task,
            tx_hash,
        })
    }

    /// Allocate, then confirm each allocation on the ledger in order.
    ///
    /// On the first rejection every allocation not yet confirmed is reverted;
    /// the confirmed ones stay.
    pub async fn allocate(&self, task_id: TaskId) -> Result<Vec<Confirmed<Allocation>>, EngineError> {
        let allocations = self.engine.allocate(task_id)?;

        let mut confirmed = Vec::with_capacity(allocations.len());
        for (index, allocation) in allocations.iter().enumerate() {
            match self.ledger.submit_allocation(allocation).await {
                Ok(tx_hash) => {
                    debug!(allocation_id = %allocation.id, %tx_hash, "allocation confirmed");
                    confirmed.push(Confirmed {
                        record: allocation.clone(),
                        tx_hash,
                    });
                }
                Err(e) => {
                    let unconfirmed: Vec<AllocationId> =
                        allocations[index..].iter().map(|a| a.id).collect();
                    warn!(
                        %task_id,
                        confirmed = confirmed.len(),
                        reverted = unconfirmed.len(),
                        error = %e,
                        "ledger rejected allocation"
                    );
                    self.engine.revert_allocations(task_id, &unconfirmed)?;
                    return Err(e.into());
                }
            }
        }
        Ok(confirmed)
    }

    pub fn complete_allocation(&self, id: AllocationId) -> Result<Allocation, EngineError> {
        self.engine.complete_allocation(id)
    }

    pub fn cancel_allocation(&self, id: AllocationId) -> Result<Allocation, EngineError> {
        self.engine.cancel_allocation(id)
    }

    /// Task as recorded on the ledger.
    pub async fn ledger_task(&self, id: TaskId) -> Result<Task, EngineError> {
        self.ledger
            .read_task_details(id)
            .await?
            .ok_or(EngineError::NotFound(MissingRecord::Task(id)))
    }

    /// Worker as recorded on the ledger.
    pub async fn ledger_worker(&self, id: WorkerId) -> Result<Worker, EngineError> {
        self.ledger
            .read_worker_details(id)
            .await?
            .ok_or(EngineError::NotFound(MissingRecord::Worker(id)))
    }

    pub async fn transaction_summary(&self, range: BlockRange) -> Result<TransactionSummary, EngineError> {
        let records = self.ledger.read_past_transactions(range).await?;
        self.engine.summarize(&records)
    }

    pub async fn onchain_costs(&self, range: BlockRange) -> Result<OnchainCosts, EngineError> {
        Ok(self.transaction_summary(range).await?.onchain_costs())
    }

    pub async fn transaction_stats(&self, range: BlockRange) -> Result<TransactionStats, EngineError> {
        Ok(self.transaction_summary(range).await?.transaction_stats())
    }
}
