//! LedgerClient port - 正本（source of truth）となる ledger
//!
//! engine の Registry は ledger の射影（キャッシュ）に過ぎません。
//! worker / task は ledger が確定してから engine に登録し、
//! allocation の書き込み失敗時は Coordinator が未確定分をロールバックします。
//!
//! # 実装
//! - impls::InMemoryLedger: テスト・CLI 用の fake

use async_trait::async_trait;

use crate::domain::{
    Allocation, BlockRange, LedgerError, Task, TaskId, TransactionRecord, TxHash, Worker,
    WorkerId,
};

/// LedgerClient は ledger への読み書き
///
/// # 設計原則
/// - engine はこの trait にだけ依存する（具体的な singleton は持たない）
/// - 書き込みは transaction hash を返す
/// - 書き込みの失敗は `LedgerError` で返す
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit_worker_registration(&self, worker: &Worker) -> Result<TxHash, LedgerError>;

    async fn submit_task(&self, task: &Task) -> Result<TxHash, LedgerError>;

    async fn submit_allocation(&self, allocation: &Allocation) -> Result<TxHash, LedgerError>;

    async fn read_task_details(&self, id: TaskId) -> Result<Option<Task>, LedgerError>;

    async fn read_worker_details(&self, id: WorkerId) -> Result<Option<Worker>, LedgerError>;

    async fn read_past_transactions(
        &self,
        range: BlockRange,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;
}
