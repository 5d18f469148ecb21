//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **SequentialIdGenerator**: Worker/Task は連番、Allocation は clock ベースの ULID

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ulid::Ulid;

use crate::domain::ids::{AllocationId, TaskId, WorkerId};
use crate::ports::Clock;

/// IdGenerator は engine が使う ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
/// - Worker/Task ID は単調増加でなければならない（tie-break とロック順序に使う）
pub trait IdGenerator: Send + Sync {
    fn next_worker_id(&self) -> WorkerId;

    fn next_task_id(&self) -> TaskId;

    fn next_allocation_id(&self) -> AllocationId;
}

/// SequentialIdGenerator は 1 から始まる連番と ULID を組み合わせた生成器
///
/// Allocation の ULID は Clock の時刻を使うので、
/// FixedClock を使うとタイムスタンプ部分が決定的になります。
pub struct SequentialIdGenerator {
    clock: Arc<dyn Clock>,
    next_worker: AtomicU64,
    next_task: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_worker: AtomicU64::new(1),
            next_task: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_worker_id(&self) -> WorkerId {
        WorkerId::new(self.next_worker.fetch_add(1, Ordering::Relaxed))
    }

    fn next_task_id(&self) -> TaskId {
        TaskId::new(self.next_task.fetch_add(1, Ordering::Relaxed))
    }

    fn next_allocation_id(&self) -> AllocationId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        AllocationId::from(ulid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn worker_and_task_ids_are_sequential() {
        let id_gen = SequentialIdGenerator::new(Arc::new(SystemClock));

        assert_eq!(id_gen.next_worker_id(), WorkerId::new(1));
        assert_eq!(id_gen.next_worker_id(), WorkerId::new(2));
        assert_eq!(id_gen.next_task_id(), TaskId::new(1));
        assert_eq!(id_gen.next_worker_id(), WorkerId::new(3));
    }

    #[test]
    fn allocation_ids_use_the_clock() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = SequentialIdGenerator::new(Arc::new(FixedClock::new(fixed_time)));

        let id1 = id_gen.next_allocation_id();
        let id2 = id_gen.next_allocation_id();

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);

        // timestamp 部分は同じ
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
