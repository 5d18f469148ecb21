//! Errors - エラー型と分類
//!
//! 失敗はすべて具体的な種類付きで呼び出し元に返します（握りつぶさない）。
//! 変更系の操作は呼び出し境界でトランザクショナルで、失敗時に部分 commit は残りません。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::ids::{AllocationId, TaskId, WorkerId};

/// ErrorKind は運用上の分類
///
/// - InvalidInput: 入力不正（変更前に拒否）
/// - NotFound: 未知の ID
/// - Unsatisfiable: 今は割り当てられない（後で再試行 or 制約を変える）
/// - InvalidTransition: 不正なライフサイクル遷移（呼び出し元/ledger とのズレ）
/// - ConcurrencyConflict: ロック競合・ledger 書き込み競合（backoff して再試行）
/// - Ledger: ledger collaborator の失敗
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unsatisfiable,
    InvalidTransition,
    ConcurrencyConflict,
    Ledger,
}

/// Which record an id or a transition refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSubject {
    Task,
    Allocation,
}

impl fmt::Display for TransitionSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionSubject::Task => f.write_str("task"),
            TransitionSubject::Allocation => f.write_str("allocation"),
        }
    }
}

/// An id that could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRecord {
    Worker(WorkerId),
    Task(TaskId),
    Allocation(AllocationId),
}

impl fmt::Display for MissingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingRecord::Worker(id) => id.fmt(f),
            MissingRecord::Task(id) => id.fmt(f),
            MissingRecord::Allocation(id) => id.fmt(f),
        }
    }
}

/// Failures reported by the ledger collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger rejected the write: {0}")]
    Rejected(String),

    #[error("ledger write race: {0}")]
    Conflict(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(MissingRecord),

    #[error("no eligible worker for {0}")]
    NoEligibleWorker(TaskId),

    #[error("eligible workers cannot cover {task_id}: {uncovered} hour(s) left uncovered")]
    PartialAllocationImpossible { task_id: TaskId, uncovered: u32 },

    #[error("{task_id} waits for unfinished dependencies {pending:?}")]
    DependenciesPending { task_id: TaskId, pending: Vec<TaskId> },

    #[error("invalid {subject} transition: {from} -> {to}")]
    InvalidTransition {
        subject: TransitionSubject,
        from: String,
        to: String,
    },

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::NoEligibleWorker(_)
            | EngineError::PartialAllocationImpossible { .. }
            | EngineError::DependenciesPending { .. } => ErrorKind::Unsatisfiable,
            EngineError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            EngineError::ConcurrencyConflict(_) | EngineError::Ledger(LedgerError::Conflict(_)) => {
                ErrorKind::ConcurrencyConflict
            }
            EngineError::Ledger(_) => ErrorKind::Ledger,
        }
    }

    /// Whether the caller may retry the same request later without changing it.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::Unsatisfiable | ErrorKind::ConcurrencyConflict => true,
            ErrorKind::Ledger => matches!(self, EngineError::Ledger(LedgerError::Unavailable(_))),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::input(EngineError::invalid_input("hours must be positive"), ErrorKind::InvalidInput, false)]
    #[case::missing(EngineError::NotFound(MissingRecord::Task(TaskId::new(9))), ErrorKind::NotFound, false)]
    #[case::no_worker(EngineError::NoEligibleWorker(TaskId::new(1)), ErrorKind::Unsatisfiable, true)]
    #[case::conflict(EngineError::ConcurrencyConflict("retry".into()), ErrorKind::ConcurrencyConflict, true)]
    #[case::ledger_race(EngineError::Ledger(LedgerError::Conflict("nonce".into())), ErrorKind::ConcurrencyConflict, true)]
    #[case::ledger_reject(EngineError::Ledger(LedgerError::Rejected("revert".into())), ErrorKind::Ledger, false)]
    #[case::ledger_down(EngineError::Ledger(LedgerError::Unavailable("rpc".into())), ErrorKind::Ledger, true)]
    fn errors_are_classified(
        #[case] error: EngineError,
        #[case] kind: ErrorKind,
        #[case] retryable: bool,
    ) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn messages_name_the_record() {
        let error = EngineError::NotFound(MissingRecord::Worker(WorkerId::new(4)));
        assert_eq!(error.to_string(), "not found: worker-4");

        let error = EngineError::PartialAllocationImpossible {
            task_id: TaskId::new(2),
            uncovered: 3,
        };
        assert_eq!(
            error.to_string(),
            "eligible workers cannot cover task-2: 3 hour(s) left uncovered"
        );
    }
}
