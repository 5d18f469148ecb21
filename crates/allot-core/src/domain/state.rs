//! State - Task と Allocation の状態
//!
//! 文字列ではなく閉じた enum で表現し、遷移は `transition_to` で網羅的に検査します。
//! 不正な遷移は `EngineError::InvalidTransition` になります（黙って無視しない）。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{EngineError, TransitionSubject};

/// TaskStatus はタスクの状態を表現
///
/// # 状態遷移
/// - pending -> inProgress: allocate が 1 時間以上を commit
/// - inProgress -> completed: coverage が満ち、全 allocation が完了報告済み
/// - inProgress -> pending: cancel で coverage が 0 に戻った
/// - pending | inProgress -> expired: deadline 超過（coverage が満ちていない場合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Expired,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Expired)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Pending)
                | (Pending, Expired)
                | (InProgress, Expired)
        )
    }

    pub fn transition_to(self, next: TaskStatus) -> Result<TaskStatus, EngineError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                subject: TransitionSubject::Task,
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::Completed => "completed",
            TaskStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// AllocationStatus は allocation の状態を表現
///
/// - active -> completed: worker が完了を報告
/// - active -> cancelled: 完了前にキャンセル（時間を worker に戻す）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AllocationStatus {
    Active,
    Completed,
    Cancelled,
}

impl AllocationStatus {
    /// Active and completed allocations count towards task coverage.
    pub fn counts_towards_coverage(self) -> bool {
        matches!(self, AllocationStatus::Active | AllocationStatus::Completed)
    }

    pub fn transition_to(self, next: AllocationStatus) -> Result<AllocationStatus, EngineError> {
        match (self, next) {
            (AllocationStatus::Active, AllocationStatus::Completed)
            | (AllocationStatus::Active, AllocationStatus::Cancelled) => Ok(next),
            _ => Err(EngineError::InvalidTransition {
                subject: TransitionSubject::Allocation,
                from: self.to_string(),
                to: next.to_string(),
            }),
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AllocationStatus::Active => "active",
            AllocationStatus::Completed => "completed",
            AllocationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::start(TaskStatus::Pending, TaskStatus::InProgress)]
    #[case::finish(TaskStatus::InProgress, TaskStatus::Completed)]
    #[case::revert(TaskStatus::InProgress, TaskStatus::Pending)]
    #[case::expire_pending(TaskStatus::Pending, TaskStatus::Expired)]
    #[case::expire_partial(TaskStatus::InProgress, TaskStatus::Expired)]
    fn legal_task_transitions(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        assert_eq!(from.transition_to(to).unwrap(), to);
    }

    #[rstest]
    #[case::skip_progress(TaskStatus::Pending, TaskStatus::Completed)]
    #[case::reopen(TaskStatus::Completed, TaskStatus::InProgress)]
    #[case::expire_completed(TaskStatus::Completed, TaskStatus::Expired)]
    #[case::revive(TaskStatus::Expired, TaskStatus::Pending)]
    fn illegal_task_transitions(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        assert!(matches!(
            from.transition_to(to),
            Err(EngineError::InvalidTransition { subject: TransitionSubject::Task, .. })
        ));
    }

    #[rstest]
    #[case::complete_cancelled(AllocationStatus::Cancelled, AllocationStatus::Completed)]
    #[case::cancel_completed(AllocationStatus::Completed, AllocationStatus::Cancelled)]
    #[case::complete_twice(AllocationStatus::Completed, AllocationStatus::Completed)]
    fn illegal_allocation_transitions(#[case] from: AllocationStatus, #[case] to: AllocationStatus) {
        assert!(from.transition_to(to).is_err());
    }

    #[test]
    fn status_uses_camel_case_on_the_wire() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"inProgress\"");
        assert_eq!(TaskStatus::InProgress.to_string(), "inProgress");
    }
}
