//! Allocation planner: turns an eligible sequence into worker shares.
//!
//! Pure: reads a task and candidate snapshots, returns the shares to commit.
//! Committing (and re-validating under locks) is the engine's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::eligibility::Candidate;
use crate::domain::{EngineError, Task, WorkerId};

/// Hours one worker should commit to the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub worker_id: WorkerId,
    pub hours: u32,
}

/// Plan how to cover the task's remaining hours.
///
/// - Non-divisible: the first eligible worker that can take all of it alone.
/// - Divisible: greedy in eligibility order, each worker contributing
///   `min(available, uncovered)` until nothing is left.
///
/// A share of `h` hours starting at `now` finishes at `now + h` hours and must
/// not end after the deadline. Shares run in parallel, so the deadline caps each
/// share, not their sum.
pub fn plan(
    task: &Task,
    eligible: impl IntoIterator<Item = Candidate>,
    now: DateTime<Utc>,
) -> Result<Vec<Share>, EngineError> {
    let horizon = task.hours_until_deadline(now);
    let uncovered = task.remaining_uncovered();

    if !task.is_divisible {
        if uncovered > horizon {
            return Err(EngineError::NoEligibleWorker(task.id));
        }
        return eligible
            .into_iter()
            .find(|candidate| candidate.available_hours >= uncovered)
            .map(|candidate| {
                vec![Share {
                    worker_id: candidate.worker_id,
                    hours: uncovered,
                }]
            })
            .ok_or(EngineError::NoEligibleWorker(task.id));
    }

    let mut remaining = uncovered;
    let mut shares = Vec::new();
    let mut seen_any = false;
    for candidate in eligible {
        seen_any = true;
        let hours = candidate.available_hours.min(remaining).min(horizon);
        if hours == 0 {
            continue;
        }
        shares.push(Share {
            worker_id: candidate.worker_id,
            hours,
        });
        remaining -= hours;
        if remaining == 0 {
            return Ok(shares);
        }
    }

    if !seen_any || horizon == 0 {
        return Err(EngineError::NoEligibleWorker(task.id));
    }
    Err(EngineError::PartialAllocationImpossible {
        task_id: task.id,
        uncovered: remaining,
    })
}
