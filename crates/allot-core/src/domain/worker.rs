//! Worker record and registration input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::ids::{WalletRef, WorkerId};

/// Registration request as it arrives from the transport layer.
///
/// Numbers are signed on purpose: out-of-range values are rejected by
/// [`WorkerRegistration::validate`] instead of being unrepresentable upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRegistration {
    pub available_hours: i64,
    pub expertise_level: u32,
    pub min_hourly_wage: i64,
    #[serde(default)]
    pub wallet: Option<WalletRef>,
}

impl WorkerRegistration {
    pub fn new(available_hours: i64, expertise_level: u32, min_hourly_wage: i64) -> Self {
        Self {
            available_hours,
            expertise_level,
            min_hourly_wage,
            wallet: None,
        }
    }

    pub fn with_wallet(mut self, wallet: WalletRef) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Check ranges and build the record that will be stored under `id`.
    pub fn validate(&self, id: WorkerId, now: DateTime<Utc>) -> Result<Worker, EngineError> {
        if self.available_hours <= 0 {
            return Err(EngineError::invalid_input(format!(
                "available hours must be positive, got {}",
                self.available_hours
            )));
        }
        let hours = u32::try_from(self.available_hours).map_err(|_| {
            EngineError::invalid_input(format!(
                "available hours out of range: {}",
                self.available_hours
            ))
        })?;
        let min_wage = u64::try_from(self.min_hourly_wage).map_err(|_| {
            EngineError::invalid_input(format!(
                "minimum hourly wage must not be negative, got {}",
                self.min_hourly_wage
            ))
        })?;

        Ok(Worker {
            id,
            capacity_hours: hours,
            available_hours: hours,
            expertise_level: self.expertise_level,
            min_hourly_wage: min_wage,
            wallet: self.wallet.clone(),
            registered_at: now,
        })
    }
}

/// Canonical worker record owned by the registry.
///
/// Identity and constraints never change after registration; only
/// `available_hours` moves with allocations and cancellations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: WorkerId,
    /// Hours offered at registration.
    pub capacity_hours: u32,
    pub available_hours: u32,
    pub expertise_level: u32,
    pub min_hourly_wage: u64,
    pub wallet: Option<WalletRef>,
    pub registered_at: DateTime<Utc>,
}

impl Worker {
    /// Take `hours` out of the remaining capacity.
    pub fn reserve(&mut self, hours: u32) -> Result<(), EngineError> {
        if hours > self.available_hours {
            return Err(EngineError::ConcurrencyConflict(format!(
                "{} has {} hour(s) left, {} requested",
                self.id, self.available_hours, hours
            )));
        }
        self.available_hours -= hours;
        Ok(())
    }

    /// Give `hours` back. Never exceeds the registered capacity.
    pub fn release(&mut self, hours: u32) {
        self.available_hours = self
            .available_hours
            .saturating_add(hours)
            .min(self.capacity_hours);
    }

    /// Hours currently bound to allocations (active or completed).
    pub fn committed_hours(&self) -> u32 {
        self.capacity_hours - self.available_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[rstest]
    #[case::zero_hours(WorkerRegistration::new(0, 3, 10))]
    #[case::negative_hours(WorkerRegistration::new(-4, 3, 10))]
    #[case::negative_wage(WorkerRegistration::new(5, 3, -1))]
    #[case::overflowing_hours(WorkerRegistration::new(i64::from(u32::MAX) + 1, 3, 10))]
    fn invalid_registrations_are_rejected(#[case] registration: WorkerRegistration) {
        let result = registration.validate(WorkerId::new(1), now());
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn zero_minimum_wage_is_allowed() {
        let worker = WorkerRegistration::new(5, 1, 0)
            .validate(WorkerId::new(1), now())
            .unwrap();
        assert_eq!(worker.min_hourly_wage, 0);
        assert_eq!(worker.available_hours, 5);
        assert_eq!(worker.capacity_hours, 5);
    }

    #[test]
    fn reserve_and_release_keep_capacity_bounds() {
        let mut worker = WorkerRegistration::new(5, 3, 10)
            .validate(WorkerId::new(1), now())
            .unwrap();

        worker.reserve(3).unwrap();
        assert_eq!(worker.available_hours, 2);
        assert_eq!(worker.committed_hours(), 3);

        assert!(matches!(
            worker.reserve(3),
            Err(EngineError::ConcurrencyConflict(_))
        ));
        assert_eq!(worker.available_hours, 2);

        worker.release(10);
        assert_eq!(worker.available_hours, 5);
    }
}
