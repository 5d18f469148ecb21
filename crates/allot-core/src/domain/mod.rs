//! Domain model (IDs, records, states, errors, events, units).

pub mod allocation;
pub mod errors;
pub mod events;
pub mod ids;
pub mod payment;
pub mod state;
pub mod task;
pub mod transaction;
pub mod units;
pub mod worker;

pub use allocation::Allocation;
pub use errors::{EngineError, ErrorKind, LedgerError, MissingRecord, TransitionSubject};
pub use events::DomainEvent;
pub use ids::{AllocationId, TaskId, TxHash, WalletRef, WorkerId};
pub use payment::PaymentObligation;
pub use state::{AllocationStatus, TaskStatus};
pub use task::{Task, TaskSubmission};
pub use transaction::{BlockRange, TransactionRecord};
pub use units::Wei;
pub use worker::{Worker, WorkerRegistration};
