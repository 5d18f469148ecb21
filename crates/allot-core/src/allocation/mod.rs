//! Allocation module: eligibility filter, planner, and the allocation book.

pub mod book;
pub mod eligibility;
pub mod planner;

pub use book::AllocationBook;
pub use eligibility::{Candidate, EligibleWorkers, eligibility_order, find_eligible_workers};
pub use planner::{Share, plan};
