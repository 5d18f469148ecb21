//! Configuration for the allot CLI
//!
//! CLI arguments and environment variable handling using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// allot - task allocation & settlement engine
#[derive(Parser, Debug, Clone)]
#[command(name = "allot")]
#[command(about = "Allocate paid tasks to workers and report settlement costs")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ALLOT_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// How many times allocate re-plans after losing a capacity race
    #[arg(long, env = "ALLOT_MAX_PLAN_ATTEMPTS", default_value_t = allot_core::app::DEFAULT_MAX_PLAN_ATTEMPTS, global = true)]
    pub max_plan_attempts: u32,

    /// Gas price charged by the in-memory ledger, in gwei
    #[arg(long, env = "ALLOT_GAS_PRICE_GWEI", default_value_t = 20, global = true)]
    pub gas_price_gwei: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the two-worker, one-task walkthrough end to end
    Demo,

    /// Load workers and tasks from a JSON file and allocate every pending task
    Plan {
        /// Path to a JSON file with `workers` and `tasks` arrays
        #[arg(long, short)]
        input: PathBuf,
    },
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_plan_attempts == 0 {
            return Err("max-plan-attempts must be at least 1".to_string());
        }
        if self.gas_price_gwei == 0 {
            return Err("gas-price-gwei must be greater than 0".to_string());
        }
        Ok(())
    }
}
