//! allot - thin command-line surface over allot-core
//!
//! Wires the engine to an in-memory ledger, runs one command and prints
//! the result as JSON on stdout. Logs go to stderr.

mod config;
mod report;

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use allot_core::domain::{BlockRange, TaskStatus, TaskSubmission, Wei, WorkerRegistration};
use allot_core::impls::{GasSchedule, InMemoryLedger, TracingEventSink};
use allot_core::ports::{Clock, SystemClock};
use allot_core::{Coordinator, EngineBuilder};

use crate::config::{Args, Command};
use crate::report::{AllocationFailure, PlanInput, Report};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("allot_core={0},allot_cli={0},allot::events={0},warn", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(2);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = EngineBuilder::new()
        .clock(Arc::clone(&clock))
        .event_sink(Arc::new(TracingEventSink))
        .max_plan_attempts(args.max_plan_attempts)
        .build()?;
    let schedule = GasSchedule::default().with_gas_price(Wei::from_gwei(args.gas_price_gwei));
    let ledger = InMemoryLedger::new(clock, schedule);
    let coordinator = Coordinator::new(Arc::new(engine), Arc::new(ledger));

    let report = match args.command {
        Command::Demo => run_demo(&coordinator).await?,
        Command::Plan { input } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let plan: PlanInput = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", input.display()))?;
            run_plan(&coordinator, plan).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Worker A (5h, expertise 3, min wage 10) and worker B (3h, expertise 5,
/// min wage 8) share a divisible 6h task, then both report done.
async fn run_demo(coordinator: &Coordinator<InMemoryLedger>) -> anyhow::Result<Report> {
    coordinator
        .register_worker(&WorkerRegistration::new(5, 3, 10))
        .await?;
    coordinator
        .register_worker(&WorkerRegistration::new(3, 5, 8))
        .await?;
    let deadline = coordinator.engine().now() + Duration::hours(48);
    let task = coordinator
        .add_task(&TaskSubmission::new(6, 3, 12, deadline, true))
        .await?;

    let allocations = coordinator.allocate(task.record.id).await?;
    for confirmed in &allocations {
        info!(allocation_id = %confirmed.record.id, tx_hash = %confirmed.tx_hash, "reporting done");
        coordinator.complete_allocation(confirmed.record.id)?;
    }

    build_report(coordinator, Vec::new()).await
}

async fn run_plan(
    coordinator: &Coordinator<InMemoryLedger>,
    input: PlanInput,
) -> anyhow::Result<Report> {
    for registration in &input.workers {
        coordinator.register_worker(registration).await?;
    }
    for submission in &input.tasks {
        coordinator.add_task(submission).await?;
    }
    info!(
        workers = input.workers.len(),
        tasks = input.tasks.len(),
        "input loaded"
    );

    let mut failures = Vec::new();
    for task in coordinator.engine().list_tasks() {
        if task.status != TaskStatus::Pending {
            continue;
        }
        if let Err(e) = coordinator.allocate(task.id).await {
            info!(task_id = %task.id, error = %e, "task left unallocated");
            failures.push(AllocationFailure::new(task.id, &e));
        }
    }

    build_report(coordinator, failures).await
}

async fn build_report(
    coordinator: &Coordinator<InMemoryLedger>,
    failures: Vec<AllocationFailure>,
) -> anyhow::Result<Report> {
    let engine = coordinator.engine();
    let summary = coordinator.transaction_summary(BlockRange::all()).await?;
    Ok(Report {
        workers: engine.list_workers(),
        tasks: engine.list_tasks(),
        allocations: engine.all_allocations(),
        failures,
        payments: engine.payment_obligations(),
        task_stats: engine.task_stats(),
        transaction_stats: summary.transaction_stats(),
        onchain_costs: summary.onchain_costs(),
    })
}
