//! CloudVista Simulation Engine CLI
//!
//! Runs one workload through one or more scheduling policies and prints a
//! comparison table.
//!
//! ```bash
//! # Compare all three policies on 20 synthetic tasks
//! cloudvista-sim --tasks 20 --seed 7
//!
//! # Replay a JSON scenario with round-robin, writing a report
//! cloudvista-sim --scenario demo.json --policies roundrobin --output-dir reports
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use cloudvista_core::{ReportSink, SchedulerKind, VmSpec};
use cloudvista_simulation_engine::{
    config::DEFAULT_QUANTUM_SECONDS,
    host::SimulationHost,
    report::{JsonFileSink, SimulationReport},
    workload::WorkloadGenerator,
    RunOutcome, ScenarioConfig, Simulation, SimulationConfig, Statistics, TaskRequest,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cloudvista-sim")]
#[command(about = "Simulate FCFS, priority and round-robin scheduling on a VM pool", long_about = None)]
struct Args {
    /// JSON scenario file (VMs, rates, scheduler, tasks); overrides the flags below
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Policies to run (comma-separated: fcfs,priority,roundrobin)
    #[arg(short, long)]
    policies: Option<String>,

    /// Round-robin time quantum (simulated seconds)
    #[arg(short, long, default_value_t = DEFAULT_QUANTUM_SECONDS)]
    quantum: f64,

    /// Number of VMs
    #[arg(long, default_value_t = 3)]
    vms: u32,

    /// Cores per VM
    #[arg(long, default_value_t = 4)]
    cores: u32,

    /// RAM per VM (GB)
    #[arg(long, default_value_t = 8)]
    ram: u32,

    /// Storage per VM (GB)
    #[arg(long, default_value_t = 100)]
    storage: u32,

    /// Number of synthetic tasks to generate
    #[arg(short, long, default_value_t = 10)]
    tasks: usize,

    /// Seed for the synthetic workload
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Mean task execution time (simulated seconds)
    #[arg(long, default_value_t = 10.0)]
    mean_time: f64,

    /// Standard deviation of task execution time
    #[arg(long, default_value_t = 4.0)]
    std_dev_time: f64,

    /// Price per core-hour
    #[arg(long, default_value_t = 1.0)]
    cpu_cost: f64,

    /// Price per GB-hour of RAM
    #[arg(long, default_value_t = 0.5)]
    ram_cost: f64,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = 0.1)]
    tick: f64,

    /// Give up after this many ticks (tasks that never fit are retried forever)
    #[arg(long, default_value_t = 1_000_000)]
    max_ticks: u64,

    /// Wall-clock milliseconds between ticks (0 = as fast as possible)
    #[arg(long, default_value_t = 0)]
    pace_ms: u64,

    /// Directory for JSON reports (optional)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

/// Everything needed to replay the same workload under several policies
struct Plan {
    vms: VmSpec,
    engine: SimulationConfig,
    quantum: f64,
    policies: Vec<SchedulerKind>,
    tasks: Vec<TaskRequest>,
}

impl Plan {
    fn from_args(args: &Args) -> anyhow::Result<Self> {
        let explicit_policies = args
            .policies
            .as_deref()
            .map(parse_policies)
            .transpose()?;

        if let Some(path) = &args.scenario {
            let scenario = ScenarioConfig::load(path)
                .with_context(|| format!("Failed to load scenario {}", path.display()))?;
            return Ok(Plan {
                vms: scenario.vms,
                engine: scenario.engine,
                quantum: scenario.effective_quantum().unwrap_or(args.quantum),
                policies: explicit_policies.unwrap_or_else(|| vec![scenario.scheduler]),
                tasks: scenario.tasks,
            });
        }

        let mut generator = WorkloadGenerator::new(
            args.seed,
            args.cores,
            args.ram,
            args.mean_time,
            args.std_dev_time,
        )?;

        Ok(Plan {
            vms: VmSpec::new(args.vms, args.cores, args.ram, args.storage),
            engine: SimulationConfig::default()
                .with_tick_duration(args.tick)
                .with_rates(args.cpu_cost, args.ram_cost),
            quantum: args.quantum,
            policies: explicit_policies.unwrap_or_else(|| SchedulerKind::ALL.to_vec()),
            tasks: generator.generate(args.tasks),
        })
    }
}

fn parse_policies(list: &str) -> anyhow::Result<Vec<SchedulerKind>> {
    let policies = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<SchedulerKind>())
        .collect::<Result<Vec<_>, _>>()?;
    if policies.is_empty() {
        bail!("--policies must name at least one policy");
    }
    Ok(policies)
}

struct PolicyRun {
    policy: SchedulerKind,
    outcome: RunOutcome,
    stats: Statistics,
    report: Option<SimulationReport>,
}

async fn run_policy(plan: &Plan, policy: SchedulerKind, args: &Args) -> anyhow::Result<PolicyRun> {
    let mut sim = Simulation::new(plan.engine)?;
    sim.initialize_vms(plan.vms)?;
    for request in &plan.tasks {
        sim.submit_task(request.clone())?;
    }

    let quantum = policy.is_preemptive().then_some(plan.quantum);

    if args.pace_ms == 0 {
        sim.start(policy, quantum)?;
        let outcome = sim.run(args.max_ticks)?;
        return Ok(summarize(&sim, policy, outcome));
    }

    let host = SimulationHost::with_pace(sim, Duration::from_millis(args.pace_ms))
        .with_max_ticks(args.max_ticks);
    let handle = host.start(policy, quantum).await?;
    let outcome = handle.await.context("Tick loop panicked")??;
    Ok(host.with_simulation(|sim| summarize(sim, policy, outcome)).await)
}

fn summarize(sim: &Simulation, policy: SchedulerKind, outcome: RunOutcome) -> PolicyRun {
    if !outcome.is_completed() {
        warn!(
            policy = %policy,
            ticks = outcome.ticks,
            "Tick limit reached before all tasks completed"
        );
    }

    let report = match SimulationReport::from_simulation(sim) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(policy = %policy, error = %e, "No report for this run");
            None
        }
    };

    PolicyRun {
        policy,
        outcome,
        stats: sim.statistics(),
        report,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudvista_simulation_engine=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let plan = Plan::from_args(&args)?;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  CloudVista Simulation Engine                            ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    println!(
        "  VMs: {} x ({} cores, {}GB RAM, {}GB storage)",
        plan.vms.count, plan.vms.cores, plan.vms.ram, plan.vms.storage
    );
    println!("  Tasks: {}", plan.tasks.len());
    println!("  Tick: {}s", plan.engine.tick_duration);
    println!(
        "  Rates: {:.2}/core-hr, {:.2}/GB-hr",
        plan.engine.rates.cpu_hourly, plan.engine.rates.ram_hourly
    );
    println!("  Round-robin quantum: {}s\n", plan.quantum);

    let mut runs = Vec::new();
    for &policy in &plan.policies {
        info!(policy = %policy, "Running simulation");
        runs.push(run_policy(&plan, policy, &args).await?);
    }

    println!(
        "{:<12} {:>10} {:>10} {:>12} {:>12} {:>10} {:>10} {:>10}",
        "Policy", "Completed", "Sim Time", "Avg Wait", "Avg Turn", "Total", "Per Task", "Status"
    );
    println!("{}", "-".repeat(94));
    for run in &runs {
        println!(
            "{:<12} {:>7}/{:<2} {:>9.1}s {:>11.2}s {:>11.2}s {:>10.4} {:>10.4} {:>10}",
            run.policy.to_string(),
            run.stats.completed_tasks,
            run.stats.total_tasks,
            run.outcome.time,
            run.stats.avg_wait_time,
            run.stats.avg_turnaround_time,
            run.stats.total_cost,
            run.stats.avg_cost_per_task,
            format!("{:?}", run.outcome.status),
        );
    }

    if let Some(dir) = &args.output_dir {
        let sink = JsonFileSink::new(dir);
        println!("\nWriting reports to {} ({})...", dir.display(), sink.name());
        for run in &runs {
            if let Some(report) = &run.report {
                let location = sink
                    .save(report)
                    .await
                    .with_context(|| format!("Failed to save {} report", run.policy))?;
                println!("  {:<12} {}", run.policy.to_string(), location);
            }
        }
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}
