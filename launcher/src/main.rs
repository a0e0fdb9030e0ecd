/*
 *   Copyright (c) 2022 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! CLI entry point for the reference resource-manager simulation. Parses run
//! parameters, wires up the event log and the in-process channel/launcher, and runs
//! the master event loop to completion. CLI parsing and help text are deliberately
//! out of the core's scope; this binary is where that external surface lives.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use resmgr_core::{EventLog, EventLoop, MpscChannel, RunConfig};
use resmgr_launcher::ThreadLauncher;

/// Simulates a master/worker resource-allocation run with deadlock detection and
/// recovery.
#[derive(Parser, Debug)]
#[command(name = "resmgr", version, about)]
struct Cli {
    /// Total number of workers to launch over the lifetime of the run.
    #[arg(long, default_value_t = 20)]
    max_total_workers: u32,

    /// Maximum number of workers active at once (capped at the process table size).
    #[arg(long, default_value_t = 10)]
    max_concurrent_workers: u32,

    /// Minimum pacing, in milliseconds, between new worker activations.
    #[arg(long, default_value_t = 50)]
    launch_interval_ms: u64,

    /// Path to the event log file.
    #[arg(long, default_value = "resmgr.log")]
    log_path: PathBuf,

    /// Log every grant and block, not only terminations/snapshots/deadlock events.
    #[arg(long)]
    verbose: bool,

    /// Wall-clock budget for the run, in seconds.
    #[arg(long, default_value_t = 5)]
    wall_clock_budget_secs: u64,

    /// Explicit PRNG seed, for deterministic replay. Omit for OS entropy.
    #[arg(long)]
    rng_seed: Option<u64>,
}

impl From<Cli> for RunConfig {
    fn from(cli: Cli) -> Self {
        Self {
            max_total_workers: cli.max_total_workers,
            max_concurrent_workers: cli.max_concurrent_workers,
            launch_interval_ms: cli.launch_interval_ms,
            log_path: cli.log_path,
            verbose: cli.verbose,
            wall_clock_budget: Duration::from_secs(cli.wall_clock_budget_secs),
            rng_seed: cli.rng_seed,
        }
    }
}

fn main() -> miette::Result<()> {
    let config: RunConfig = Cli::parse().into();

    let log = EventLog::open(&config.log_path)?;
    resmgr_core::logging::init(log.clone(), config.verbose);

    let channel = MpscChannel::new();
    let launcher = ThreadLauncher::new(config.clone(), channel.clone());
    let mut event_loop = EventLoop::new(config, channel, launcher);

    // A signal (interrupt/terminate) should trigger the same orderly shutdown as a
    // normal quota-exhausted exit, not a separate code path.
    let shutdown = event_loop.shutdown_handle();
    ctrlc::set_handler(move || shutdown.store(true, std::sync::atomic::Ordering::Relaxed))
        .map_err(|source| resmgr_core::SetupError::ChannelInit {
            reason: format!("failed to install signal handler: {source}"),
        })?;

    let stats = event_loop.run();
    println!(
        "grants_immediate={} grants_after_wait={} terminations_normal={} terminations_deadlock={} deadlock_runs={}",
        stats.grants_immediate,
        stats.grants_after_wait,
        stats.terminations_normal,
        stats.terminations_deadlock,
        stats.deadlock_runs,
    );
    println!("log lines written: {}", log.lines_written());

    Ok(())
}
