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

//! Run configuration, recognized by the surrounding launcher and read by the core at
//! startup: plain data the `launcher` binary populates from CLI flags (via `clap`)
//! and hands to [`crate::event_loop::EventLoop`].

use std::path::PathBuf;
use std::time::Duration;

/// Parameters fixed for the lifetime of one run. Cloned freely; owned exclusively by
/// the event loop once a run starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Total lifetime worker count the launcher will ever create.
    pub max_total_workers: u32,
    /// Maximum number of workers active at once; must fit within `NUM_SLOTS`.
    pub max_concurrent_workers: u32,
    /// Minimum pacing, in milliseconds, between new worker activations.
    pub launch_interval_ms: u64,
    /// Filesystem path for the event log.
    pub log_path: PathBuf,
    /// When false, per-request log entries (grants, blocks) are suppressed;
    /// terminations, snapshots, and deadlock events are always logged.
    pub verbose: bool,
    /// Wall-clock ceiling on the run, independent of the logical clock. The event
    /// loop's termination condition triggers if this elapses.
    pub wall_clock_budget: Duration,
    /// Explicit PRNG seed for deterministic replay. `None` falls back to OS entropy.
    pub rng_seed: Option<u64>,
}

impl RunConfig {
    #[must_use]
    pub fn wall_clock_budget_default() -> Duration { Duration::from_secs(5) }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_total_workers: 20,
            max_concurrent_workers: crate::constants::NUM_SLOTS as u32,
            launch_interval_ms: 50,
            log_path: PathBuf::from("resmgr.log"),
            verbose: false,
            wall_clock_budget: Self::wall_clock_budget_default(),
            rng_seed: None,
        }
    }
}
