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

//! Reference harness for `resmgr-core`: a [`ThreadLauncher`] that spawns one OS
//! thread per simulated worker, and a `worker` module implementing a random-walk
//! request/release/terminate policy treated as an external collaborator. None of
//! the invariants `resmgr-core` is tested against depend on this crate's worker
//! policy.

pub mod worker;

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use resmgr_core::{Channel, ExternalId, Grant, Launcher, LogicalClock, MpscChannel, RunConfig};

/// Spawns and reaps worker threads, implementing [`Launcher`] for
/// [`resmgr_core::event_loop::EventLoop`]. Holds its own clone of the shared
/// [`MpscChannel`] so it can register each new worker's outbound `Grant` sender the
/// moment its thread is spawned, before `try_launch` ever reports the worker's
/// `external_id` back to the event loop.
pub struct ThreadLauncher {
    config: RunConfig,
    channel: MpscChannel,
    inbound_sender: Sender<resmgr_core::InboundMessage>,
    handles: Vec<(ExternalId, JoinHandle<()>)>,
    exited_tx: Sender<ExternalId>,
    exited_rx: Receiver<ExternalId>,
    rng: StdRng,
    next_external_id: ExternalId,
    total_launched: u32,
    last_launch_at: Option<Instant>,
}

impl ThreadLauncher {
    #[must_use]
    pub fn new(config: RunConfig, channel: MpscChannel) -> Self {
        let inbound_sender = channel.inbound_sender();
        let (exited_tx, exited_rx) = channel::<ExternalId>();
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            channel,
            inbound_sender,
            handles: Vec::new(),
            exited_tx,
            exited_rx,
            rng,
            next_external_id: 1,
            total_launched: 0,
            last_launch_at: None,
        }
    }

    fn pacing_elapsed(&self) -> bool {
        match self.last_launch_at {
            None => true,
            Some(at) => at.elapsed() >= Duration::from_millis(self.config.launch_interval_ms),
        }
    }
}

impl Launcher for ThreadLauncher {
    fn try_launch(&mut self, _clock: LogicalClock, slot_index: usize) -> Option<ExternalId> {
        if self.total_launched >= self.config.max_total_workers {
            return None;
        }
        if self.handles.len() as u32 >= self.config.max_concurrent_workers {
            return None;
        }
        if !self.pacing_elapsed() {
            return None;
        }

        let external_id = self.next_external_id;
        self.next_external_id += 1;

        let (grant_tx, grant_rx) = channel::<Grant>();
        self.channel.register_worker(external_id, grant_tx);

        let inbound = self.inbound_sender.clone();
        let exited = self.exited_tx.clone();
        let seed = rand::RngCore::next_u64(&mut self.rng);
        let handle = std::thread::spawn(move || {
            worker::run(external_id, slot_index, seed, inbound, grant_rx);
            let _ = exited.send(external_id);
        });

        self.handles.push((external_id, handle));
        self.total_launched += 1;
        self.last_launch_at = Some(Instant::now());
        Some(external_id)
    }

    fn reap_exited(&mut self) -> Vec<ExternalId> {
        let mut reaped = Vec::new();
        while let Ok(external_id) = self.exited_rx.try_recv() {
            if let Some(position) = self.handles.iter().position(|(id, _)| *id == external_id) {
                let (_, handle) = self.handles.remove(position);
                let _ = handle.join();
            }
            reaped.push(external_id);
        }
        reaped
    }

    fn kill_all(&mut self) {
        // Workers only ever block on a blocking receive for their grant channel;
        // dropping every registered sender unblocks them with a disconnect error,
        // which `worker::run` treats as its cue to exit. There is no signal to send
        // an OS thread directly, so this is the cooperative equivalent of killing
        // any surviving workers on exit.
        for (external_id, _) in &self.handles {
            self.channel.deregister_worker(*external_id);
        }
        for (_, handle) in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    fn quota_exhausted_and_idle(&self) -> bool {
        self.total_launched >= self.config.max_total_workers && self.handles.is_empty()
    }
}
