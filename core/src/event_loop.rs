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

//! The single-threaded, cooperative Event Loop. Ties the clock, process table,
//! ledger, arbiter, and deadlock engine together behind the [`Channel`] and
//! [`Launcher`] hook traits.
//!
//! Wiring note: the concrete [`Channel`] and [`Launcher`] passed to [`EventLoop::new`]
//! are expected to already agree on how a newly launched worker's outbound grant
//! sender gets registered - `core` only requires that by the time
//! [`Launcher::try_launch`] returns an `external_id`, [`Channel::send_grant`] for that
//! id will succeed. The reference `launcher` crate achieves this by handing each
//! spawned worker thread's `Sender<Grant>` to the shared channel at spawn time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::arbiter::{dispatch, DispatchOutcome, GrantEvent};
use crate::channel::Channel;
use crate::config::RunConfig;
use crate::deadlock::DeadlockEngine;
use crate::launcher_hook::Launcher;
use crate::snapshot::Snapshot;
use crate::state::MasterState;
use crate::stats::Stats;

/// Drives one run to completion. Generic over the channel transport and launcher
/// implementation so the core never depends on a concrete IPC mechanism.
pub struct EventLoop<C: Channel, L: Launcher> {
    state: MasterState,
    channel: C,
    launcher: L,
    config: RunConfig,
    rng: StdRng,
    last_deadlock_check: crate::clock::LogicalClock,
    last_snapshot: crate::clock::LogicalClock,
    shutdown_requested: Arc<AtomicBool>,
}

impl<C: Channel, L: Launcher> EventLoop<C, L> {
    #[must_use]
    pub fn new(config: RunConfig, channel: C, launcher: L) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: MasterState::new(),
            channel,
            launcher,
            config,
            rng,
            last_deadlock_check: crate::clock::LogicalClock::new(),
            last_snapshot: crate::clock::LogicalClock::new(),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn state(&self) -> &MasterState { &self.state }

    /// A shared flag the caller can set (e.g. from a `ctrlc` handler) to request an
    /// orderly shutdown. Checked once per iteration alongside the other termination
    /// conditions; a signal is treated as just another reason to leave the loop, not
    /// a separate exit path.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> { Arc::clone(&self.shutdown_requested) }

    /// Runs the event loop to completion and returns the final [`Stats`]. Exits when
    /// either the launcher reports its quota exhausted with no workers left, or the
    /// configured wall-clock budget elapses, or the shutdown handle is set.
    pub fn run(&mut self) -> Stats {
        let started_at = Instant::now();

        loop {
            let previous_clock = self.state.clock;
            self.state.clock.tick(&mut self.rng);
            self.drive_one_cycle();

            debug_assert!(self.state.clock >= previous_clock, "clock must never regress");

            if self.launcher.quota_exhausted_and_idle()
                || started_at.elapsed() >= self.config.wall_clock_budget
                || self.shutdown_requested.load(Ordering::Relaxed)
            {
                break;
            }
        }

        self.launcher.kill_all();
        self.log_final_stats();
        self.state.stats
    }

    /// The launch/reap/dispatch/snapshot/deadlock steps run once per iteration, after
    /// the clock has already advanced. Split out from `run` so tests can drive it off
    /// a clock advanced deterministically instead of through the jitter RNG.
    fn drive_one_cycle(&mut self) {
        self.launch_step();
        self.reap_step();
        self.dispatch_step();

        if self.state.clock.crossed_half_second(&self.last_snapshot) {
            self.last_snapshot = self.state.clock;
            self.snapshot_step();
        }
        if self.state.clock.crossed_integer_second(&self.last_deadlock_check) {
            self.last_deadlock_check = self.state.clock;
            self.deadlock_step();
        }
    }

    fn launch_step(&mut self) {
        let Some(index) = self.state.table.find_unused() else {
            return;
        };
        let Some(external_id) = self.launcher.try_launch(self.state.clock, index) else {
            return;
        };
        self.state.table.activate(index, external_id, self.state.clock.now());
        info!(slot = index, external_id, "worker activated");
    }

    fn reap_step(&mut self) {
        for external_id in self.launcher.reap_exited() {
            let Some(slot_index) = self.state.table.find_by_external_id(external_id) else {
                continue;
            };
            self.terminate_slot(slot_index);
        }
    }

    fn dispatch_step(&mut self) {
        let Some(message) = self.channel.poll_inbound() else {
            return;
        };
        let slot_index = message.slot_index();
        let outcome = dispatch(&mut self.state, message);
        self.handle_outcome(slot_index, outcome);
    }

    fn handle_outcome(&mut self, slot_index: usize, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::GrantedImmediate(event) => {
                self.emit_grant(&event);
            }
            DispatchOutcome::Blocked {
                resource, quantity, ..
            } => {
                debug!(slot = slot_index, resource, quantity, "request blocked");
            }
            DispatchOutcome::Released { unblocked, .. } => {
                for event in &unblocked {
                    self.emit_grant(event);
                }
            }
            DispatchOutcome::Terminated {
                external_id,
                unblocked,
                ..
            } => {
                self.channel.deregister_worker(external_id);
                self.state.stats.record_normal_termination();
                for event in &unblocked {
                    self.emit_grant(event);
                }
            }
            DispatchOutcome::AlreadyTerminated { .. } => {}
            DispatchOutcome::Violation(violation) => {
                warn!(slot = slot_index, %violation, "protocol violation");
            }
        }
    }

    /// Invoked for a worker the launcher reports as exited. Idempotent, a no-op if
    /// the slot is already `Unused`.
    fn terminate_slot(&mut self, slot_index: usize) {
        let outcome = dispatch(
            &mut self.state,
            crate::message::InboundMessage::Terminate { slot_index },
        );
        if let DispatchOutcome::Terminated {
            external_id,
            unblocked,
            ..
        } = outcome
        {
            self.channel.deregister_worker(external_id);
            self.state.stats.record_normal_termination();
            for event in &unblocked {
                self.emit_grant(event);
            }
        }
    }

    fn emit_grant(&mut self, event: &GrantEvent) {
        if let Err(error) = self.channel.send_grant(event.grant()) {
            warn!(slot = event.slot_index, %error, "grant send failed; not rolled back");
        }
        info!(
            slot = event.slot_index,
            resource = event.resource,
            quantity = event.quantity,
            waited = event.waited,
            "grant"
        );
    }

    fn snapshot_step(&self) {
        let snapshot = Snapshot::capture(&self.state);
        info!("{}", snapshot);
    }

    fn deadlock_step(&mut self) {
        let report = DeadlockEngine::new().run(&mut self.state);
        if !report.found_deadlock() {
            return;
        }
        info!(deadlocked = ?report.initial_deadlocked, "deadlock detected");
        for (&victim, &external_id) in report.victims_terminated.iter().zip(report.victim_external_ids.iter()) {
            info!(slot = victim, "deadlock victim terminated");
            self.channel.deregister_worker(external_id);
        }
        for event in &report.unblocked {
            self.emit_grant(event);
        }
    }

    fn log_final_stats(&self) {
        let stats = &self.state.stats;
        info!(
            grants_immediate = stats.grants_immediate,
            grants_after_wait = stats.grants_after_wait,
            terminations_normal = stats.terminations_normal,
            terminations_deadlock = stats.terminations_deadlock,
            deadlock_runs = stats.deadlock_runs,
            "final statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::message::{ExternalId, Grant, InboundMessage};

    /// A channel with nothing ever queued; exercises only the loop's own control flow.
    struct EmptyChannel;
    impl Channel for EmptyChannel {
        fn poll_inbound(&mut self) -> Option<InboundMessage> { None }
        fn register_worker(&mut self, _external_id: ExternalId, _sender: std::sync::mpsc::Sender<Grant>) {}
        fn deregister_worker(&mut self, _external_id: ExternalId) {}
        fn send_grant(&mut self, _grant: Grant) -> Result<(), crate::channel::GrantSendError> { Ok(()) }
    }

    /// A launcher that never launches and is never idle, so only an explicit shutdown
    /// signal or the wall-clock budget can end the loop.
    struct NeverIdleLauncher;
    impl Launcher for NeverIdleLauncher {
        fn try_launch(&mut self, _clock: crate::clock::LogicalClock, _slot_index: usize) -> Option<ExternalId> {
            None
        }
        fn reap_exited(&mut self) -> Vec<ExternalId> { Vec::new() }
        fn kill_all(&mut self) {}
        fn quota_exhausted_and_idle(&self) -> bool { false }
    }

    #[test]
    fn shutdown_handle_stops_the_loop_before_the_wall_clock_budget() {
        let mut config = RunConfig {
            wall_clock_budget: std::time::Duration::from_secs(30),
            ..RunConfig::default()
        };
        config.rng_seed = Some(1);
        let mut event_loop = EventLoop::new(config, EmptyChannel, NeverIdleLauncher);
        let shutdown = event_loop.shutdown_handle();
        shutdown.store(true, Ordering::Relaxed);

        let started = Instant::now();
        event_loop.run();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    /// A channel whose inbound queue and outbound sends are both scriptable, so a test
    /// can feed `dispatch_step`/`deadlock_step` a message and then inspect exactly
    /// what was granted, registered, or deregistered - the same shape as
    /// `MpscChannel`, minus the actual threads.
    #[derive(Default)]
    struct ScriptedChannel {
        inbound: VecDeque<InboundMessage>,
        sent_grants: Vec<Grant>,
        deregistered: Vec<ExternalId>,
    }
    impl Channel for ScriptedChannel {
        fn poll_inbound(&mut self) -> Option<InboundMessage> { self.inbound.pop_front() }
        fn register_worker(&mut self, _external_id: ExternalId, _sender: std::sync::mpsc::Sender<Grant>) {}
        fn deregister_worker(&mut self, external_id: ExternalId) { self.deregistered.push(external_id); }
        fn send_grant(&mut self, grant: Grant) -> Result<(), crate::channel::GrantSendError> {
            self.sent_grants.push(grant);
            Ok(())
        }
    }

    /// A launcher whose `reap_exited` queue is scriptable; never launches anything,
    /// which is all these tests need of it.
    #[derive(Default)]
    struct ScriptedLauncher {
        reap_queue: VecDeque<ExternalId>,
    }
    impl Launcher for ScriptedLauncher {
        fn try_launch(&mut self, _clock: crate::clock::LogicalClock, _slot_index: usize) -> Option<ExternalId> {
            None
        }
        fn reap_exited(&mut self) -> Vec<ExternalId> { self.reap_queue.drain(..).collect() }
        fn kill_all(&mut self) {}
        fn quota_exhausted_and_idle(&self) -> bool { false }
    }

    fn test_event_loop(
        config_seed: u64,
        channel: ScriptedChannel,
        launcher: ScriptedLauncher,
    ) -> EventLoop<ScriptedChannel, ScriptedLauncher> {
        let config = RunConfig {
            rng_seed: Some(config_seed),
            ..RunConfig::default()
        };
        EventLoop::new(config, channel, launcher)
    }

    #[test]
    fn dispatch_step_routes_a_request_through_the_arbiter_and_emits_the_grant() {
        let mut channel = ScriptedChannel::default();
        channel.inbound.push_back(InboundMessage::Request {
            slot_index: 0,
            resource: 0,
            quantity: 1,
        });
        let mut event_loop = test_event_loop(1, channel, ScriptedLauncher::default());
        event_loop.state.table.activate(0, 42, (0, 0));

        event_loop.dispatch_step();

        assert_eq!(event_loop.state.table.slot(0).allocated[0], 1);
        assert_eq!(
            event_loop.channel.sent_grants,
            vec![Grant {
                external_id: 42,
                slot_index: 0
            }]
        );
    }

    #[test]
    fn dispatch_step_unblocks_a_waiter_and_emits_its_grant_on_release() {
        let mut event_loop = test_event_loop(2, ScriptedChannel::default(), ScriptedLauncher::default());
        event_loop.state.table.activate(0, 1, (0, 0));
        event_loop.state.table.activate(1, 2, (0, 0));
        for _ in 0..crate::constants::RESOURCE_INSTANCES {
            dispatch(
                &mut event_loop.state,
                InboundMessage::Request {
                    slot_index: 0,
                    resource: 0,
                    quantity: 1,
                },
            );
        }
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 1,
                resource: 0,
                quantity: 1,
            },
        );
        event_loop.channel.inbound.push_back(InboundMessage::Release {
            slot_index: 0,
            resource: 0,
            quantity: 1,
        });

        event_loop.dispatch_step();

        assert_eq!(
            event_loop.channel.sent_grants,
            vec![Grant {
                external_id: 2,
                slot_index: 1
            }]
        );
    }

    #[test]
    fn reap_step_is_a_no_op_for_a_slot_already_returned_to_unused() {
        let mut event_loop = test_event_loop(3, ScriptedChannel::default(), ScriptedLauncher::default());
        event_loop.state.table.activate(0, 7, (0, 0));

        // The worker already sent its own Terminate (handled on an earlier
        // iteration's dispatch_step), so the slot is already Unused by the time the
        // launcher separately reports external_id 7 as exited.
        dispatch(&mut event_loop.state, InboundMessage::Terminate { slot_index: 0 });
        assert!(event_loop.state.table.slot(0).is_unused());
        let stats_before = event_loop.state.stats;

        event_loop.launcher.reap_queue.push_back(7);
        event_loop.reap_step();

        assert_eq!(event_loop.state.stats, stats_before);
        assert!(event_loop.channel.deregistered.is_empty());
    }

    #[test]
    fn reap_step_terminates_the_matching_slot_for_a_freshly_exited_worker() {
        let mut event_loop = test_event_loop(4, ScriptedChannel::default(), ScriptedLauncher::default());
        event_loop.state.table.activate(0, 9, (0, 0));
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 0,
                resource: 0,
                quantity: 2,
            },
        );

        event_loop.launcher.reap_queue.push_back(9);
        event_loop.reap_step();

        assert!(event_loop.state.table.slot(0).is_unused());
        assert_eq!(event_loop.state.ledger.available(0), crate::constants::RESOURCE_INSTANCES);
        assert_eq!(event_loop.state.stats.terminations_normal, 1);
        assert_eq!(event_loop.channel.deregistered, vec![9]);
    }

    #[test]
    fn deadlock_step_terminates_the_lowest_index_victim_and_emits_grants_for_the_rest_of_the_cycle() {
        let mut event_loop = test_event_loop(5, ScriptedChannel::default(), ScriptedLauncher::default());
        event_loop.state.table.activate(0, 10, (0, 0));
        event_loop.state.table.activate(1, 20, (0, 0));
        event_loop.state.table.activate(2, 30, (0, 0));

        // Slot 0 holds all of r0, slot 1 holds all of r1. Slot 0 blocks wanting r1
        // (closing the 0/1 cycle); slots 1 and 2 both block wanting r0.
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 0,
                resource: 0,
                quantity: crate::constants::RESOURCE_INSTANCES,
            },
        );
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 1,
                resource: 1,
                quantity: crate::constants::RESOURCE_INSTANCES,
            },
        );
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 0,
                resource: 1,
                quantity: 1,
            },
        );
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 1,
                resource: 0,
                quantity: 1,
            },
        );
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 2,
                resource: 0,
                quantity: 1,
            },
        );

        event_loop.deadlock_step();

        // Only slot 0 is ever terminated; slots 1 and 2 are freed by the re-grant
        // sweep its termination triggers, not by being killed themselves.
        assert_eq!(event_loop.state.stats.terminations_deadlock, 1);
        assert!(event_loop.state.table.slot(0).is_unused());
        assert_eq!(event_loop.channel.deregistered, vec![10]);
        assert_eq!(
            event_loop.channel.sent_grants,
            vec![
                Grant {
                    external_id: 20,
                    slot_index: 1
                },
                Grant {
                    external_id: 30,
                    slot_index: 2
                },
            ]
        );
    }

    #[test]
    fn deadlock_step_is_a_no_op_when_nothing_is_deadlocked() {
        let mut event_loop = test_event_loop(6, ScriptedChannel::default(), ScriptedLauncher::default());
        event_loop.state.table.activate(0, 1, (0, 0));
        dispatch(
            &mut event_loop.state,
            InboundMessage::Request {
                slot_index: 0,
                resource: 0,
                quantity: 1,
            },
        );

        event_loop.deadlock_step();

        assert_eq!(event_loop.state.stats.deadlock_runs, 1);
        assert_eq!(event_loop.state.stats.terminations_deadlock, 0);
        assert!(event_loop.channel.sent_grants.is_empty());
        assert!(event_loop.channel.deregistered.is_empty());
    }

    #[test]
    fn drive_one_cycle_snapshots_and_checks_deadlock_only_on_their_own_boundaries() {
        let mut event_loop = test_event_loop(7, ScriptedChannel::default(), ScriptedLauncher::default());

        // Under half a second: neither boundary has been crossed yet.
        event_loop.state.clock.advance(400_000_000);
        event_loop.drive_one_cycle();
        assert_eq!(event_loop.last_snapshot.now(), (0, 0));
        assert_eq!(event_loop.last_deadlock_check.now(), (0, 0));
        assert_eq!(event_loop.state.stats.deadlock_runs, 0);

        // Crosses the half-second boundary but stays within the first simulated
        // second: the snapshot cadence fires independently of the deadlock cadence.
        event_loop.state.clock.advance(200_000_000);
        event_loop.drive_one_cycle();
        assert_eq!(event_loop.last_snapshot.now(), (0, 600_000_000));
        assert_eq!(event_loop.last_deadlock_check.now(), (0, 0));
        assert_eq!(event_loop.state.stats.deadlock_runs, 0);

        // Crosses the one-second boundary: the deadlock engine runs exactly once.
        event_loop.state.clock.advance(500_000_000);
        event_loop.drive_one_cycle();
        assert_eq!(event_loop.last_snapshot.now(), (1, 100_000_000));
        assert_eq!(event_loop.last_deadlock_check.now(), (1, 100_000_000));
        assert_eq!(event_loop.state.stats.deadlock_runs, 1);

        // A further tick that crosses neither boundary again must not double up
        // (running the deadlock check twice within one simulated second is the one
        // thing the clock-granularity design note rules out).
        event_loop.state.clock.advance(100_000);
        event_loop.drive_one_cycle();
        assert_eq!(event_loop.last_deadlock_check.now(), (1, 100_000_000));
        assert_eq!(event_loop.state.stats.deadlock_runs, 1);
    }
}
