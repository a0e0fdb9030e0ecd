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

//! The Deadlock Engine: the multi-instance safety check and victim-at-a-time
//! recovery policy.

use crate::arbiter::{dispatch, DispatchOutcome, GrantEvent};
use crate::constants::{NUM_RESOURCE_TYPES, NUM_SLOTS};
use crate::message::InboundMessage;
use crate::process_table::SlotState;
use crate::state::MasterState;

/// What one invocation of [`DeadlockEngine::run`] did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeadlockReport {
    /// The deadlocked set D found by the first safety check, slot indices ascending.
    pub initial_deadlocked: Vec<usize>,
    /// Victims terminated, in the order they were killed.
    pub victims_terminated: Vec<usize>,
    /// The `external_id` of each victim in `victims_terminated`, same order - needed
    /// by callers to deregister the victim's channel endpoint after its slot has
    /// already been deactivated.
    pub victim_external_ids: Vec<crate::message::ExternalId>,
    /// Every grant emitted by the re-grant sweeps that victim terminations triggered.
    pub unblocked: Vec<GrantEvent>,
}

impl DeadlockReport {
    #[must_use]
    pub fn found_deadlock(&self) -> bool { !self.initial_deadlocked.is_empty() }
}

/// Stateless - every run starts fresh from the current `MasterState` snapshot, so
/// this is a zero-sized type that exists purely to namespace the algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlockEngine;

impl DeadlockEngine {
    #[must_use]
    pub fn new() -> Self { Self }

    /// Runs the safety check and, if it finds a non-empty deadlocked set, recovers by
    /// terminating victims in ascending slot-index order until the set clears.
    pub fn run(&self, state: &mut MasterState) -> DeadlockReport {
        let initial_deadlocked = Self::safety_check(state);
        state.stats.record_deadlock_run(initial_deadlocked.len());

        let mut report = DeadlockReport {
            initial_deadlocked: initial_deadlocked.clone(),
            victims_terminated: Vec::new(),
            victim_external_ids: Vec::new(),
            unblocked: Vec::new(),
        };
        if initial_deadlocked.is_empty() {
            return report;
        }

        let mut residual = initial_deadlocked;
        for victim in report.initial_deadlocked.clone() {
            if !residual.contains(&victim) {
                // An earlier victim's termination already cleared this one.
                continue;
            }
            if let DispatchOutcome::Terminated {
                external_id,
                unblocked,
                ..
            } = dispatch(state, InboundMessage::Terminate { slot_index: victim })
            {
                report.victim_external_ids.push(external_id);
                report.unblocked.extend(unblocked);
            }
            report.victims_terminated.push(victim);
            state.stats.record_deadlock_termination();

            residual = Self::safety_check(state);
            if residual.is_empty() {
                break;
            }
        }
        report
    }

    /// The multi-instance safety-check algorithm, read against the current
    /// ledger/table snapshot without mutating either.
    fn safety_check(state: &MasterState) -> Vec<usize> {
        let mut work = *state.ledger.availables();
        let mut finish = [false; NUM_SLOTS];
        for (i, slot) in state.table.slots().iter().enumerate() {
            finish[i] = matches!(slot.state, SlotState::Unused | SlotState::Terminated);
        }

        loop {
            let Some(i) = (0..NUM_SLOTS).find(|&i| {
                !finish[i] && {
                    let request = request_vector(state, i);
                    (0..NUM_RESOURCE_TYPES).all(|r| request[r] <= work[r])
                }
            }) else {
                break;
            };
            let allocated = state.table.slot(i).allocated;
            for r in 0..NUM_RESOURCE_TYPES {
                work[r] += allocated[r];
            }
            finish[i] = true;
        }

        (0..NUM_SLOTS).filter(|&i| !finish[i]).collect()
    }
}

fn request_vector(state: &MasterState, slot_index: usize) -> [u32; NUM_RESOURCE_TYPES] {
    let mut request = [0u32; NUM_RESOURCE_TYPES];
    if let Some((resource, quantity)) = state.table.slot(slot_index).requested {
        request[resource] = quantity;
    }
    request
}
