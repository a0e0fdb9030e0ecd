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

//! The worker side of the protocol: a random walk over request/release/terminate,
//! run on its own OS thread. Only the messages workers emit and the responses they
//! consume are part of the core's contract; this is one reasonable policy
//! satisfying that contract, not the only one.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use resmgr_core::{ExternalId, Grant, InboundMessage, NUM_RESOURCE_TYPES};

const MAX_STEPS: u32 = 12;

/// Runs until the worker decides to terminate or its grant channel disconnects
/// (the launcher's `kill_all` cue). Reports itself via `slot_index` embedded in every
/// message it sends - the event loop resolved that slot when it activated this
/// worker's `external_id`, so the worker must be told which slot it occupies.
pub fn run(
    external_id: ExternalId,
    slot_index: usize,
    seed: u64,
    inbound: Sender<InboundMessage>,
    grants: Receiver<Grant>,
) {
    let mut rng = StdRng::seed_from_u64(seed ^ external_id);
    let mut held = [0u32; NUM_RESOURCE_TYPES];

    for _ in 0..MAX_STEPS {
        match pick_action(&mut rng, &held) {
            Action::Request { resource, quantity } => {
                if inbound
                    .send(InboundMessage::Request {
                        slot_index,
                        resource,
                        quantity,
                    })
                    .is_err()
                {
                    return;
                }
                match grants.recv_timeout(Duration::from_secs(30)) {
                    Ok(_grant) => held[resource] += quantity,
                    Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => return,
                }
            }
            Action::Release { resource, quantity } => {
                if inbound
                    .send(InboundMessage::Release {
                        slot_index,
                        resource,
                        quantity,
                    })
                    .is_err()
                {
                    return;
                }
                held[resource] -= quantity;
            }
            Action::Terminate => break,
        }
    }

    let _ = inbound.send(InboundMessage::Terminate { slot_index });
}

enum Action {
    Request { resource: usize, quantity: u32 },
    Release { resource: usize, quantity: u32 },
    Terminate,
}

fn pick_action(rng: &mut StdRng, held: &[u32; NUM_RESOURCE_TYPES]) -> Action {
    let holds_anything = held.iter().any(|&q| q > 0);
    let roll: f64 = rng.gen_range(0.0..1.0);

    if holds_anything && roll < 0.15 {
        let resource = held
            .iter()
            .enumerate()
            .filter(|&(_, &q)| q > 0)
            .map(|(r, _)| r)
            .nth(rng.gen_range(0..held.iter().filter(|&&q| q > 0).count()))
            .unwrap_or(0);
        let quantity = rng.gen_range(1..=held[resource]);
        Action::Release { resource, quantity }
    } else if roll < 0.9 {
        Action::Request {
            resource: rng.gen_range(0..NUM_RESOURCE_TYPES),
            quantity: rng.gen_range(1..=2),
        }
    } else {
        Action::Terminate
    }
}
