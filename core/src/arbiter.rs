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

//! The Request Arbiter. `dispatch` is a pure reducer, in the style of an
//! `AsyncReducer`: it takes `&mut MasterState` and an [`InboundMessage`] and returns a
//! [`DispatchOutcome`] describing exactly what changed, with no I/O of its own. The
//! event loop is responsible for turning that outcome into channel sends and log
//! lines.

use crate::constants::{NUM_RESOURCE_TYPES, RESOURCE_INSTANCES};
use crate::error::ProtocolViolation;
use crate::message::{ExternalId, Grant, InboundMessage, ResourceId};
use crate::process_table::SlotState;
use crate::state::MasterState;

/// One grant produced by `dispatch`, either the synchronous grant of a fresh request
/// or one entry in a re-grant sweep triggered by a release/terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantEvent {
    pub slot_index: usize,
    pub external_id: ExternalId,
    pub resource: ResourceId,
    pub quantity: u32,
    /// Whether this grant satisfied a request that had previously blocked, as opposed
    /// to being granted the instant it arrived.
    pub waited: bool,
}

impl GrantEvent {
    #[must_use]
    pub fn grant(&self) -> Grant {
        Grant {
            external_id: self.external_id,
            slot_index: self.slot_index,
        }
    }
}

/// Everything that can result from handling one [`InboundMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A `Request` was satisfied the instant it arrived.
    GrantedImmediate(GrantEvent),
    /// A `Request` could not be satisfied and the slot is now `Blocked`.
    Blocked {
        slot_index: usize,
        resource: ResourceId,
        quantity: u32,
        block_order: u64,
    },
    /// A `Release` was applied; zero or more previously blocked waiters were unblocked
    /// by the re-grant sweep it triggered, in the order they were granted.
    Released {
        slot_index: usize,
        resource: ResourceId,
        quantity: u32,
        unblocked: Vec<GrantEvent>,
    },
    /// A `Terminate` was applied; `released` lists the resources returned to the
    /// ledger and `unblocked` lists waiters the resulting sweep(s) granted.
    Terminated {
        slot_index: usize,
        external_id: ExternalId,
        released: [u32; NUM_RESOURCE_TYPES],
        unblocked: Vec<GrantEvent>,
    },
    /// `Terminate` on a slot that was already `Unused` — deactivation is idempotent,
    /// so this is a no-op, carried through so the caller can still log it.
    AlreadyTerminated { slot_index: usize },
    /// The message was rejected without mutating any state.
    Violation(ProtocolViolation),
}

/// Consumes one [`InboundMessage`] against `state`, mutating it according to the
/// request/release/terminate protocol, and returns a description of what happened.
pub fn dispatch(state: &mut MasterState, message: InboundMessage) -> DispatchOutcome {
    match message {
        InboundMessage::Request {
            slot_index,
            resource,
            quantity,
        } => handle_request(state, slot_index, resource, quantity),
        InboundMessage::Release {
            slot_index,
            resource,
            quantity,
        } => handle_release(state, slot_index, resource, quantity),
        InboundMessage::Terminate { slot_index } => handle_terminate(state, slot_index),
    }
}

fn handle_request(
    state: &mut MasterState,
    slot_index: usize,
    resource: ResourceId,
    quantity: u32,
) -> DispatchOutcome {
    if quantity == 0 {
        return DispatchOutcome::Violation(ProtocolViolation::NonPositiveQuantity(slot_index));
    }
    let slot = state.table.slot(slot_index);
    match slot.state {
        SlotState::Ready => {}
        SlotState::Blocked => {
            return DispatchOutcome::Violation(ProtocolViolation::MultipleOutstandingRequests(slot_index));
        }
        SlotState::Unused | SlotState::Terminated => {
            return DispatchOutcome::Violation(ProtocolViolation::RequesterNotReady(slot_index));
        }
    }
    if quantity > RESOURCE_INSTANCES - slot.allocated[resource] {
        return DispatchOutcome::Violation(ProtocolViolation::QuantityExceedsTotal(
            slot_index, resource,
        ));
    }

    if state.ledger.can_satisfy(resource, quantity) {
        state.ledger.grant(resource, quantity);
        let slot = state.table.slot_mut(slot_index);
        slot.allocated[resource] += quantity;
        state.stats.record_grant(false);
        DispatchOutcome::GrantedImmediate(GrantEvent {
            slot_index,
            external_id: slot.external_id,
            resource,
            quantity,
            waited: false,
        })
    } else {
        let block_order = state.next_block_order();
        let slot = state.table.slot_mut(slot_index);
        slot.state = SlotState::Blocked;
        slot.requested = Some((resource, quantity));
        slot.block_order = Some(block_order);
        DispatchOutcome::Blocked {
            slot_index,
            resource,
            quantity,
            block_order,
        }
    }
}

fn handle_release(
    state: &mut MasterState,
    slot_index: usize,
    resource: ResourceId,
    quantity: u32,
) -> DispatchOutcome {
    if quantity == 0 {
        return DispatchOutcome::Violation(ProtocolViolation::NonPositiveQuantity(slot_index));
    }
    let slot = state.table.slot(slot_index);
    if !matches!(slot.state, SlotState::Ready | SlotState::Blocked) {
        return DispatchOutcome::Violation(ProtocolViolation::RequesterNotReady(slot_index));
    }
    if quantity > slot.allocated[resource] {
        return DispatchOutcome::Violation(ProtocolViolation::ReleaseExceedsHeld(
            slot_index, resource,
        ));
    }

    state.table.slot_mut(slot_index).allocated[resource] -= quantity;
    state.ledger.release(resource, quantity);

    let unblocked = regrant_sweep(state, resource);
    DispatchOutcome::Released {
        slot_index,
        resource,
        quantity,
        unblocked,
    }
}

/// Note: this does not increment either `terminations_normal` or
/// `terminations_deadlock` - [`crate::deadlock::DeadlockEngine`] also terminates
/// through this same function for victim recovery, and only the caller knows which
/// counter applies. The event loop and the deadlock engine each record the right one.
fn handle_terminate(state: &mut MasterState, slot_index: usize) -> DispatchOutcome {
    if state.table.slot(slot_index).is_unused() {
        return DispatchOutcome::AlreadyTerminated { slot_index };
    }

    let external_id = state.table.slot(slot_index).external_id;
    let released = {
        let slot = state.table.slot_mut(slot_index);
        let released = slot.allocated;
        slot.allocated = [0; NUM_RESOURCE_TYPES];
        released
    };
    for (resource, &quantity) in released.iter().enumerate() {
        if quantity > 0 {
            state.ledger.release(resource, quantity);
        }
    }
    state.table.deactivate(slot_index);

    let mut unblocked = Vec::new();
    for (resource, &quantity) in released.iter().enumerate() {
        if quantity > 0 {
            unblocked.extend(regrant_sweep(state, resource));
        }
    }

    DispatchOutcome::Terminated {
        slot_index,
        external_id,
        released,
        unblocked,
    }
}

/// Scans `Blocked` slots waiting on `resource`, ascending `block_order`, granting each
/// whose outstanding request now fits in `available[resource]`. All-or-nothing per
/// waiter: a request is never partially satisfied.
fn regrant_sweep(state: &mut MasterState, resource: ResourceId) -> Vec<GrantEvent> {
    let mut granted = Vec::new();
    loop {
        let candidate = state
            .table
            .blocked_in_order()
            .into_iter()
            .find(|&i| matches!(state.table.slot(i).requested, Some((r, q)) if r == resource && state.ledger.can_satisfy(resource, q)));

        let Some(slot_index) = candidate else {
            break;
        };

        let (_, quantity) = state.table.slot(slot_index).requested.expect("checked above");
        state.ledger.grant(resource, quantity);
        let slot = state.table.slot_mut(slot_index);
        slot.allocated[resource] += quantity;
        slot.requested = None;
        slot.state = SlotState::Ready;
        slot.block_order = None;
        state.stats.record_grant(true);

        granted.push(GrantEvent {
            slot_index,
            external_id: slot.external_id,
            resource,
            quantity,
            waited: true,
        });
    }
    granted
}
