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

//! The fixed Process Table: `N` slots, each either free or bound to one worker for
//! its whole lifetime. Backed by a `[Slot; NUM_SLOTS]`
//! array rather than a `Vec` - slots are never allocated or freed individually, only
//! reset in place, so there is no reason to pay for heap growth.

use crate::constants::{NUM_RESOURCE_TYPES, NUM_SLOTS};
use crate::message::ExternalId;

/// The lifecycle of a slot. A slot can be blocked waiting on at most one resource
/// request at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// No worker is bound to this slot.
    #[default]
    Unused,
    /// A worker is bound and holds zero or more resources, with no outstanding request.
    Ready,
    /// A worker is bound, has an outstanding request, and is parked until it can be
    /// granted in full.
    Blocked,
    /// The worker has terminated. `spec.md` §3 names this as a distinct point in the
    /// lifecycle, but deactivation (`ProcessTable::deactivate`) resets a slot straight
    /// to `Unused` rather than parking it here first - this variant exists so match
    /// arms over `SlotState` stay exhaustive against the full state space the spec
    /// names, not because any code path currently constructs it.
    Terminated,
}

/// One row of the process table. `allocated` and `requested` are indexed by resource
/// id, `0..NUM_RESOURCE_TYPES`.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub state: SlotState,
    pub external_id: ExternalId,
    pub allocated: [u32; NUM_RESOURCE_TYPES],
    /// The outstanding request, if `state == Blocked`: `(resource, quantity)`.
    pub requested: Option<(usize, u32)>,
    /// Logical-clock reading at which the slot was activated.
    pub start_time: (u32, u32),
    /// Monotonically increasing sequence number assigned the moment a request blocks.
    /// Re-grant sweeps iterate blocked slots in ascending `block_order`, giving FIFO
    /// unblocking among slots waiting on the same resource.
    pub block_order: Option<u64>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: SlotState::Unused,
            external_id: 0,
            allocated: [0; NUM_RESOURCE_TYPES],
            requested: None,
            start_time: (0, 0),
            block_order: None,
        }
    }
}

impl Slot {
    #[must_use]
    pub fn is_unused(&self) -> bool { matches!(self.state, SlotState::Unused) }

    #[must_use]
    pub fn total_held(&self) -> u32 { self.allocated.iter().sum() }
}

/// The fixed-size process table. Never grows or shrinks; slots are reused across the
/// lifetime of a run.
pub struct ProcessTable {
    slots: [Slot; NUM_SLOTS],
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            slots: [Slot::default(); NUM_SLOTS],
        }
    }
}

impl ProcessTable {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn slots(&self) -> &[Slot; NUM_SLOTS] { &self.slots }

    #[must_use]
    pub fn slot(&self, index: usize) -> &Slot { &self.slots[index] }

    pub fn slot_mut(&mut self, index: usize) -> &mut Slot { &mut self.slots[index] }

    /// The index of the first `Unused` slot, if any. Returns `None` when the table is
    /// full, the signal the launcher uses to hold off spawning a new worker.
    #[must_use]
    pub fn find_unused(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_unused)
    }

    /// Binds `external_id` to `index`, transitioning it from `Unused` to `Ready`.
    pub fn activate(&mut self, index: usize, external_id: ExternalId, now: (u32, u32)) {
        self.slots[index] = Slot {
            state: SlotState::Ready,
            external_id,
            start_time: now,
            ..Slot::default()
        };
    }

    /// Resets `index` back to `Unused`, zeroing every field. Idempotent: calling this
    /// on an already-`Unused` slot is a harmless no-op.
    pub fn deactivate(&mut self, index: usize) {
        self.slots[index] = Slot::default();
    }

    /// The slot index bound to `external_id`, if any non-`Unused` slot claims it.
    #[must_use]
    pub fn find_by_external_id(&self, external_id: ExternalId) -> Option<usize> {
        (0..NUM_SLOTS).find(|&i| !self.slots[i].is_unused() && self.slots[i].external_id == external_id)
    }

    /// All slot indices currently `Blocked`, in ascending `block_order`. This is the
    /// iteration order the arbiter's re-grant sweep uses after every `Release` or
    /// `Terminate` (FIFO unblocking).
    #[must_use]
    pub fn blocked_in_order(&self) -> Vec<usize> {
        let mut blocked: Vec<usize> = (0..NUM_SLOTS)
            .filter(|&i| matches!(self.slots[i].state, SlotState::Blocked))
            .collect();
        blocked.sort_by_key(|&i| self.slots[i].block_order.unwrap_or(u64::MAX));
        blocked
    }
}
