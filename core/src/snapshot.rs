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

//! Resource-table snapshots, emitted every simulated half-second as an allocation
//! matrix with a header line.

use std::fmt;

use crate::clock::LogicalClock;
use crate::constants::{NUM_RESOURCE_TYPES, NUM_SLOTS};
use crate::process_table::SlotState;
use crate::state::MasterState;

/// A point-in-time read of the allocation matrix, the availability vector, and which
/// slots are occupied. Produced fresh each time - never retained across ticks.
pub struct Snapshot {
    pub clock: LogicalClock,
    pub available: [u32; NUM_RESOURCE_TYPES],
    pub allocated: [[u32; NUM_RESOURCE_TYPES]; NUM_SLOTS],
    pub occupied: [bool; NUM_SLOTS],
}

impl Snapshot {
    #[must_use]
    pub fn capture(state: &MasterState) -> Self {
        let mut allocated = [[0u32; NUM_RESOURCE_TYPES]; NUM_SLOTS];
        let mut occupied = [false; NUM_SLOTS];
        for (i, slot) in state.table.slots().iter().enumerate() {
            allocated[i] = slot.allocated;
            occupied[i] = !matches!(slot.state, SlotState::Unused);
        }
        Self {
            clock: state.clock,
            available: *state.ledger.availables(),
            allocated,
            occupied,
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "--- snapshot at {}:{} ---",
            self.clock.seconds(),
            self.clock.nanoseconds()
        )?;
        write!(f, "available:")?;
        for a in self.available {
            write!(f, " {a}")?;
        }
        writeln!(f)?;
        for (i, (allocated, &occupied)) in self.allocated.iter().zip(self.occupied.iter()).enumerate() {
            if !occupied {
                continue;
            }
            write!(f, "P{i}:")?;
            for a in allocated {
                write!(f, " {a}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
