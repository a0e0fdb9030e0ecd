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

//! [`MasterState`] bundles everything the arbiter and deadlock engine read and
//! mutate: the process table, the ledger, the logical clock, run statistics, and the
//! monotonic counter used to stamp [`crate::process_table::Slot::block_order`].

use crate::clock::LogicalClock;
use crate::ledger::ResourceLedger;
use crate::process_table::ProcessTable;
use crate::stats::Stats;

/// All mutable master-side state for one run. Deliberately a plain struct of plain
/// fields rather than an opaque handle - `dispatch` in [`crate::arbiter`] takes
/// `&mut MasterState` directly, in the style of a reducer acting on a state value.
pub struct MasterState {
    pub table: ProcessTable,
    pub ledger: ResourceLedger,
    pub clock: LogicalClock,
    pub stats: Stats,
    next_block_order: u64,
}

impl Default for MasterState {
    fn default() -> Self {
        Self {
            table: ProcessTable::new(),
            ledger: ResourceLedger::new(),
            clock: LogicalClock::new(),
            stats: Stats::new(),
            next_block_order: 0,
        }
    }
}

impl MasterState {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Hands out the next value for [`crate::process_table::Slot::block_order`].
    /// Strictly increasing for the lifetime of the run, which is what gives the
    /// arbiter's re-grant sweep its FIFO ordering guarantee.
    pub fn next_block_order(&mut self) -> u64 {
        let order = self.next_block_order;
        self.next_block_order += 1;
        order
    }
}
