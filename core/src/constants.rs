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

//! The fixed dimensions of a run. These are compile-time constants rather than
//! [`crate::config::RunConfig`] fields because [`crate::process_table::ProcessTable`]
//! and [`crate::ledger::ResourceLedger`] are backed by fixed-size arrays - growing them
//! at runtime would reintroduce the dynamic allocation the process table is explicitly
//! specified not to use.

/// `R` - the number of distinct resource types tracked by the ledger.
pub const NUM_RESOURCE_TYPES: usize = 5;

/// `K` - the number of interchangeable instances of each resource type.
pub const RESOURCE_INSTANCES: u32 = 10;

/// `N` - the maximum number of concurrently active worker slots.
pub const NUM_SLOTS: usize = 18;

/// Hard cap on the number of lines written to the event log. Once reached, further
/// events are silently dropped (see [`crate::logging`]).
pub const MAX_LOG_LINES: u64 = 10_000;

/// Lower and upper bounds (inclusive) of the per-tick logical clock jitter, in
/// nanoseconds. The distribution need not be uniform but every sample must be
/// positive, so the clock is guaranteed to be strictly monotonic.
pub const CLOCK_JITTER_NS_RANGE: std::ops::RangeInclusive<u32> = 100..=1099;
