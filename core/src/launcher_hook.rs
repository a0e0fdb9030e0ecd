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

//! The hook point the event loop uses to reach the external launcher: spawning and
//! reaping workers, and deciding when enough of them have run. Worker process
//! lifecycle - the random-walk request/release/terminate policy itself - lives outside
//! this crate entirely; this trait is the seam, not an implementation. See the
//! reference implementation in the `launcher` crate.

use crate::clock::LogicalClock;
use crate::message::ExternalId;

/// What the event loop needs from whatever is spawning and reaping workers. `core`
/// depends only on this trait, never on the concrete process/thread mechanism a
/// particular launcher uses.
pub trait Launcher {
    /// Asked once per event-loop iteration, only when the process table has a free
    /// slot. Returns the `external_id` of a freshly launched worker if the launcher's
    /// pacing/quota policy permits a launch right now, `None` otherwise. `clock` is
    /// the current logical clock, published read-only so launch pacing can be
    /// expressed in simulated time. `slot_index` is the table slot the event loop
    /// will activate the new worker into if this call succeeds - handed over up
    /// front (rather than reported back after the fact) so a launcher that spawns an
    /// OS thread or process can tell the worker which slot to address its messages
    /// to before the worker ever sends one.
    fn try_launch(&mut self, clock: LogicalClock, slot_index: usize) -> Option<ExternalId>;

    /// Asked once per event-loop iteration, after `try_launch`. Returns the
    /// `external_id` of every worker that has exited since the last call, so the
    /// event loop can issue the matching `TERMINATE` for any slot not already
    /// released by an explicit message.
    fn reap_exited(&mut self) -> Vec<ExternalId>;

    /// Called once, when the event loop's termination condition is met, to tear down
    /// any workers still running.
    fn kill_all(&mut self);

    /// Whether the launcher has reached its lifetime quota and has no workers left
    /// running - the first half of the event loop's termination condition.
    fn quota_exhausted_and_idle(&self) -> bool;
}
