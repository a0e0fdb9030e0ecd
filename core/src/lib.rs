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

//! Resource-allocation state machine and deadlock-detection-and-recovery engine.
//!
//! This crate implements the "master" side of a small OS-resource-manager simulator: a
//! single-threaded, cooperative event loop that accepts `Request`/`Release`/`Terminate`
//! messages from worker slots, maintains a logical clock and a resource ledger, and
//! periodically runs a multi-instance safety check to detect and recover from deadlock.
//!
//! The crate does not implement worker decision-making (when a worker chooses to
//! request, release, or terminate) or the transport the messages travel over beyond an
//! abstract [`channel::Channel`] trait - both are external collaborators. See the
//! `launcher` crate for a reference harness that exercises this crate end to end.

pub mod arbiter;
pub mod channel;
pub mod clock;
pub mod config;
pub mod constants;
pub mod deadlock;
pub mod error;
pub mod event_loop;
pub mod ledger;
pub mod launcher_hook;
pub mod logging;
pub mod message;
pub mod process_table;
pub mod snapshot;
pub mod state;
pub mod stats;

pub use arbiter::{dispatch, DispatchOutcome, GrantEvent};
pub use channel::{Channel, GrantSendError, MpscChannel};
pub use clock::LogicalClock;
pub use config::RunConfig;
pub use constants::{MAX_LOG_LINES, NUM_RESOURCE_TYPES, NUM_SLOTS, RESOURCE_INSTANCES};
pub use deadlock::{DeadlockEngine, DeadlockReport};
pub use error::{ProtocolViolation, SetupError};
pub use event_loop::EventLoop;
pub use launcher_hook::Launcher;
pub use ledger::ResourceLedger;
pub use logging::{EventLog, LineCappedWriter};
pub use message::{ExternalId, Grant, InboundMessage, ResourceId};
pub use process_table::{ProcessTable, Slot, SlotState};
pub use snapshot::Snapshot;
pub use state::MasterState;
pub use stats::Stats;
