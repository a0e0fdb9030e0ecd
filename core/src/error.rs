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

//! Error taxonomy for the simulator. Two families, matching the split in the design
//! doc between failures that abort the run and failures that are merely logged.
//!
//! [`SetupError`] covers the fatal path (IPC/log setup) - it derives
//! [`miette::Diagnostic`] so `main()` in the `launcher` crate can render a rich,
//! actionable report and exit non-zero.
//!
//! [`ProtocolViolation`] covers malformed messages from a worker slot. It is never
//! returned as an `Err` from the arbiter - a violation is logged and the message is
//! discarded, leaving the ledger untouched. It exists as a typed reason purely so the
//! event loop can log something more useful than "ignored message".

use thiserror::Error;

/// Fatal startup failures. Any value of this type reaches `main()`, gets reported to
/// stderr, and causes the process to exit with a non-zero status.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum SetupError {
    /// The event log file could not be opened (or created) for writing.
    #[error("failed to open log file at {path}")]
    #[diagnostic(
        code(resmgr::setup::log_open),
        help("check that the parent directory exists and is writable")
    )]
    LogOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The abstract message channel between master and workers could not be set up.
    #[error("failed to initialize the master/worker channel")]
    #[diagnostic(code(resmgr::setup::channel_init))]
    ChannelInit { reason: String },
}

/// Why an inbound message was rejected without mutating any state. Never fatal, always
/// logged and discarded by the arbiter.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A `Request` or `Release` arrived for a slot that is not `Ready` (or not
    /// `Unused`/holding the allocation it claims, for `Release`).
    #[error("slot {0} is not in a state that can issue this message")]
    RequesterNotReady(usize),

    /// A `Request`'s quantity would push `allocated[i][r]` above the resource's total.
    #[error("slot {0} requested more of resource {1} than the total instance count")]
    QuantityExceedsTotal(usize, usize),

    /// A `Release`'s quantity exceeds what the slot currently holds of that resource.
    #[error("slot {0} released more of resource {1} than it holds")]
    ReleaseExceedsHeld(usize, usize),

    /// A slot already has an outstanding request recorded; at most one is allowed.
    #[error("slot {0} already has an outstanding request")]
    MultipleOutstandingRequests(usize),

    /// A message's quantity field was zero or otherwise out of range.
    #[error("slot {0} sent a non-positive quantity")]
    NonPositiveQuantity(usize),
}
