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

//! The abstract discrete-message channel the master polls. The transport is
//! deliberately left unspecified - shared memory and message queues are both valid
//! backing implementations. [`Channel`] is that abstraction; [`MpscChannel`] is a
//! reference implementation over [`std::sync::mpsc`], suited to workers modeled as
//! native threads.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use crate::message::{ExternalId, Grant, InboundMessage};

/// The master's side of the abstract channel. `poll_inbound` must never block - an
/// empty channel returns `None` immediately. `send_grant` is likewise non-blocking; a
/// failure is reported but never rolls back ledger state.
pub trait Channel {
    /// Non-blocking receive of at most one inbound message.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;

    /// Registers a worker's outbound (grant) endpoint so future `send_grant` calls
    /// addressed to `external_id` can be routed.
    fn register_worker(&mut self, external_id: ExternalId, sender: Sender<Grant>);

    /// Deregisters a worker's outbound endpoint, e.g. after it has been terminated.
    fn deregister_worker(&mut self, external_id: ExternalId);

    /// Attempts to deliver a grant to the worker identified by `grant.external_id`.
    /// Returns `Err` (logged by the caller, never rolled back) if the worker has no
    /// registered endpoint or its receiver has been dropped.
    fn send_grant(&mut self, grant: Grant) -> Result<(), GrantSendError>;
}

/// Why a grant could not be delivered. Never causes the arbiter to roll back the
/// allocation it just made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GrantSendError {
    #[error("no registered outbound endpoint for worker {0}")]
    UnknownWorker(ExternalId),
    #[error("worker {0}'s outbound endpoint is closed")]
    Disconnected(ExternalId),
}

struct Inner {
    inbound_rx: Receiver<InboundMessage>,
    inbound_tx: Sender<InboundMessage>,
    outbound: HashMap<ExternalId, Sender<Grant>>,
}

/// Reference [`Channel`] implementation: one shared inbound queue that every worker's
/// thread sends into, and a per-worker outbound queue the master sends grants into.
/// Cheaply `Clone` (an `Arc` around the shared state) so a launcher spawning worker
/// threads can hold its own handle and register each new worker's outbound sender
/// without needing a reference back into the event loop that owns the other handle.
#[derive(Clone)]
pub struct MpscChannel {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MpscChannel {
    fn default() -> Self { Self::new() }
}

impl MpscChannel {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                inbound_rx: rx,
                inbound_tx: tx,
                outbound: HashMap::new(),
            })),
        }
    }

    /// A clonable sender workers use to push [`InboundMessage`]s to the master.
    #[must_use]
    pub fn inbound_sender(&self) -> Sender<InboundMessage> {
        self.inner.lock().expect("channel mutex poisoned").inbound_tx.clone()
    }
}

impl Channel for MpscChannel {
    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        let inner = self.inner.lock().expect("channel mutex poisoned");
        match inner.inbound_rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn register_worker(&mut self, external_id: ExternalId, sender: Sender<Grant>) {
        self.inner
            .lock()
            .expect("channel mutex poisoned")
            .outbound
            .insert(external_id, sender);
    }

    fn deregister_worker(&mut self, external_id: ExternalId) {
        self.inner.lock().expect("channel mutex poisoned").outbound.remove(&external_id);
    }

    fn send_grant(&mut self, grant: Grant) -> Result<(), GrantSendError> {
        let inner = self.inner.lock().expect("channel mutex poisoned");
        let Some(sender) = inner.outbound.get(&grant.external_id) else {
            return Err(GrantSendError::UnknownWorker(grant.external_id));
        };
        sender
            .send(grant)
            .map_err(|_| GrantSendError::Disconnected(grant.external_id))
    }
}
