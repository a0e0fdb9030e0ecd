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

//! The abstract channel message format exchanged between the master and a worker.

/// Opaque worker identity assigned by the launcher, used only to route a [`Grant`]
/// back to the slot that's waiting for it. The master never interprets this value.
pub type ExternalId = u64;

/// A resource type index, in `0..NUM_RESOURCE_TYPES`.
pub type ResourceId = usize;

/// A message sent from a worker slot to the master over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    /// A worker asks for `quantity` more instances of `resource`.
    Request {
        slot_index: usize,
        resource: ResourceId,
        quantity: u32,
    },
    /// A worker gives back `quantity` instances of `resource` it currently holds.
    Release {
        slot_index: usize,
        resource: ResourceId,
        quantity: u32,
    },
    /// A worker is exiting; release everything it holds and free its slot.
    Terminate { slot_index: usize },
}

impl InboundMessage {
    #[must_use]
    pub fn slot_index(&self) -> usize {
        match self {
            InboundMessage::Request { slot_index, .. }
            | InboundMessage::Release { slot_index, .. }
            | InboundMessage::Terminate { slot_index } => *slot_index,
        }
    }
}

/// A message sent from the master to a worker slot, addressed by [`ExternalId`] so the
/// transport can route it without the master knowing how workers identify themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub external_id: ExternalId,
    pub slot_index: usize,
}
