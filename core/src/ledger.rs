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

//! The Resource Ledger: per-resource-type totals and availability. `total` never
//! changes after construction; `available` is the only
//! mutable field, and it is the quantity the deadlock engine's safety check walks
//! against outstanding requests.

use crate::constants::{NUM_RESOURCE_TYPES, RESOURCE_INSTANCES};

/// `R` resource types, each with `K` interchangeable instances. Conservation
/// (`available[r] + sum(allocated[*][r]) == total[r]`) is maintained by construction:
/// every grant decrements `available` by exactly the quantity added to a slot's
/// `allocated`, and every release/terminate credits it back.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLedger {
    total: [u32; NUM_RESOURCE_TYPES],
    available: [u32; NUM_RESOURCE_TYPES],
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self {
            total: [RESOURCE_INSTANCES; NUM_RESOURCE_TYPES],
            available: [RESOURCE_INSTANCES; NUM_RESOURCE_TYPES],
        }
    }
}

impl ResourceLedger {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn total(&self, resource: usize) -> u32 { self.total[resource] }

    #[must_use]
    pub fn available(&self, resource: usize) -> u32 { self.available[resource] }

    #[must_use]
    pub fn totals(&self) -> &[u32; NUM_RESOURCE_TYPES] { &self.total }

    #[must_use]
    pub fn availables(&self) -> &[u32; NUM_RESOURCE_TYPES] { &self.available }

    /// Whether `quantity` more instances of `resource` can be granted right now.
    #[must_use]
    pub fn can_satisfy(&self, resource: usize, quantity: u32) -> bool {
        self.available[resource] >= quantity
    }

    /// Decrements `available[resource]` by `quantity`. Callers must have already
    /// checked [`Self::can_satisfy`]; this never saturates or clamps, so an
    /// over-withdrawal would panic in debug builds and wrap in release, both of which
    /// indicate an arbiter bug rather than a condition to recover from.
    pub fn grant(&mut self, resource: usize, quantity: u32) {
        self.available[resource] -= quantity;
    }

    /// Credits `quantity` instances of `resource` back to `available`. Never exceeds
    /// `total[resource]` as long as every caller only returns what it was granted.
    pub fn release(&mut self, resource: usize, quantity: u32) {
        self.available[resource] += quantity;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(0, true; "well under total")]
    #[test_case(RESOURCE_INSTANCES, true; "exactly the total")]
    #[test_case(RESOURCE_INSTANCES + 1, false; "one past the total")]
    fn can_satisfy_at_the_total_boundary(quantity: u32, expected: bool) {
        let ledger = ResourceLedger::new();
        assert_eq!(ledger.can_satisfy(0, quantity), expected);
    }

    #[test]
    fn starts_fully_available() {
        let ledger = ResourceLedger::new();
        for r in 0..NUM_RESOURCE_TYPES {
            assert_eq!(ledger.available(r), ledger.total(r));
        }
    }

    #[test]
    fn grant_then_release_round_trips() {
        let mut ledger = ResourceLedger::new();
        assert!(ledger.can_satisfy(0, 4));
        ledger.grant(0, 4);
        assert_eq!(ledger.available(0), RESOURCE_INSTANCES - 4);
        ledger.release(0, 4);
        assert_eq!(ledger.available(0), RESOURCE_INSTANCES);
    }

    #[test]
    fn cannot_satisfy_more_than_available() {
        let mut ledger = ResourceLedger::new();
        ledger.grant(1, RESOURCE_INSTANCES);
        assert!(!ledger.can_satisfy(1, 1));
        assert_eq!(ledger.available(1), 0);
    }
}
