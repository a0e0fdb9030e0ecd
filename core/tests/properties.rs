//! Property-based tests for the simulator's universal invariants. Traces
//! are generated over a small number of slots/resources so proptest can explore the
//! interesting corners (blocking, FIFO ties, deadlock cycles) in a reasonable number
//! of cases, rather than drowning in combinatorics from the full `N=18, R=5` sizing.

use proptest::prelude::*;
use resmgr_core::{
    dispatch, DeadlockEngine, DispatchOutcome, InboundMessage, MasterState, RESOURCE_INSTANCES,
};

const SLOTS: usize = 4;
const RESOURCES: usize = 2;

#[derive(Debug, Clone, Copy)]
enum Action {
    Request { slot: usize, resource: usize, quantity: u32 },
    Release { slot: usize, resource: usize, quantity: u32 },
    Terminate { slot: usize },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..SLOTS, 0..RESOURCES, 1..=3u32)
            .prop_map(|(slot, resource, quantity)| Action::Request { slot, resource, quantity }),
        (0..SLOTS, 0..RESOURCES, 1..=3u32)
            .prop_map(|(slot, resource, quantity)| Action::Release { slot, resource, quantity }),
        (0..SLOTS).prop_map(|slot| Action::Terminate { slot }),
    ]
}

fn setup_with_all_slots_active() -> MasterState {
    let mut state = MasterState::new();
    for slot in 0..SLOTS {
        let now = state.clock.now();
        state.table.activate(slot, slot as u64 + 1, now);
    }
    state
}

fn assert_conservation(state: &MasterState) {
    for resource in 0..resmgr_core::NUM_RESOURCE_TYPES {
        let held: u32 = state
            .table
            .slots()
            .iter()
            .map(|slot| slot.allocated[resource])
            .sum();
        assert_eq!(
            state.ledger.available(resource) + held,
            state.ledger.total(resource),
            "conservation violated for resource {resource}"
        );
    }
}

fn assert_non_negative(state: &MasterState) {
    for slot in state.table.slots() {
        for &quantity in &slot.allocated {
            assert!(quantity <= RESOURCE_INSTANCES);
        }
    }
    for resource in 0..resmgr_core::NUM_RESOURCE_TYPES {
        assert!(state.ledger.available(resource) <= RESOURCE_INSTANCES);
    }
}

proptest! {
    #[test]
    fn conservation_and_non_negativity_hold_after_every_message(
        actions in proptest::collection::vec(action_strategy(), 0..60)
    ) {
        let mut state = setup_with_all_slots_active();
        for action in actions {
            let message = match action {
                Action::Request { slot, resource, quantity } => {
                    InboundMessage::Request { slot_index: slot, resource, quantity }
                }
                Action::Release { slot, resource, quantity } => {
                    InboundMessage::Release { slot_index: slot, resource, quantity }
                }
                Action::Terminate { slot } => InboundMessage::Terminate { slot_index: slot },
            };
            dispatch(&mut state, message);
            assert_conservation(&state);
            assert_non_negative(&state);
        }
    }

    #[test]
    fn no_ghost_grants(
        actions in proptest::collection::vec(action_strategy(), 0..60)
    ) {
        let mut state = setup_with_all_slots_active();
        for action in actions {
            let message = match action {
                Action::Request { slot, resource, quantity } => {
                    InboundMessage::Request { slot_index: slot, resource, quantity }
                }
                Action::Release { slot, resource, quantity } => {
                    InboundMessage::Release { slot_index: slot, resource, quantity }
                }
                Action::Terminate { slot } => InboundMessage::Terminate { slot_index: slot },
            };
            let before = state.table.slots()[action_slot(action)].allocated;
            let outcome = dispatch(&mut state, message);
            if let DispatchOutcome::GrantedImmediate(event) = outcome {
                let after = state.table.slot(event.slot_index).allocated[event.resource];
                prop_assert_eq!(after, before[event.resource] + event.quantity);
            }
        }
    }
}

fn action_slot(action: Action) -> usize {
    match action {
        Action::Request { slot, .. } | Action::Release { slot, .. } | Action::Terminate { slot } => slot,
    }
}

#[test]
fn terminate_is_idempotent() {
    let mut state = setup_with_all_slots_active();
    dispatch(
        &mut state,
        InboundMessage::Request {
            slot_index: 0,
            resource: 0,
            quantity: 2,
        },
    );
    dispatch(&mut state, InboundMessage::Terminate { slot_index: 0 });
    let snapshot_available = *state.ledger.availables();
    let snapshot_slot_0 = state.table.slot(0).allocated;

    dispatch(&mut state, InboundMessage::Terminate { slot_index: 0 });

    assert_eq!(*state.ledger.availables(), snapshot_available);
    assert_eq!(state.table.slot(0).allocated, snapshot_slot_0);
    assert!(state.table.slot(0).is_unused());
}

#[test]
fn fifo_unblocking_honors_block_order_over_slot_index() {
    let mut state = setup_with_all_slots_active();
    for _ in 0..RESOURCE_INSTANCES {
        dispatch(
            &mut state,
            InboundMessage::Request {
                slot_index: 0,
                resource: 0,
                quantity: 1,
            },
        );
    }
    // Slot 3 blocks before slot 1, so slot 3 must be served first despite its higher
    // index.
    dispatch(
        &mut state,
        InboundMessage::Request {
            slot_index: 3,
            resource: 0,
            quantity: 1,
        },
    );
    dispatch(
        &mut state,
        InboundMessage::Request {
            slot_index: 1,
            resource: 0,
            quantity: 1,
        },
    );

    let outcome = dispatch(
        &mut state,
        InboundMessage::Release {
            slot_index: 0,
            resource: 0,
            quantity: 1,
        },
    );
    let DispatchOutcome::Released { unblocked, .. } = outcome else {
        panic!("expected Released")
    };
    assert_eq!(unblocked.len(), 1);
    assert_eq!(unblocked[0].slot_index, 3);
}

/// Builds a cyclic wait-for graph across `cycle_len` slots (2 or 3), each holding one
/// distinct resource and blocked wanting the next slot's resource, and checks the
/// safety check flags exactly that cycle, and that recovery clears it in at most
/// `cycle_len` victim terminations.
fn run_cycle_and_assert_recovery(cycle_len: usize) {
    let mut state = MasterState::new();
    for slot in 0..cycle_len {
        let now = state.clock.now();
        state.table.activate(slot, slot as u64 + 1, now);
    }
    for slot in 0..cycle_len {
        dispatch(
            &mut state,
            InboundMessage::Request {
                slot_index: slot,
                resource: slot,
                quantity: RESOURCE_INSTANCES,
            },
        );
    }
    for slot in 0..cycle_len {
        let wanted_resource = (slot + 1) % cycle_len;
        dispatch(
            &mut state,
            InboundMessage::Request {
                slot_index: slot,
                resource: wanted_resource,
                quantity: 1,
            },
        );
    }

    let report = DeadlockEngine::new().run(&mut state);
    assert_eq!(report.initial_deadlocked.len(), cycle_len);
    assert!(!report.victims_terminated.is_empty());
    assert!(report.victims_terminated.len() <= cycle_len);

    // Recovery must actually clear the cycle.
    let residual = DeadlockEngine::new().run(&mut state);
    assert!(!residual.found_deadlock());
}

#[test]
fn two_cycle_deadlock_detection_and_recovery_terminates() {
    run_cycle_and_assert_recovery(2);
}

#[test]
fn three_cycle_deadlock_detection_and_recovery_terminates() {
    run_cycle_and_assert_recovery(3);
}
