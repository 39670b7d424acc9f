//! Integration tests for rgb-shared

use rgb_shared::prelude::*;
use rgb_shared::testing::RecordingStore;
use rgb_shared::{BufferConfig, record_partitioned};

// ============================================================================
// Test Values
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
struct RenderMesh {
    mesh: u32,
    material: u32,
}

const E1: EntityKey = EntityKey::new(1);
const E2: EntityKey = EntityKey::new(2);
const E3: EntityKey = EntityKey::new(3);

// ============================================================================
// Playback
// ============================================================================

#[test]
fn test_red_blue_green_scenario() {
    let mut buffer = DeferredMutationBuffer::new(2, AllocationStrategy::Amortized);
    buffer.record(E1, "red").unwrap();
    buffer.record(E2, "blue").unwrap();
    buffer.record(E1, "green").unwrap();

    let mut store = RecordingStore::new();
    buffer.playback(&mut store).unwrap();
    buffer.dispose().unwrap();

    assert_eq!(
        store.calls(),
        &[(E1, "red"), (E2, "blue"), (E1, "green")]
    );
    assert_eq!(store.inner().get(E1), Some(&"green"));
    assert_eq!(store.inner().get(E2), Some(&"blue"));
    assert_eq!(store.inner().len(), 2);
    // "red" lost its only user during playback.
    assert_eq!(store.inner().distinct_len(), 2);
}

#[test]
fn test_dispose_untouched_store() {
    let mut buffer: DeferredMutationBuffer<RenderMesh> =
        DeferredMutationBuffer::new(128, AllocationStrategy::Chunked);
    buffer.dispose().unwrap();
    assert_eq!(buffer.dispose(), Err(BufferError::DoubleDispose));
}

// ============================================================================
// Index + store
// ============================================================================

#[test]
fn test_check_before_record() {
    let cube = RenderMesh {
        mesh: 1,
        material: 7,
    };
    let sphere = RenderMesh {
        mesh: 2,
        material: 7,
    };

    let mut store = SharedStore::new();
    store.set_value(E1, cube.clone());

    let mut known_values = Vec::new();
    let mut known_slots = Vec::new();

    // Only record for values the store already knows.
    let mut buffer = DeferredMutationBuffer::from_config(&BufferConfig::default());
    for (key, value) in [(E2, cube.clone()), (E3, sphere.clone())] {
        if find_slot_in(&store, &value, &mut known_values, &mut known_slots).is_some() {
            buffer.record(key, value).unwrap();
        }
    }
    assert_eq!(buffer.len(), 1);

    buffer.playback(&mut store).unwrap();
    buffer.dispose().unwrap();

    assert_eq!(store.count_with(&cube), 2);
    assert_eq!(store.count_with(&sphere), 0);
    assert_eq!(store.slot_of(E1), store.slot_of(E2));
}

#[test]
fn test_slot_goes_stale_after_playback() {
    let mut store = SharedStore::new();
    store.set_value(E1, 'a');
    store.set_value(E2, 'b');
    store.set_value(E3, 'c');

    let mut values = Vec::new();
    let mut slots = Vec::new();
    let slot_c = find_slot_in(&store, &'c', &mut values, &mut slots).unwrap();

    // Moving E1 off 'a' empties that slot and compacts the table.
    let mut buffer = DeferredMutationBuffer::new(1, AllocationStrategy::Amortized);
    buffer.record(E1, 'b').unwrap();
    buffer.playback(&mut store).unwrap();
    buffer.dispose().unwrap();

    assert_ne!(store.value_at(slot_c), Some(&'c'));

    let fresh = find_slot_in(&store, &'c', &mut values, &mut slots).unwrap();
    assert_eq!(store.value_at(fresh), Some(&'c'));
    assert_eq!(find_slot_in(&store, &'a', &mut values, &mut slots), None);
}

// ============================================================================
// Partitioned recording
// ============================================================================

#[test]
fn test_partitioned_matches_sequential() {
    let items: Vec<u32> = (0..500).collect();
    let config = BufferConfig::default();
    let produce = |&i: &u32, buffer: &mut DeferredMutationBuffer<RenderMesh>| {
        buffer.record(
            EntityKey::new(i % 50),
            RenderMesh {
                mesh: i % 3,
                material: i % 2,
            },
        )
    };

    let mut sequential = DeferredMutationBuffer::from_config(&config);
    for item in &items {
        produce(item, &mut sequential).unwrap();
    }
    let mut expected = RecordingStore::new();
    sequential.playback(&mut expected).unwrap();
    sequential.dispose().unwrap();

    let mut buffers = record_partitioned(&items, 37, &config, produce).unwrap();
    let mut actual = RecordingStore::new();
    rgb_shared::playback_all(&buffers, &mut actual).unwrap();
    rgb_shared::dispose_all(&mut buffers).unwrap();

    assert_eq!(actual.calls(), expected.calls());
    assert_eq!(actual.inner().distinct_len(), expected.inner().distinct_len());
}
