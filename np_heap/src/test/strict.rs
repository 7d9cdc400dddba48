use super::get_test_heap;
use crate::{CallerId, HeapError, NPConfig};

const PAGE: u64 = 4096;
const ALICE: CallerId = CallerId(1);
const BOB: CallerId = CallerId(2);

fn strict_config() -> NPConfig {
    NPConfig {
        strict_locking: true,
        ..Default::default()
    }
}

#[test]
fn test_strict_map_requires_lock() {
    let heap = get_test_heap(strict_config());

    assert_eq!(
        heap.map(ALICE, 0, 0x10000, PAGE).err(),
        Some(HeapError::NotLockHolder(0))
    );
    // the object got registered nevertheless, but has no storage
    assert_eq!(heap.get_size(0), Ok(0));

    heap.lock(ALICE, 0).unwrap();
    let region = heap.map(ALICE, 0, 0x10000, PAGE).unwrap();

    assert_eq!(
        heap.map(BOB, 0, 0x10000, PAGE).err(),
        Some(HeapError::NotLockHolder(0))
    );
    assert_eq!(heap.delete(BOB, 0), Err(HeapError::NotLockHolder(0)));
    assert_eq!(heap.get_size(0), Ok(PAGE));

    heap.delete(ALICE, 0).unwrap();
    assert_eq!(heap.get_size(0), Ok(0));
    drop(region);

    heap.unlock(ALICE, 0).unwrap();
}

#[test]
fn test_strict_unlock_only_by_holder() {
    let heap = get_test_heap(strict_config());

    heap.lock(ALICE, 3 * PAGE).unwrap();
    assert_eq!(heap.unlock(BOB, 3 * PAGE), Err(HeapError::NotLockHolder(3)));

    heap.unlock(ALICE, 3 * PAGE).unwrap();
    // releasing a free lock is an error as well
    assert_eq!(heap.unlock(ALICE, 3 * PAGE), Err(HeapError::NotLockHolder(3)));
    assert_eq!(
        heap.unlock(ALICE, 3 * PAGE).unwrap_err().errno(),
        libc::EPERM
    );
}

#[test]
fn test_relaxed_unlock_of_free_lock() {
    let heap = get_test_heap(NPConfig::default());

    heap.lock(ALICE, 0).unwrap();
    heap.unlock(ALICE, 0).unwrap();
    assert_eq!(heap.unlock(ALICE, 0), Ok(()));

    // in relaxed mode anybody may release
    heap.lock(ALICE, 0).unwrap();
    assert_eq!(heap.unlock(BOB, 0), Ok(()));
    heap.try_lock(BOB, 0).unwrap();
    heap.unlock(BOB, 0).unwrap();
}
