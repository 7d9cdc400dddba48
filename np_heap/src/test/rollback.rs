use super::{get_test_heap, get_test_heap_with_provider};
use crate::{
    modules::{address_space::MapError, memory_provider::HeapMemoryProvider},
    CallerId, HeapError, NPConfig,
};

const PAGE: u64 = 4096;
const ALICE: CallerId = CallerId(1);

#[test]
fn test_failed_first_mapping_releases_storage() {
    let heap = get_test_heap(NPConfig::default());

    let region_a = heap.map(ALICE, 0, 0x10000, 2 * PAGE).unwrap();

    // object 1 wants to go right into the middle of object 0's range
    assert_eq!(
        heap.map(ALICE, PAGE, 0x10000 + 4096, PAGE).err(),
        Some(HeapError::MapFailed(MapError::Overlap))
    );

    // the object exists now, but without storage
    assert_eq!(heap.get_size(PAGE), Ok(0));
    assert_eq!(heap.object_count(), 2);
    assert_eq!(heap.memory_provider().outstanding_bytes(), 2 * 4096);

    // deleting it is a no-op and a mapping into free space works
    heap.delete(ALICE, PAGE).unwrap();
    let region_b = heap.map(ALICE, PAGE, 0x40000, PAGE).unwrap();
    assert_eq!(heap.get_size(PAGE), Ok(PAGE));
    assert!(!region_a.shares_storage_with(&region_b));
}

#[test]
fn test_failed_remap_keeps_storage() {
    let heap = get_test_heap(NPConfig::default());

    let region = heap.map(ALICE, 0, 0x10000, PAGE).unwrap();
    unsafe { region.write_at(0, b"keep") };

    assert_eq!(
        heap.map(ALICE, 0, 0x10000, PAGE).err(),
        Some(HeapError::MapFailed(MapError::Overlap))
    );
    assert_eq!(
        heap.map(ALICE, 0, 0x10001, PAGE).err(),
        Some(HeapError::MapFailed(MapError::Unaligned))
    );

    assert_eq!(heap.get_size(0), Ok(PAGE));
    let mut buf = [0u8; 4];
    unsafe { region.read_at(0, &mut buf) };
    assert_eq!(&buf, b"keep");
    assert_eq!(heap.memory_provider().outstanding_bytes(), 4096);
}

#[test]
fn test_out_of_memory() {
    let heap = get_test_heap_with_provider(
        NPConfig::default(),
        HeapMemoryProvider::with_limit(2 * 4096),
    );

    let region = heap.map(ALICE, 0, 0x10000, 2 * PAGE).unwrap();

    let err = heap.map(ALICE, PAGE, 0x40000, PAGE).err().unwrap();
    assert_eq!(err, HeapError::OutOfMemory);
    assert!(err.is_retryable());
    assert_eq!(err.errno(), libc::ENOMEM);
    assert_eq!(heap.get_size(PAGE), Ok(0));
    assert_eq!(heap.address_space().mapping_count(ALICE), 1);

    // the memory comes back once the old object is deleted and unmapped
    heap.delete(ALICE, 0).unwrap();
    assert_eq!(
        heap.map(ALICE, PAGE, 0x40000, PAGE).err(),
        Some(HeapError::OutOfMemory)
    );
    drop(region);

    let region = heap.map(ALICE, PAGE, 0x40000, PAGE).unwrap();
    assert_eq!(heap.get_size(PAGE), Ok(PAGE));
    assert_eq!(region.len(), 4096);
}
